use strsim::levenshtein;

use crate::domain::catalog::CatalogItem;

pub const TIER_ONE_MAX_DISTANCE: usize = 2;
pub const TIER_TWO_MAX_DISTANCE: usize = 3;
pub const TIER_THREE_MAX_DISTANCE: usize = 4;

/// Catalog entries ranked against one free-text query.
///
/// An exact (case-insensitive) name match short-circuits every tier. Otherwise each
/// item lands in the lowest tier its Levenshtein distance qualifies for, keeping
/// catalog order within a tier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub exact: Option<CatalogItem>,
    pub tier_one: Vec<CatalogItem>,
    pub tier_two: Vec<CatalogItem>,
    pub tier_three: Vec<CatalogItem>,
}

impl MatchResult {
    pub fn classify(catalog: &[CatalogItem], query: &str) -> Self {
        if let Some(item) = catalog.iter().find(|item| item.is_named(query)) {
            return Self { exact: Some(item.clone()), ..Self::default() };
        }

        let mut result = Self::default();
        for item in catalog {
            let distance = levenshtein(&item.name, query);
            if distance <= TIER_ONE_MAX_DISTANCE {
                result.tier_one.push(item.clone());
            } else if distance <= TIER_TWO_MAX_DISTANCE {
                result.tier_two.push(item.clone());
            } else if distance <= TIER_THREE_MAX_DISTANCE {
                result.tier_three.push(item.clone());
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_none()
            && self.tier_one.is_empty()
            && self.tier_two.is_empty()
            && self.tier_three.is_empty()
    }

    pub fn ranked(self) -> Vec<CatalogItem> {
        if let Some(item) = self.exact {
            return vec![item];
        }
        let mut ranked = self.tier_one;
        ranked.extend(self.tier_two);
        ranked.extend(self.tier_three);
        ranked
    }
}

pub fn match_catalog(catalog: &[CatalogItem], query: &str) -> Vec<CatalogItem> {
    MatchResult::classify(catalog, query).ranked()
}

#[cfg(test)]
mod tests {
    use super::{match_catalog, MatchResult};
    use crate::domain::catalog::CatalogItem;

    fn catalog(names: &[&str]) -> Vec<CatalogItem> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| CatalogItem::new(index as i64 + 1, *name, false))
            .collect()
    }

    fn names(items: &[CatalogItem]) -> Vec<&str> {
        items.iter().map(|item| item.name.as_str()).collect()
    }

    #[test]
    fn exact_name_wins_outright_over_close_neighbours() {
        let items = catalog(&["Beaker", "Beakr", "Beakers"]);

        assert_eq!(names(&match_catalog(&items, "Beaker")), vec!["Beaker"]);
    }

    #[test]
    fn exact_match_ignores_case() {
        let items = catalog(&["Pipette", "Beaker"]);

        let matches = match_catalog(&items, "beaker");

        assert_eq!(names(&matches), vec!["Beaker"]);
    }

    #[test]
    fn exact_match_folds_non_ascii_case() {
        let items = catalog(&["Überzieher", "Überziehen"]);

        let matches = match_catalog(&items, "überzieher");

        assert_eq!(names(&matches), vec!["Überzieher"]);
    }

    #[test]
    fn tiers_are_ordered_and_stable_within_a_tier() {
        // distances from "Flask": Flasks=1, Flaskett=3, Flsk=1, Flaskette4=5
        let items = catalog(&["Flaskett", "Flasks", "Flaskette4", "Flsk"]);

        let result = MatchResult::classify(&items, "Flask");

        assert_eq!(names(&result.tier_one), vec!["Flasks", "Flsk"]);
        assert_eq!(names(&result.tier_two), vec!["Flaskett"]);
        assert!(result.tier_three.is_empty());
        assert_eq!(names(&result.ranked()), vec!["Flasks", "Flsk", "Flaskett"]);
    }

    #[test]
    fn distance_four_is_the_last_tier() {
        let items = catalog(&["abcdefgh", "abcd", "zzzz"]);

        let result = MatchResult::classify(&items, "abcdefghxxxx");

        assert!(result.tier_one.is_empty());
        assert!(result.tier_two.is_empty());
        assert_eq!(names(&result.tier_three), vec!["abcdefgh"]);
    }

    #[test]
    fn nothing_within_distance_four_is_empty_not_an_error() {
        let items = catalog(&["Microscope", "Centrifuge"]);

        let result = MatchResult::classify(&items, "Bunsen");

        assert!(result.is_empty());
        assert!(result.ranked().is_empty());
    }

    #[test]
    fn short_names_are_not_length_normalized() {
        // "Cup" vs "Mug" is distance 2 although two of three characters differ.
        let items = catalog(&["Mug"]);

        assert_eq!(names(&match_catalog(&items, "Cup")), vec!["Mug"]);
    }
}
