use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lagertool_core::catalog::{combine, match_catalog};
use lagertool_core::domain::catalog::total_on_hand;
use lagertool_core::CatalogItem;
use lagertool_db::repositories::{CatalogRepository, RepositoryError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub item: CatalogItem,
    pub on_hand: u64,
}

/// Splits `beaker, flask` into trimmed, non-empty queries.
pub fn parse_queries(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|query| !query.is_empty()).map(str::to_owned).collect()
}

/// Multi-query catalog lookup backing `/borrow search`.
pub struct CatalogSearch {
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogSearch {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Ranks each query on its own, then interleaves the rankings so the best
    /// match of every query shows up before any second-best one.
    pub async fn search(&self, queries: &[String]) -> Result<Vec<SearchHit>, RepositoryError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let catalog = self.catalog.list_catalog_items().await?;
        let ranked: Vec<Vec<CatalogItem>> =
            queries.iter().map(|query| match_catalog(&catalog, query)).collect();

        let mut hits = Vec::new();
        for item in combine(&ranked) {
            let stock = self.catalog.list_inventory_for(item.id).await?;
            hits.push(SearchHit { on_hand: total_on_hand(&stock), item });
        }
        Ok(hits)
    }
}
