/// Interleaves several ranked lists round-robin: first element of every list, then
/// the second element of every list that has one, and so on. No deduplication.
pub fn combine<T: Clone>(lists: &[Vec<T>]) -> Vec<T> {
    let longest = lists.iter().map(Vec::len).max().unwrap_or(0);
    let mut combined = Vec::with_capacity(lists.iter().map(Vec::len).sum());

    for index in 0..longest {
        combined.extend(lists.iter().filter_map(|list| list.get(index)).cloned());
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::combine;

    #[test]
    fn interleaves_uneven_lists() {
        let lists = vec![vec!["A", "B", "C"], vec!["X", "Y"]];

        assert_eq!(combine(&lists), vec!["A", "X", "B", "Y", "C"]);
    }

    #[test]
    fn empty_input_and_empty_lists() {
        let none: Vec<Vec<u8>> = Vec::new();
        assert!(combine(&none).is_empty());

        let lists = vec![Vec::new(), vec![1, 2], Vec::new()];
        assert_eq!(combine(&lists), vec![1, 2]);
    }

    #[test]
    fn keeps_duplicates_across_lists() {
        let lists = vec![vec!["Beaker"], vec!["Beaker", "Flask"]];

        assert_eq!(combine(&lists), vec!["Beaker", "Beaker", "Flask"]);
    }
}
