pub mod combiner;
pub mod matcher;

pub use combiner::combine;
pub use matcher::{match_catalog, MatchResult};
