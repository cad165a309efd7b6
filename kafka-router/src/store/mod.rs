mod match_store;
pub mod snapshot;

pub use match_store::MatchStore;
