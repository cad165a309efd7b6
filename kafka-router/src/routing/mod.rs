pub mod dispatcher;
pub mod route;
pub mod strategy;

pub use dispatcher::{ReferenceIngestor, RouteDispatcher};
pub use route::Route;
pub use strategy::{AllowList, Correlation, Decision, MatchStrategy};
