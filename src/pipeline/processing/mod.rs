pub mod fuzzy;
pub mod masters;
pub mod projection;
pub mod registry;
pub mod resolver;

pub use fuzzy::{AirportMatcher, MatchSummary};
pub use masters::{DimensionCounts, MasterTables};
pub use registry::KeyRegistry;
pub use resolver::{DimensionResolver, ResolvedBatch};
