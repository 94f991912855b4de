// Pipeline ingestion: source discovery, extract normalization and the IATA reference list

pub mod extract;
pub mod reference;
pub mod sources;

pub use extract::{ExtractBatch, ExtractNormalizer};
pub use reference::load_reference;
pub use sources::{discover_sources, source_tag};
