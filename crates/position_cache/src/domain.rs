mod cache_writer;
mod collection_service;
mod collection_ticker;
mod deduplicator;
mod query_service;
mod row_normalizer;

pub use cache_writer::*;
pub use collection_service::*;
pub use collection_ticker::*;
pub use deduplicator::*;
pub use query_service::*;
pub use row_normalizer::*;
