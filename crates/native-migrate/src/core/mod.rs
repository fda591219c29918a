//! Core abstractions for the migration engine.
//!
//! - [`filter`]: Filter, time range and shard value types
//! - [`traits`]: Source and destination endpoint traits
//! - [`matcher`]: Per-metric series selector rewriting
//! - [`paths`]: Export/import URL construction

pub mod filter;
pub mod matcher;
pub mod paths;
pub mod traits;

pub use filter::{format_rfc3339, Filter, Shard, TimeRange};
pub use matcher::build_match_with_metric;
pub use traits::{ByteStream, DestinationEndpoint, SourceEndpoint};
