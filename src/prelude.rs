pub use crate::builder::{CacheBuilder, CachePolicy, DEFAULT_GRANULARITY};
pub use crate::cache::Cache;
pub use crate::ds::{GhostList, TtlBuckets};
pub use crate::policy::{ArcPolicy, LfuPolicy, LruPolicy, NoEvictionPolicy};
pub use crate::sync::{CancellationToken, SpinLock};
pub use crate::traits::ReplacementPolicy;

#[cfg(feature = "metrics")]
pub use crate::metrics::CacheMetricsSnapshot;
