//! tickcache: bounded in-process caching with epoch-tick TTL expiration.
//!
//! The crate combines two orthogonal entry lifetimes: capacity-bounded
//! replacement under a pluggable policy (LRU, LFU, ARC, or none) and
//! coarse-grained time-based expiration driven by a background sweeper.
//! See `DESIGN.md` for internal architecture and invariants.

pub mod ds;
pub mod policy;
pub mod sync;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod builder;
pub mod cache;
pub mod prelude;
pub mod traits;

pub use builder::{CacheBuilder, CachePolicy};
pub use cache::Cache;
pub use sync::CancellationToken;
