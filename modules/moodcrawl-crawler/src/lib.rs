pub mod browser;
pub mod extractor;
pub mod identity;
pub mod lang;
pub mod links;
pub mod normalizer;
pub mod scheduler;
pub mod shard;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod walker;

pub use scheduler::Scheduler;
pub use stats::RunStats;
