pub mod counter;
pub mod pool;
pub mod types;

pub use counter::PendingCounter;
pub use pool::QueuePool;
pub use types::PoolError;
