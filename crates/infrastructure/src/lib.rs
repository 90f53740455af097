//! 基础设施
//!
//! Storage与LockProvider的进程内实现，以及DSN驱动的存储工厂。

pub mod composite;
pub mod memory_lock;
pub mod memory_storage;
pub mod storage_factory;

pub use composite::{FailoverStorage, LongTailStorage, RoundRobinStorage};
pub use memory_lock::InMemoryLockProvider;
pub use memory_storage::InMemoryStorage;
pub use storage_factory::{StorageDsn, StorageFactory};
