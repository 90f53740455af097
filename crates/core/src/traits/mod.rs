pub mod lock;
pub mod message_bus;
pub mod runner;
pub mod storage;

pub use lock::{LockGuard, LockProvider};
pub use message_bus::MessageBus;
pub use runner::Runner;
pub use storage::{Storage, StorageOptions};
