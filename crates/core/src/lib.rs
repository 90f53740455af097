pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod shutdown;
pub mod traits;

pub use config::{AppConfig, LoggingConfig, WorkerConfig};
pub use errors::{SchedulerError, SchedulerResult};
pub use events::{EventBus, EventListener, SchedulerEvent};
pub use models::{
    ExecutionState, FailedTask, Output, Task, TaskKind, TaskList, TaskPayload, TaskState,
    REBOOT_MACRO,
};
pub use shutdown::StopSignal;
pub use traits::{LockGuard, LockProvider, MessageBus, Runner, Storage, StorageOptions};
