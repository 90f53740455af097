//! 执行域
//!
//! Worker循环、任务运行器与生命周期事件监听器。

pub mod listeners;
pub mod runners;
pub mod service;

pub use listeners::{
    SingleRunTaskListener, StopWorkerOnFailureLimitListener, StopWorkerOnTaskLimitListener,
    StopWorkerOnTimeLimitListener, TaskLoggerListener,
};
pub use runners::{
    CallbackRunner, CommandRunner, HttpRunner, MessengerRunner, NotificationRunner, NullRunner,
    ShellRunner,
};
pub use service::{Worker, WorkerBuilder, WorkerOptions, WorkerState};
