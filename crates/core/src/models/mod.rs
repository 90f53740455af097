pub mod task;
pub mod task_list;

pub use task::{
    ExecutionState, FailedTask, Output, Task, TaskKind, TaskPayload, TaskState, REBOOT_MACRO,
};
pub use task_list::TaskList;
