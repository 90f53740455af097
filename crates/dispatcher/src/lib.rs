//! 调度域
//!
//! CRON求值、排序策略与调度器本体。依赖core的模型与接口，
//! 不关心存储与执行的具体实现。

pub mod cron_utils;
pub mod orchestrator;
pub mod policies;
pub mod scheduler;


pub use cron_utils::CronSchedule;
pub use orchestrator::SchedulePolicyOrchestrator;
pub use policies::{
    BatchPolicy, DeadlinePolicy, FirstInFirstOutPolicy, IdlePolicy, NicePolicy, RoundRobinPolicy,
    SchedulePolicy,
};
pub use scheduler::{Scheduler, SynchronizedClock};
