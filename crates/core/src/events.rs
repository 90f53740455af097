//! 生命周期事件
//!
//! Scheduler与Worker在各生命周期节点向事件总线发布事件，
//! 停止条件、单次任务回收、日志记录等都以监听器的形式挂在总线上，
//! 核心循环自身不承担这些职责。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{FailedTask, Output, Task};

/// 调度与执行生命周期事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchedulerEvent {
    TaskScheduled {
        id: Uuid,
        task: Task,
        occurred_at: DateTime<Utc>,
    },
    TaskUnscheduled {
        id: Uuid,
        task_name: String,
        occurred_at: DateTime<Utc>,
    },
    SingleRunTaskExecuted {
        id: Uuid,
        task: Task,
        occurred_at: DateTime<Utc>,
    },
    TaskExecuting {
        id: Uuid,
        task: Task,
        occurred_at: DateTime<Utc>,
    },
    TaskExecuted {
        id: Uuid,
        task: Task,
        output: Output,
        occurred_at: DateTime<Utc>,
    },
    TaskFailed {
        id: Uuid,
        failed_task: FailedTask,
        occurred_at: DateTime<Utc>,
    },
    WorkerStarted {
        id: Uuid,
        occurred_at: DateTime<Utc>,
    },
    WorkerRunning {
        id: Uuid,
        /// true表示Worker刚结束一个任务回到空闲
        idle: bool,
        occurred_at: DateTime<Utc>,
    },
    WorkerStopped {
        id: Uuid,
        occurred_at: DateTime<Utc>,
    },
    WorkerRestarted {
        id: Uuid,
        occurred_at: DateTime<Utc>,
    },
    SchedulerRebooted {
        id: Uuid,
        occurred_at: DateTime<Utc>,
    },
}

impl SchedulerEvent {
    pub fn task_scheduled(task: Task) -> Self {
        Self::TaskScheduled {
            id: Uuid::new_v4(),
            task,
            occurred_at: Utc::now(),
        }
    }

    pub fn task_unscheduled<S: Into<String>>(task_name: S) -> Self {
        Self::TaskUnscheduled {
            id: Uuid::new_v4(),
            task_name: task_name.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn single_run_task_executed(task: Task) -> Self {
        Self::SingleRunTaskExecuted {
            id: Uuid::new_v4(),
            task,
            occurred_at: Utc::now(),
        }
    }

    pub fn task_executing(task: Task) -> Self {
        Self::TaskExecuting {
            id: Uuid::new_v4(),
            task,
            occurred_at: Utc::now(),
        }
    }

    pub fn task_executed(task: Task, output: Output) -> Self {
        Self::TaskExecuted {
            id: Uuid::new_v4(),
            task,
            output,
            occurred_at: Utc::now(),
        }
    }

    pub fn task_failed(failed_task: FailedTask) -> Self {
        Self::TaskFailed {
            id: Uuid::new_v4(),
            failed_task,
            occurred_at: Utc::now(),
        }
    }

    pub fn worker_started() -> Self {
        Self::WorkerStarted {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    pub fn worker_running(idle: bool) -> Self {
        Self::WorkerRunning {
            id: Uuid::new_v4(),
            idle,
            occurred_at: Utc::now(),
        }
    }

    pub fn worker_stopped() -> Self {
        Self::WorkerStopped {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    pub fn worker_restarted() -> Self {
        Self::WorkerRestarted {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    pub fn scheduler_rebooted() -> Self {
        Self::SchedulerRebooted {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            SchedulerEvent::TaskScheduled { .. } => "TaskScheduled",
            SchedulerEvent::TaskUnscheduled { .. } => "TaskUnscheduled",
            SchedulerEvent::SingleRunTaskExecuted { .. } => "SingleRunTaskExecuted",
            SchedulerEvent::TaskExecuting { .. } => "TaskExecuting",
            SchedulerEvent::TaskExecuted { .. } => "TaskExecuted",
            SchedulerEvent::TaskFailed { .. } => "TaskFailed",
            SchedulerEvent::WorkerStarted { .. } => "WorkerStarted",
            SchedulerEvent::WorkerRunning { .. } => "WorkerRunning",
            SchedulerEvent::WorkerStopped { .. } => "WorkerStopped",
            SchedulerEvent::WorkerRestarted { .. } => "WorkerRestarted",
            SchedulerEvent::SchedulerRebooted { .. } => "SchedulerRebooted",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SchedulerEvent::TaskScheduled { occurred_at, .. }
            | SchedulerEvent::TaskUnscheduled { occurred_at, .. }
            | SchedulerEvent::SingleRunTaskExecuted { occurred_at, .. }
            | SchedulerEvent::TaskExecuting { occurred_at, .. }
            | SchedulerEvent::TaskExecuted { occurred_at, .. }
            | SchedulerEvent::TaskFailed { occurred_at, .. }
            | SchedulerEvent::WorkerStarted { occurred_at, .. }
            | SchedulerEvent::WorkerRunning { occurred_at, .. }
            | SchedulerEvent::WorkerStopped { occurred_at, .. }
            | SchedulerEvent::WorkerRestarted { occurred_at, .. }
            | SchedulerEvent::SchedulerRebooted { occurred_at, .. } => *occurred_at,
        }
    }
}

/// 事件监听器，按订阅顺序被同步地逐个调用
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &SchedulerEvent);
}

/// 进程内事件总线
///
/// dispatch在当前任务流中依次等待每个监听器完成，
/// 停止条件类监听器因此能在下一个任务开始前生效。
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().await.push(listener);
    }

    pub async fn dispatch(&self, event: SchedulerEvent) {
        // 先拷贝出监听器列表，避免监听器内再次dispatch时持锁
        let listeners: Vec<Arc<dyn EventListener>> = self.listeners.read().await.clone();
        for listener in listeners {
            listener.on_event(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EventListener for CountingListener {
        async fn on_event(&self, _event: &SchedulerEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_all_listeners() {
        let bus = EventBus::new();
        let first = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
        });
        let second = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
        });
        bus.subscribe(first.clone()).await;
        bus.subscribe(second.clone()).await;

        let task = Task::new("app", TaskPayload::Null);
        bus.dispatch(SchedulerEvent::task_scheduled(task)).await;

        assert_eq!(first.seen.load(Ordering::SeqCst), 1);
        assert_eq!(second.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(SchedulerEvent::worker_started().event_type(), "WorkerStarted");
        assert_eq!(
            SchedulerEvent::task_unscheduled("app").event_type(),
            "TaskUnscheduled"
        );
    }
}
