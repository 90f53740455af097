//! 事件监听器
//!
//! 停止条件、单次任务回收、任务日志都挂在事件总线上，Worker循环
//! 本身不承担这些职责。三个停止条件监听器彼此独立，任何一个达到
//! 阈值都会触发停止信号。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{error, info, warn};

use taskloop_core::{EventListener, SchedulerEvent, StopSignal};
use taskloop_dispatcher::Scheduler;

/// 执行满N个任务后停止Worker
pub struct StopWorkerOnTaskLimitListener {
    limit: usize,
    executed: AtomicUsize,
    stop_signal: Arc<StopSignal>,
}

impl StopWorkerOnTaskLimitListener {
    pub fn new(limit: usize, stop_signal: Arc<StopSignal>) -> Self {
        Self {
            limit,
            executed: AtomicUsize::new(0),
            stop_signal,
        }
    }
}

#[async_trait]
impl EventListener for StopWorkerOnTaskLimitListener {
    async fn on_event(&self, event: &SchedulerEvent) {
        if let SchedulerEvent::TaskExecuted { .. } = event {
            let executed = self.executed.fetch_add(1, Ordering::SeqCst) + 1;
            if executed >= self.limit {
                info!("已执行 {executed} 个任务，达到上限，停止Worker");
                self.stop_signal.request();
            }
        }
    }
}

/// 运行满一段墙钟时间后停止Worker
pub struct StopWorkerOnTimeLimitListener {
    limit: Duration,
    started: Mutex<Option<Instant>>,
    stop_signal: Arc<StopSignal>,
}

impl StopWorkerOnTimeLimitListener {
    pub fn new(limit: Duration, stop_signal: Arc<StopSignal>) -> Self {
        Self {
            limit,
            started: Mutex::new(None),
            stop_signal,
        }
    }
}

#[async_trait]
impl EventListener for StopWorkerOnTimeLimitListener {
    async fn on_event(&self, event: &SchedulerEvent) {
        let Ok(mut started) = self.started.lock() else {
            return;
        };

        if let SchedulerEvent::WorkerStarted { .. } = event {
            *started = Some(Instant::now());
            return;
        }

        if let Some(start) = *started {
            if start.elapsed() >= self.limit {
                info!("Worker运行时长达到上限 {:?}，停止Worker", self.limit);
                self.stop_signal.request();
            }
        }
    }
}

/// 失败任务累计N个后停止Worker
pub struct StopWorkerOnFailureLimitListener {
    limit: usize,
    failed: AtomicUsize,
    stop_signal: Arc<StopSignal>,
}

impl StopWorkerOnFailureLimitListener {
    pub fn new(limit: usize, stop_signal: Arc<StopSignal>) -> Self {
        Self {
            limit,
            failed: AtomicUsize::new(0),
            stop_signal,
        }
    }
}

#[async_trait]
impl EventListener for StopWorkerOnFailureLimitListener {
    async fn on_event(&self, event: &SchedulerEvent) {
        if let SchedulerEvent::TaskFailed { .. } = event {
            let failed = self.failed.fetch_add(1, Ordering::SeqCst) + 1;
            if failed >= self.limit {
                warn!("失败任务累计 {failed} 个，达到上限，停止Worker");
                self.stop_signal.request();
            }
        }
    }
}

/// 单次任务回收：收到SingleRunTaskExecuted后把任务从调度器注销
pub struct SingleRunTaskListener {
    scheduler: Arc<Scheduler>,
}

impl SingleRunTaskListener {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl EventListener for SingleRunTaskListener {
    async fn on_event(&self, event: &SchedulerEvent) {
        if let SchedulerEvent::SingleRunTaskExecuted { task, .. } = event {
            match self.scheduler.unschedule(&task.name).await {
                Ok(()) => info!("单次任务 {} 已回收", task.name),
                Err(e) => error!("单次任务 {} 回收失败: {e}", task.name),
            }
        }
    }
}

/// 把每个生命周期事件写入tracing日志
pub struct TaskLoggerListener;

#[async_trait]
impl EventListener for TaskLoggerListener {
    async fn on_event(&self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::TaskScheduled { task, .. } => {
                info!("已调度: {}", task.entity_description());
            }
            SchedulerEvent::TaskUnscheduled { task_name, .. } => {
                info!("已注销: 任务 {task_name}");
            }
            SchedulerEvent::TaskExecuting { task, .. } => {
                info!("开始执行: {}", task.entity_description());
            }
            SchedulerEvent::TaskExecuted { task, output, .. } => {
                if output.is_error {
                    warn!(
                        "执行完成但结果异常: 任务 {}, 输出: {:?}",
                        task.name, output.content
                    );
                } else {
                    info!("执行完成: 任务 {}", task.name);
                }
            }
            SchedulerEvent::TaskFailed { failed_task, .. } => {
                error!(
                    "执行失败: 任务 {}, 原因: {}",
                    failed_task.name(),
                    failed_task.reason
                );
            }
            other => {
                info!("生命周期事件: {}", other.event_type());
            }
        }
    }
}
