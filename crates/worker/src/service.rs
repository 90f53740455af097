//! Worker执行循环
//!
//! 单实例内严格串行：逐个执行到期任务，按任务名加锁保证同名任务
//! 跨进程互斥。运行器失败被就地包装成FailedTask，循环继续；只有
//! 前置条件类错误（无运行器、Undefined状态、时钟失步）会终止循环。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use taskloop_core::{
    EventBus, ExecutionState, FailedTask, LockProvider, Runner, SchedulerError, SchedulerEvent,
    SchedulerResult, StopSignal, Task, TaskKind, TaskList, TaskState,
};
use taskloop_dispatcher::Scheduler;

/// Worker运行参数
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// 每轮执行完后，在下一个整分边界之上追加的等待时长
    pub sleep_duration_delay: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            sleep_duration_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

pub struct Worker {
    scheduler: Arc<Scheduler>,
    runners: HashMap<TaskKind, Arc<dyn Runner>>,
    lock_provider: Arc<dyn LockProvider>,
    event_bus: Arc<EventBus>,
    stop_signal: Arc<StopSignal>,
    options: WorkerOptions,
    state: RwLock<WorkerState>,
    failed_tasks: RwLock<Vec<FailedTask>>,
    is_running: AtomicBool,
}

impl Worker {
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn stop_signal(&self) -> Arc<StopSignal> {
        self.stop_signal.clone()
    }

    /// 进程内累计的失败任务，供CLI查看与手工重试
    pub async fn get_failed_tasks(&self) -> Vec<FailedTask> {
        self.failed_tasks.read().await.clone()
    }

    /// 请求协作式停止，不打断正在执行的运行器
    pub fn stop(&self) {
        self.stop_signal.request();
    }

    /// 停止并复位：清空失败任务与停止标记，回到Idle
    pub async fn restart(&self) {
        self.stop();
        self.failed_tasks.write().await.clear();
        self.stop_signal.reset();
        *self.state.write().await = WorkerState::Idle;
        self.event_bus
            .dispatch(SchedulerEvent::worker_restarted())
            .await;
    }

    /// 持续执行循环：每轮取一次到期任务，执行完睡到下一个整分
    /// 边界再取，直到停止信号触发
    pub async fn run(&self) -> SchedulerResult<()> {
        self.ensure_runners()?;
        self.start().await;

        loop {
            let due_tasks = self.scheduler.get_due_tasks().await?;
            self.execute_pass(due_tasks).await?;

            if self.stop_signal.is_requested() {
                break;
            }

            let idle = duration_until_next_minute(Utc::now()) + self.options.sleep_duration_delay;
            debug!("本轮执行完毕，等待 {idle:?} 后重新拉取到期任务");
            tokio::select! {
                _ = self.stop_signal.wait() => break,
                _ = tokio::time::sleep(idle) => {}
            }
        }

        self.finish().await;
        Ok(())
    }

    /// 对给定任务列表执行单轮，不进入睡眠循环
    pub async fn execute(&self, tasks: TaskList) -> SchedulerResult<()> {
        self.ensure_runners()?;
        self.start().await;
        let result = self.execute_pass(tasks).await;
        self.finish().await;
        result
    }

    fn ensure_runners(&self) -> SchedulerResult<()> {
        if self.runners.is_empty() {
            return Err(SchedulerError::UndefinedRunner);
        }
        Ok(())
    }

    async fn start(&self) {
        *self.state.write().await = WorkerState::Running;
        self.event_bus
            .dispatch(SchedulerEvent::worker_started())
            .await;
    }

    async fn finish(&self) {
        *self.state.write().await = WorkerState::Stopped;
        self.event_bus
            .dispatch(SchedulerEvent::worker_stopped())
            .await;
    }

    async fn execute_pass(&self, tasks: TaskList) -> SchedulerResult<()> {
        for task in tasks {
            if self.stop_signal.is_requested() {
                break;
            }
            self.execute_task(task).await?;
        }
        Ok(())
    }

    async fn execute_task(&self, mut task: Task) -> SchedulerResult<()> {
        if matches!(task.state, TaskState::Undefined) {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 的状态为Undefined，不允许进入执行",
                task.name
            )));
        }

        if matches!(task.state, TaskState::Paused | TaskState::Disabled) {
            info!("任务 {} 处于 {:?} 状态，本轮跳过", task.name, task.state);
            return Ok(());
        }

        self.event_bus
            .dispatch(SchedulerEvent::worker_running(false))
            .await;

        let Some(runner) = self.runners.get(&task.kind()) else {
            debug!("任务 {} 的种类 {:?} 没有注册运行器，跳过", task.name, task.kind());
            return Ok(());
        };

        // 单次任务先行广播，注销由监听器完成，不属于Worker的职责
        if task.is_single_run {
            self.event_bus
                .dispatch(SchedulerEvent::single_run_task_executed(task.clone()))
                .await;
        }

        let Some(guard) = self.lock_provider.acquire(&task.name).await? else {
            info!("任务 {} 的锁被其他进程持有，本轮跳过", task.name);
            return Ok(());
        };

        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("Worker正在执行其他任务，任务 {} 本轮跳过", task.name);
            drop(guard);
            return Ok(());
        }

        self.event_bus
            .dispatch(SchedulerEvent::task_executing(task.clone()))
            .await;

        let started_at = Utc::now();
        task.arrival_time = Some(started_at);
        task.execution_start_time = Some(started_at);

        let stopwatch = Instant::now();
        let result = runner.run(&task).await;
        let elapsed = stopwatch.elapsed();

        if task.is_tracked {
            task.execution_computation_time = Some(elapsed);
        }
        let ended_at = Utc::now();
        task.execution_end_time = Some(ended_at);
        task.last_execution = Some(ended_at);

        match result {
            Ok(output) => {
                task.execution_state = Some(if output.is_error {
                    ExecutionState::Errored
                } else {
                    ExecutionState::Succeed
                });
                self.persist(task.clone()).await;
                self.event_bus
                    .dispatch(SchedulerEvent::task_executed(task, output))
                    .await;
            }
            Err(e) => {
                task.execution_state = Some(ExecutionState::Errored);
                self.persist(task.clone()).await;

                let failed = FailedTask::new(task, e.to_string());
                self.failed_tasks.write().await.push(failed.clone());
                self.event_bus
                    .dispatch(SchedulerEvent::task_failed(failed))
                    .await;
            }
        }

        self.is_running.store(false, Ordering::SeqCst);
        drop(guard);

        self.event_bus
            .dispatch(SchedulerEvent::worker_running(true))
            .await;
        Ok(())
    }

    /// 把执行后的任务状态写回存储
    ///
    /// 单次任务此时可能已被监听器注销，TaskNotFound不算错误。
    async fn persist(&self, task: Task) {
        let name = task.name.clone();
        match self.scheduler.update(&name, task).await {
            Ok(()) => {}
            Err(SchedulerError::TaskNotFound { .. }) => {
                debug!("任务 {name} 已不在存储中，跳过回写");
            }
            Err(e) => warn!("任务 {name} 执行状态回写失败: {e}"),
        }
    }
}

/// 距离下一个整分边界的时长
fn duration_until_next_minute(now: DateTime<Utc>) -> Duration {
    let next = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .map(|t| t + chrono::Duration::minutes(1))
        .unwrap_or_else(|| now + chrono::Duration::seconds(60));
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[derive(Default)]
pub struct WorkerBuilder {
    scheduler: Option<Arc<Scheduler>>,
    lock_provider: Option<Arc<dyn LockProvider>>,
    event_bus: Option<Arc<EventBus>>,
    stop_signal: Option<Arc<StopSignal>>,
    runners: HashMap<TaskKind, Arc<dyn Runner>>,
    options: WorkerOptions,
}

impl WorkerBuilder {
    pub fn scheduler(mut self, scheduler: Arc<Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn lock_provider(mut self, lock_provider: Arc<dyn LockProvider>) -> Self {
        self.lock_provider = Some(lock_provider);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn stop_signal(mut self, stop_signal: Arc<StopSignal>) -> Self {
        self.stop_signal = Some(stop_signal);
        self
    }

    /// 注册运行器，按kind入表，同kind后注册的覆盖先注册的
    pub fn register_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runners.insert(runner.kind(), runner);
        self
    }

    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> SchedulerResult<Worker> {
        let scheduler = self
            .scheduler
            .ok_or_else(|| SchedulerError::config_error("Worker缺少Scheduler"))?;
        let lock_provider = self
            .lock_provider
            .ok_or_else(|| SchedulerError::config_error("Worker缺少LockProvider"))?;

        Ok(Worker {
            scheduler,
            runners: self.runners,
            lock_provider,
            event_bus: self.event_bus.unwrap_or_default(),
            stop_signal: self.stop_signal.unwrap_or_default(),
            options: self.options,
            state: RwLock::new(WorkerState::Idle),
            failed_tasks: RwLock::new(Vec::new()),
            is_running: AtomicBool::new(false),
        })
    }
}
