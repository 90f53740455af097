//! 组件装配
//!
//! 显式构造注入：配置→存储→调度器→监听器→Worker，没有全局容器。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use taskloop_core::{AppConfig, EventBus, SchedulerError, SchedulerResult, StopSignal, Task};
use taskloop_dispatcher::Scheduler;
use taskloop_infrastructure::{InMemoryLockProvider, StorageFactory};
use taskloop_worker::{
    CommandRunner, HttpRunner, NotificationRunner, NullRunner, ShellRunner, SingleRunTaskListener,
    StopWorkerOnFailureLimitListener, StopWorkerOnTaskLimitListener, StopWorkerOnTimeLimitListener,
    TaskLoggerListener, Worker, WorkerOptions,
};

/// 任务清单文件，`[[tasks]]`条目的TOML数组
#[derive(Debug, Deserialize)]
struct TaskManifest {
    #[serde(default)]
    tasks: Vec<Task>,
}

pub fn load_tasks<P: AsRef<Path>>(path: P) -> SchedulerResult<Vec<Task>> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        SchedulerError::config_error(format!(
            "读取任务清单 {} 失败: {e}",
            path.as_ref().display()
        ))
    })?;
    let manifest: TaskManifest = toml::from_str(&content)
        .map_err(|e| SchedulerError::config_error(format!("解析任务清单失败: {e}")))?;
    Ok(manifest.tasks)
}

pub struct App {
    config: AppConfig,
    scheduler: Arc<Scheduler>,
    event_bus: Arc<EventBus>,
    stop_signal: Arc<StopSignal>,
}

impl App {
    pub fn new(config: AppConfig) -> SchedulerResult<Self> {
        let timezone = config.parse_timezone()?;
        let storage = StorageFactory::create(&config.storage_dsn)?;
        let event_bus = Arc::new(EventBus::new());
        let scheduler = Arc::new(Scheduler::new(timezone, storage, event_bus.clone()));

        Ok(Self {
            config,
            scheduler,
            event_bus,
            stop_signal: Arc::new(StopSignal::new()),
        })
    }

    async fn register_tasks(&self, tasks: Vec<Task>) -> SchedulerResult<()> {
        for task in tasks {
            let name = task.name.clone();
            self.scheduler.schedule(task).await?;
            info!("任务 {name} 已登记");
        }
        Ok(())
    }

    /// 打印当前到期的任务后退出
    pub async fn print_due_tasks(&self, tasks: Vec<Task>) -> SchedulerResult<()> {
        self.register_tasks(tasks).await?;

        let due = self.scheduler.get_due_tasks().await?;
        if due.is_empty() {
            println!("当前没有到期任务");
            return Ok(());
        }
        for task in &due {
            println!("{}", task.entity_description());
        }
        Ok(())
    }

    /// 启动Worker循环，直到停止信号触发
    pub async fn run_worker(&self, tasks: Vec<Task>) -> SchedulerResult<()> {
        self.register_tasks(tasks).await?;
        self.subscribe_listeners().await;
        self.spawn_ctrl_c_handler();

        let worker = Worker::builder()
            .scheduler(self.scheduler.clone())
            .lock_provider(Arc::new(InMemoryLockProvider::new()))
            .event_bus(self.event_bus.clone())
            .stop_signal(self.stop_signal.clone())
            .register_runner(Arc::new(ShellRunner))
            .register_runner(Arc::new(CommandRunner))
            .register_runner(Arc::new(HttpRunner::new()))
            .register_runner(Arc::new(NotificationRunner))
            .register_runner(Arc::new(NullRunner))
            .options(WorkerOptions {
                sleep_duration_delay: Duration::from_secs(
                    self.config.worker.sleep_duration_delay_secs,
                ),
            })
            .build()?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        info!("Worker启动于 {host}, 存储: {}", self.config.storage_dsn);

        worker.run().await?;

        let failed = worker.get_failed_tasks().await;
        if !failed.is_empty() {
            warn!("Worker退出时有 {} 个失败任务", failed.len());
        }
        Ok(())
    }

    async fn subscribe_listeners(&self) {
        self.event_bus.subscribe(Arc::new(TaskLoggerListener)).await;
        self.event_bus
            .subscribe(Arc::new(SingleRunTaskListener::new(self.scheduler.clone())))
            .await;

        let worker_config = &self.config.worker;
        if let Some(limit) = worker_config.max_consumed_tasks {
            self.event_bus
                .subscribe(Arc::new(StopWorkerOnTaskLimitListener::new(
                    limit,
                    self.stop_signal.clone(),
                )))
                .await;
        }
        if let Some(secs) = worker_config.max_execution_duration_secs {
            self.event_bus
                .subscribe(Arc::new(StopWorkerOnTimeLimitListener::new(
                    Duration::from_secs(secs),
                    self.stop_signal.clone(),
                )))
                .await;
        }
        if let Some(limit) = worker_config.max_failed_tasks {
            self.event_bus
                .subscribe(Arc::new(StopWorkerOnFailureLimitListener::new(
                    limit,
                    self.stop_signal.clone(),
                )))
                .await;
        }
    }

    /// 把ctrl-c映射到协作式停止信号，核心代码不感知操作系统信号
    fn spawn_ctrl_c_handler(&self) {
        let stop_signal = self.stop_signal.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("收到ctrl-c，请求Worker停止");
                stop_signal.request();
            }
        });
    }
}
