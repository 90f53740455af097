//! 调度器
//!
//! Scheduler负责任务的登记、注销与到期挑选，执行本身交给Worker。
//! 所有时间判定都走SynchronizedClock，保证同一轮询周期内的判定
//! 基于同一个时刻，不受系统时钟在轮询中途跳变的影响。

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use taskloop_core::{
    EventBus, MessageBus, SchedulerError, SchedulerEvent, SchedulerResult, Storage, Task, TaskList,
};

use crate::cron_utils::CronSchedule;

/// 时钟漂移容忍上限（毫秒）
const DEFAULT_MAX_DRIFT_MS: i64 = 5_000;

/// 单调同步时钟
///
/// 以创建时刻为基准，用单调时钟推进当前时间。每次取时会对照
/// 系统时钟做一次漂移检查，偏差超限说明系统时间被调整过，
/// 此时拒绝给出时间，由调用方决定如何处理。
pub struct SynchronizedClock {
    initialized_at: DateTime<Utc>,
    started: Instant,
    max_drift_ms: i64,
}

impl SynchronizedClock {
    pub fn new() -> Self {
        Self {
            initialized_at: Utc::now(),
            started: Instant::now(),
            max_drift_ms: DEFAULT_MAX_DRIFT_MS,
        }
    }

    pub fn with_max_drift_ms(mut self, max_drift_ms: i64) -> Self {
        self.max_drift_ms = max_drift_ms;
        self
    }

    /// 基准时刻 + 单调流逝时长
    pub fn synchronized_now(&self) -> SchedulerResult<DateTime<Utc>> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .map_err(|e| SchedulerError::Internal(format!("时钟流逝时长溢出: {e}")))?;
        let synchronized = self.initialized_at + elapsed;

        let drift_ms = (Utc::now() - synchronized).num_milliseconds().abs();
        if drift_ms > self.max_drift_ms {
            return Err(SchedulerError::ClockDriftExceeded {
                drift_ms,
                max_drift_ms: self.max_drift_ms,
            });
        }

        Ok(synchronized)
    }

    #[cfg(test)]
    fn backdated(offset: chrono::Duration) -> Self {
        Self {
            initialized_at: Utc::now() - offset,
            started: Instant::now(),
            max_drift_ms: DEFAULT_MAX_DRIFT_MS,
        }
    }
}

impl Default for SynchronizedClock {
    fn default() -> Self {
        Self::new()
    }
}

/// 任务调度器
///
/// 登记时校验CRON表达式并写入调度时间戳；带queued标记的任务在
/// 配置了消息总线时直接转发到总线，不落存储。
pub struct Scheduler {
    timezone: Tz,
    storage: Arc<dyn Storage>,
    event_bus: Arc<EventBus>,
    message_bus: Option<Arc<dyn MessageBus>>,
    clock: SynchronizedClock,
}

impl Scheduler {
    pub fn new(timezone: Tz, storage: Arc<dyn Storage>, event_bus: Arc<EventBus>) -> Self {
        Self {
            timezone,
            storage,
            event_bus,
            message_bus: None,
            clock: SynchronizedClock::new(),
        }
    }

    pub fn with_message_bus(mut self, message_bus: Arc<dyn MessageBus>) -> Self {
        self.message_bus = Some(message_bus);
        self
    }

    pub fn with_clock(mut self, clock: SynchronizedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn get_timezone(&self) -> Tz {
        self.timezone
    }

    /// 登记任务
    ///
    /// 表达式非法立即拒绝；name冲突由存储返回AlreadyScheduled。
    pub async fn schedule(&self, mut task: Task) -> SchedulerResult<()> {
        CronSchedule::validate(&task.expression)?;

        // 未显式指定时区的任务继承调度器时区，显式指定的一律保留
        if task.timezone.is_none() {
            task.timezone = Some(self.timezone);
        }
        task.scheduled_at = Some(self.clock.synchronized_now()?);

        if task.is_queued {
            if let Some(message_bus) = &self.message_bus {
                message_bus.dispatch(task.clone()).await?;
                info!("任务 {} 已转发到消息总线", task.name);
                self.event_bus
                    .dispatch(SchedulerEvent::task_scheduled(task))
                    .await;
                return Ok(());
            }
            warn!("任务 {} 要求入队但未配置消息总线，改为直接入库", task.name);
        }

        self.storage.create(task.clone()).await?;
        debug!("任务 {} 已登记, 表达式: {}", task.name, task.expression);
        self.event_bus
            .dispatch(SchedulerEvent::task_scheduled(task))
            .await;
        Ok(())
    }

    /// 注销任务并发布TaskUnscheduled事件
    pub async fn unschedule(&self, name: &str) -> SchedulerResult<()> {
        self.storage.delete(name).await?;
        info!("任务 {name} 已注销");
        self.event_bus
            .dispatch(SchedulerEvent::task_unscheduled(name))
            .await;
        Ok(())
    }

    /// 覆盖更新已登记的任务
    pub async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.storage.update(name, task).await
    }

    pub async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.storage.pause(name).await
    }

    pub async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.storage.resume(name).await
    }

    pub async fn get_task(&self, name: &str) -> SchedulerResult<Task> {
        self.storage.get(name).await
    }

    pub async fn get_tasks(&self) -> SchedulerResult<TaskList> {
        self.storage.list().await
    }

    /// 挑出当前时刻到期的任务
    ///
    /// 整个挑选过程用同一个同步时刻判定；表达式非法的存量任务
    /// 记录告警后跳过，不影响其他任务。
    pub async fn get_due_tasks(&self) -> SchedulerResult<TaskList> {
        let now = self.clock.synchronized_now()?;
        let tasks = self.storage.list().await?;

        Ok(tasks.filter(|task| match CronSchedule::new(&task.expression) {
            Ok(schedule) => schedule.is_due(now, task.timezone.unwrap_or(self.timezone)),
            Err(e) => {
                warn!("任务 {} 的表达式无法解析，已跳过: {e}", task.name);
                false
            }
        }))
    }

    /// 重启宏处理：清空存储，只把`@reboot`任务重新登记回去
    pub async fn reboot(&self) -> SchedulerResult<()> {
        let reboot_tasks = self.storage.list().await?.filter(Task::is_reboot);

        self.storage.clear().await?;
        for task in reboot_tasks {
            self.storage.create(task).await?;
        }

        info!("调度器已重启，仅保留@reboot任务");
        self.event_bus
            .dispatch(SchedulerEvent::scheduler_rebooted())
            .await;
        Ok(())
    }
}
