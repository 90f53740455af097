use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::{SchedulerError, SchedulerResult};

/// 保留的"重启宏"表达式，携带该表达式的任务只在调度器reboot时重建，
/// 永远不会被普通的CRON求值命中
pub const REBOOT_MACRO: &str = "@reboot";

/// 任务生命周期状态，决定Worker是否会执行该任务
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    #[serde(rename = "enabled")]
    Enabled,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "disabled")]
    Disabled,
    /// 初始/非法状态，到达Worker的执行检查即为致命错误
    #[serde(rename = "undefined")]
    Undefined,
}

/// 执行结果状态，每次运行后由Worker覆盖写入
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionState {
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "succeed")]
    Succeed,
    #[serde(rename = "errored")]
    Errored,
    #[serde(rename = "done")]
    Done,
    #[serde(rename = "incomplete")]
    Incomplete,
    #[serde(rename = "to_retry")]
    ToRetry,
}

/// 任务种类，封闭集合，Worker用它在运行器查找表中做分发
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Shell,
    Command,
    Http,
    Callback,
    Messenger,
    Notification,
    Null,
}

/// 各任务种类携带的负载数据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    Shell {
        command: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        cwd: Option<PathBuf>,
    },
    Command {
        command: String,
        #[serde(default)]
        arguments: Vec<String>,
    },
    Http {
        url: String,
        #[serde(default = "default_http_method")]
        method: String,
    },
    /// 指向运行器内注册的具名处理函数
    Callback { handler: String },
    Messenger { message: serde_json::Value },
    Notification {
        subject: String,
        body: String,
        #[serde(default)]
        recipients: Vec<String>,
    },
    Null,
}

fn default_http_method() -> String {
    "GET".to_string()
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Shell { .. } => TaskKind::Shell,
            TaskPayload::Command { .. } => TaskKind::Command,
            TaskPayload::Http { .. } => TaskKind::Http,
            TaskPayload::Callback { .. } => TaskKind::Callback,
            TaskPayload::Messenger { .. } => TaskKind::Messenger,
            TaskPayload::Notification { .. } => TaskKind::Notification,
            TaskPayload::Null => TaskKind::Null,
        }
    }
}

/// 可调度的工作单元
///
/// 以唯一的name为标识，携带调度元数据、生命周期状态与执行结果状态。
/// 由Scheduler写入调度时间戳，由Worker写入执行时间戳与执行结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    /// 标准5字段CRON表达式，或保留的`@reboot`宏
    pub expression: String,
    /// None表示未显式指定，登记时由Scheduler补成调度器时区
    pub timezone: Option<Tz>,
    pub payload: TaskPayload,
    pub state: TaskState,
    pub execution_state: Option<ExecutionState>,
    /// 排序策略输入，0表示"无偏好"
    pub priority: i64,
    pub nice: Option<i64>,
    /// round_robin策略的时间片上限
    pub max_duration: Option<Duration>,
    /// 实测执行耗时，由Worker回填
    pub execution_computation_time: Option<Duration>,
    pub execution_relative_deadline: Option<Duration>,
    /// 由 arrival_time + execution_relative_deadline 推导
    pub execution_absolute_deadline: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub execution_start_time: Option<DateTime<Utc>>,
    pub execution_end_time: Option<DateTime<Utc>>,
    pub last_execution: Option<DateTime<Utc>>,
    pub is_queued: bool,
    pub is_single_run: bool,
    pub is_tracked: bool,
    pub must_run_in_background: bool,
    pub is_output: bool,
    pub tags: Vec<String>,
}

impl Task {
    pub fn new<S: Into<String>>(name: S, payload: TaskPayload) -> Self {
        Self {
            name: name.into(),
            expression: "* * * * *".to_string(),
            timezone: None,
            payload,
            state: TaskState::Enabled,
            execution_state: None,
            priority: 0,
            nice: None,
            max_duration: None,
            execution_computation_time: None,
            execution_relative_deadline: None,
            execution_absolute_deadline: None,
            arrival_time: None,
            scheduled_at: None,
            execution_start_time: None,
            execution_end_time: None,
            last_execution: None,
            is_queued: false,
            is_single_run: false,
            is_tracked: true,
            must_run_in_background: false,
            is_output: false,
            tags: Vec::new(),
        }
    }

    pub fn with_expression<S: Into<String>>(mut self, expression: S) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_nice(mut self, nice: i64) -> Self {
        self.nice = Some(nice);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn with_relative_deadline(mut self, deadline: Duration) -> Self {
        self.execution_relative_deadline = Some(deadline);
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }

    pub fn single_run(mut self) -> Self {
        self.is_single_run = true;
        self
    }

    pub fn queued(mut self) -> Self {
        self.is_queued = true;
        self
    }

    pub fn add_tag<S: Into<String>>(&mut self, tag: S) {
        self.tags.push(tag.into());
    }

    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }

    pub fn is_reboot(&self) -> bool {
        self.expression == REBOOT_MACRO
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, TaskState::Enabled)
    }

    /// 暂停任务，重复暂停视为非法状态变更
    pub fn pause(&mut self) -> SchedulerResult<()> {
        if matches!(self.state, TaskState::Paused) {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 已处于暂停状态",
                self.name
            )));
        }
        self.state = TaskState::Paused;
        Ok(())
    }

    /// 恢复任务，对已启用任务调用视为非法状态变更
    pub fn resume(&mut self) -> SchedulerResult<()> {
        if matches!(self.state, TaskState::Enabled) {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 已处于启用状态",
                self.name
            )));
        }
        self.state = TaskState::Enabled;
        Ok(())
    }

    /// 根据到达时间与相对截止期重算绝对截止期，deadline策略每次排序前调用
    pub fn refresh_absolute_deadline(&mut self) {
        if let (Some(arrival), Some(relative)) =
            (self.arrival_time, self.execution_relative_deadline)
        {
            if let Ok(delta) = chrono::Duration::from_std(relative) {
                self.execution_absolute_deadline = Some(arrival + delta);
            }
        }
    }

    /// round_robin策略：任务是否已耗尽其时间片
    pub fn exhausted_quantum(&self) -> bool {
        match (self.execution_computation_time, self.max_duration) {
            (Some(spent), Some(quota)) => spent >= quota,
            _ => false,
        }
    }

    pub fn entity_description(&self) -> String {
        format!(
            "任务 '{}' (种类: {:?}, 表达式: {})",
            self.name,
            self.kind(),
            self.expression
        )
    }
}

/// 运行器产出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub content: Option<String>,
    pub is_error: bool,
}

impl Output {
    pub fn success<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
            is_error: false,
        }
    }

    pub fn error<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
            is_error: true,
        }
    }

    pub fn empty() -> Self {
        Self {
            content: None,
            is_error: false,
        }
    }
}

/// 执行失败的任务及其失败原因，一经创建不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedTask {
    pub task: Task,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl FailedTask {
    pub fn new(task: Task, reason: String) -> Self {
        Self {
            task,
            reason,
            failed_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.task.name
    }
}
