use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("任务已被调度: {name}")]
    AlreadyScheduled { name: String },
    #[error("任务未找到: {name}")]
    TaskNotFound { name: String },
    #[error("无效的配置: {0}")]
    InvalidConfiguration(String),
    #[error("未注册任何任务运行器")]
    UndefinedRunner,
    #[error("非法的状态变更: {0}")]
    LogicViolation(String),
    #[error("调度器时钟失去同步: 当前漂移 {drift_ms}ms, 允许上限 {max_drift_ms}ms")]
    ClockDriftExceeded { drift_ms: i64, max_drift_ms: i64 },
    #[error("存储错误: {0}")]
    Storage(String),
    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },
    #[error("无效的DSN: {0}")]
    InvalidDsn(String),
    #[error("任务执行错误: {0}")]
    TaskExecution(String),
    #[error("消息总线错误: {0}")]
    MessageBus(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn already_scheduled<S: Into<String>>(name: S) -> Self {
        Self::AlreadyScheduled { name: name.into() }
    }
    pub fn task_not_found<S: Into<String>>(name: S) -> Self {
        Self::TaskNotFound { name: name.into() }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
    pub fn logic_violation<S: Into<String>>(msg: S) -> Self {
        Self::LogicViolation(msg.into())
    }
    pub fn storage_error<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }
    pub fn execution_error<S: Into<String>>(msg: S) -> Self {
        Self::TaskExecution(msg.into())
    }
    /// 致命错误不应被调用方吞掉，Worker循环遇到后必须终止
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::UndefinedRunner
                | SchedulerError::LogicViolation(_)
                | SchedulerError::InvalidConfiguration(_)
                | SchedulerError::Internal(_)
        )
    }
    /// 可重试错误由外部CLI手动重试，核心不做自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::Storage(_)
                | SchedulerError::MessageBus(_)
                | SchedulerError::TaskExecution(_)
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SchedulerError::UndefinedRunner.is_fatal());
        assert!(SchedulerError::logic_violation("双重暂停").is_fatal());
        assert!(!SchedulerError::already_scheduled("app").is_fatal());

        assert!(SchedulerError::storage_error("连接中断").is_retryable());
        assert!(!SchedulerError::task_not_found("app").is_retryable());
    }

    #[test]
    fn test_error_display_contains_context() {
        let err = SchedulerError::ClockDriftExceeded {
            drift_ms: 12000,
            max_drift_ms: 5000,
        };
        let message = err.to_string();
        assert!(message.contains("12000"));
        assert!(message.contains("5000"));
    }
}
