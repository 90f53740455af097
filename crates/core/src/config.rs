use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::{SchedulerError, SchedulerResult};

/// 应用配置，从TOML文件加载，缺省值覆盖全部字段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 调度器时区，所有schedule写入的任务默认继承该时区
    pub timezone: String,
    /// 存储DSN，例如 memory://first_in_first_out
    pub storage_dsn: String,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 整分钟边界之后追加的固定延迟（秒）
    pub sleep_duration_delay_secs: u64,
    /// 消费任务数上限，超过后停止Worker
    pub max_consumed_tasks: Option<usize>,
    /// 运行墙钟时长上限（秒）
    pub max_execution_duration_secs: Option<u64>,
    /// 失败任务数上限
    pub max_failed_tasks: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            storage_dsn: "memory://first_in_first_out".to_string(),
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sleep_duration_delay_secs: 1,
            max_consumed_tasks: None,
            max_execution_duration_secs: None,
            max_failed_tasks: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> SchedulerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SchedulerError::config_error(format!(
                "读取配置文件 {} 失败: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| SchedulerError::config_error(format!("解析配置文件失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        self.parse_timezone()?;
        if self.storage_dsn.is_empty() {
            return Err(SchedulerError::config_error("storage_dsn不能为空"));
        }
        Ok(())
    }

    pub fn parse_timezone(&self) -> SchedulerResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| SchedulerError::config_error(format!("无效的时区: {}", self.timezone)))
    }
}
