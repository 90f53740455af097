use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::SchedulerResult;
use crate::models::{Task, TaskList};

/// 存储后端配置项，来源于DSN的host与query部分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageOptions {
    /// 排序策略名称，create时用于重排任务列表
    pub execution_mode: String,
    /// 配置后create会为所有入库任务统一设置nice值
    pub nice: Option<i64>,
    pub extra: HashMap<String, String>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            execution_mode: "first_in_first_out".to_string(),
            nice: None,
            extra: HashMap::new(),
        }
    }
}

/// 任务持久化接口
///
/// Scheduler只依赖这个接口，不关心底层是内存、文件还是组合后端。
/// create必须保证name唯一，重复创建返回AlreadyScheduled。
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, name: &str) -> SchedulerResult<Task>;

    async fn list(&self) -> SchedulerResult<TaskList>;

    async fn create(&self, task: Task) -> SchedulerResult<()>;

    /// 更新已存在的任务，name不存在时返回TaskNotFound，不做隐式创建
    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;

    async fn delete(&self, name: &str) -> SchedulerResult<()>;

    async fn pause(&self, name: &str) -> SchedulerResult<()>;

    async fn resume(&self, name: &str) -> SchedulerResult<()>;

    async fn clear(&self) -> SchedulerResult<()>;

    fn options(&self) -> StorageOptions;
}
