//! 组合存储
//!
//! 把多个存储后端组合成一个Storage：failover按固定顺序逐个尝试，
//! roundrobin每次调用轮换起始后端，longtail优先使用任务最少的
//! 后端。三者共享同一套"依序尝试、首个成功即返回"的执行逻辑。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use taskloop_core::{
    SchedulerError, SchedulerResult, Storage, StorageOptions, Task, TaskList,
};

/// 按给定顺序逐个尝试后端，第一个成功的结果直接返回，
/// 全部失败时携带最后一个失败原因报错
async fn execute<T, F>(ordered: Vec<Arc<dyn Storage>>, op: F) -> SchedulerResult<T>
where
    F: Fn(Arc<dyn Storage>) -> BoxFuture<'static, SchedulerResult<T>>,
{
    let mut last_error: Option<SchedulerError> = None;
    for storage in ordered {
        match op(storage).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("存储后端执行失败，尝试下一个: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(SchedulerError::storage_error(format!(
        "所有存储后端均执行失败: {}",
        last_error.map_or_else(|| "没有可用的后端".to_string(), |e| e.to_string())
    )))
}

macro_rules! delegate_storage {
    ($target:ty) => {
        #[async_trait]
        impl Storage for $target {
            async fn get(&self, name: &str) -> SchedulerResult<Task> {
                let name = name.to_string();
                execute(self.ordered().await?, move |s| {
                    let name = name.clone();
                    Box::pin(async move { s.get(&name).await })
                })
                .await
            }

            async fn list(&self) -> SchedulerResult<TaskList> {
                execute(self.ordered().await?, |s| {
                    Box::pin(async move { s.list().await })
                })
                .await
            }

            async fn create(&self, task: Task) -> SchedulerResult<()> {
                execute(self.ordered().await?, move |s| {
                    let task = task.clone();
                    Box::pin(async move { s.create(task).await })
                })
                .await
            }

            async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
                let name = name.to_string();
                execute(self.ordered().await?, move |s| {
                    let name = name.clone();
                    let task = task.clone();
                    Box::pin(async move { s.update(&name, task).await })
                })
                .await
            }

            async fn delete(&self, name: &str) -> SchedulerResult<()> {
                let name = name.to_string();
                execute(self.ordered().await?, move |s| {
                    let name = name.clone();
                    Box::pin(async move { s.delete(&name).await })
                })
                .await
            }

            async fn pause(&self, name: &str) -> SchedulerResult<()> {
                let name = name.to_string();
                execute(self.ordered().await?, move |s| {
                    let name = name.clone();
                    Box::pin(async move { s.pause(&name).await })
                })
                .await
            }

            async fn resume(&self, name: &str) -> SchedulerResult<()> {
                let name = name.to_string();
                execute(self.ordered().await?, move |s| {
                    let name = name.clone();
                    Box::pin(async move { s.resume(&name).await })
                })
                .await
            }

            async fn clear(&self) -> SchedulerResult<()> {
                execute(self.ordered().await?, |s| {
                    Box::pin(async move { s.clear().await })
                })
                .await
            }

            fn options(&self) -> StorageOptions {
                self.storages
                    .first()
                    .map(|s| s.options())
                    .unwrap_or_default()
            }
        }
    };
}

/// 故障转移存储：严格按注册顺序尝试
pub struct FailoverStorage {
    storages: Vec<Arc<dyn Storage>>,
}

impl FailoverStorage {
    pub fn new(storages: Vec<Arc<dyn Storage>>) -> Self {
        Self { storages }
    }

    async fn ordered(&self) -> SchedulerResult<Vec<Arc<dyn Storage>>> {
        Ok(self.storages.clone())
    }
}

delegate_storage!(FailoverStorage);

/// 轮询存储：每次调用从下一个后端开始，失败时继续顺延
pub struct RoundRobinStorage {
    storages: Vec<Arc<dyn Storage>>,
    cursor: AtomicUsize,
}

impl RoundRobinStorage {
    pub fn new(storages: Vec<Arc<dyn Storage>>) -> Self {
        Self {
            storages,
            cursor: AtomicUsize::new(0),
        }
    }

    async fn ordered(&self) -> SchedulerResult<Vec<Arc<dyn Storage>>> {
        if self.storages.is_empty() {
            return Ok(Vec::new());
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % self.storages.len();
        let mut ordered = self.storages[start..].to_vec();
        ordered.extend_from_slice(&self.storages[..start]);
        Ok(ordered)
    }
}

delegate_storage!(RoundRobinStorage);

/// 长尾存储：优先使用任务数最少的后端
pub struct LongTailStorage {
    storages: Vec<Arc<dyn Storage>>,
}

impl LongTailStorage {
    pub fn new(storages: Vec<Arc<dyn Storage>>) -> Self {
        Self { storages }
    }

    async fn ordered(&self) -> SchedulerResult<Vec<Arc<dyn Storage>>> {
        let mut weighted = Vec::with_capacity(self.storages.len());
        for storage in &self.storages {
            let count = storage.list().await?.len();
            weighted.push((count, storage.clone()));
        }
        weighted.sort_by_key(|(count, _)| *count);
        Ok(weighted.into_iter().map(|(_, storage)| storage).collect())
    }
}

delegate_storage!(LongTailStorage);
