use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use taskloop_core::{
    SchedulerError, SchedulerResult, Storage, StorageOptions, Task, TaskList,
};
use taskloop_dispatcher::SchedulePolicyOrchestrator;

/// 进程内存储
///
/// 任务保存在读写锁保护的有序列表里，每次create后按配置的
/// execution_mode重排整个列表，list返回的顺序就是执行顺序。
pub struct InMemoryStorage {
    tasks: RwLock<TaskList>,
    options: StorageOptions,
    orchestrator: SchedulePolicyOrchestrator,
}

impl InMemoryStorage {
    pub fn new(options: StorageOptions) -> Self {
        Self {
            tasks: RwLock::new(TaskList::new()),
            options,
            orchestrator: SchedulePolicyOrchestrator::with_default_policies(),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(StorageOptions::default())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.tasks
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        Ok(self.tasks.read().await.clone())
    }

    async fn create(&self, mut task: Task) -> SchedulerResult<()> {
        if let Some(nice) = self.options.nice {
            task.nice = Some(nice);
        }

        let mut tasks = self.tasks.write().await;
        let name = task.name.clone();
        tasks.add(task)?;

        let sorted = self
            .orchestrator
            .sort(&self.options.execution_mode, tasks.clone())?;
        *tasks = sorted;

        debug!(
            "任务 {name} 已入库, 当前排序策略: {}",
            self.options.execution_mode
        );
        Ok(())
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let slot = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?;
        *slot = task;
        Ok(())
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.tasks
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?
            .pause()
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?
            .resume()
    }

    async fn clear(&self) -> SchedulerResult<()> {
        *self.tasks.write().await = TaskList::new();
        Ok(())
    }

    fn options(&self) -> StorageOptions {
        self.options.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskloop_core::TaskPayload;

    fn null_task(name: &str) -> Task {
        Task::new(name, TaskPayload::Null)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let storage = InMemoryStorage::default();
        storage.create(null_task("app")).await.unwrap();

        let task = storage.get("app").await.unwrap();
        assert_eq!(task.name, "app");
        assert!(matches!(
            storage.get("missing").await.unwrap_err(),
            SchedulerError::TaskNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_create_duplicate_rejected() {
        let storage = InMemoryStorage::default();
        storage.create(null_task("app")).await.unwrap();

        let err = storage.create(null_task("app")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyScheduled { .. }));
        assert_eq!(storage.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_configured_nice_applied_on_create() {
        let storage = InMemoryStorage::new(StorageOptions {
            nice: Some(10),
            ..StorageOptions::default()
        });
        storage.create(null_task("app")).await.unwrap();

        assert_eq!(storage.get("app").await.unwrap().nice, Some(10));
    }

    #[tokio::test]
    async fn test_list_resorted_by_execution_mode() {
        // nice模式下priority为0的任务按nice升序
        let storage = InMemoryStorage::new(StorageOptions {
            execution_mode: "nice".to_string(),
            ..StorageOptions::default()
        });
        storage.create(null_task("patient").with_nice(5)).await.unwrap();
        storage.create(null_task("eager").with_nice(1)).await.unwrap();

        assert_eq!(storage.list().await.unwrap().names(), vec!["eager", "patient"]);
    }

    #[tokio::test]
    async fn test_update_missing_task_fails() {
        let storage = InMemoryStorage::default();
        let err = storage.update("app", null_task("app")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn test_pause_resume_transitions() {
        let storage = InMemoryStorage::default();
        storage.create(null_task("app")).await.unwrap();

        storage.pause("app").await.unwrap();
        assert!(matches!(
            storage.pause("app").await.unwrap_err(),
            SchedulerError::LogicViolation(_)
        ));

        storage.resume("app").await.unwrap();
        assert!(storage.get("app").await.unwrap().is_enabled());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let storage = InMemoryStorage::default();
        storage.create(null_task("app")).await.unwrap();
        storage.create(null_task("foo")).await.unwrap();

        storage.clear().await.unwrap();
        assert!(storage.list().await.unwrap().is_empty());
    }
}
