use async_trait::async_trait;

use crate::errors::SchedulerResult;
use crate::models::Task;

/// 消息总线
///
/// 标记为queued的任务在schedule时被移交给总线而不是写入存储，
/// 由总线的消费端异步执行。
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn dispatch(&self, task: Task) -> SchedulerResult<()>;
}
