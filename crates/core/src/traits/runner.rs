use async_trait::async_trait;

use crate::errors::SchedulerResult;
use crate::models::{Output, Task, TaskKind};

/// 任务运行器
///
/// Worker按TaskKind在查找表中选择运行器，一个运行器只负责一种任务。
/// run返回的Output可以携带is_error标记，抛出的错误由Worker就地
/// 包装为FailedTask，不会中断执行循环。
#[async_trait]
pub trait Runner: Send + Sync {
    fn kind(&self) -> TaskKind;

    fn supports(&self, task: &Task) -> bool {
        task.kind() == self.kind()
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output>;
}
