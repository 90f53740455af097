use async_trait::async_trait;

use crate::errors::SchedulerResult;

/// 锁守卫，drop即释放
///
/// Worker在任务执行的清理路径上依赖drop语义，保证无论成功失败
/// 锁都会被释放。
pub trait LockGuard: Send + Sync {}

/// 以任务name为键的互斥锁提供者
///
/// 同一name的锁在任意时刻至多被一个持有者获得，这是跨Worker进程
/// 的唯一同步原语。获取失败（已被他人持有）返回None，调用方本轮
/// 跳过该任务而不是原地重试。
#[async_trait]
pub trait LockProvider: Send + Sync {
    async fn acquire(&self, name: &str) -> SchedulerResult<Option<Box<dyn LockGuard>>>;
}
