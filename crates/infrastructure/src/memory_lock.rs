use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use taskloop_core::{LockGuard, LockProvider, SchedulerResult};

/// 进程内命名锁
///
/// 同一个名字同一时刻只能有一个持有者，锁随守卫Drop自动释放。
/// 单进程部署下用它保证同名任务不会并发执行。
#[derive(Default)]
pub struct InMemoryLockProvider {
    held: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

struct InMemoryLockGuard {
    name: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl LockGuard for InMemoryLockGuard {}

impl Drop for InMemoryLockGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.name);
        }
        debug!("锁 {} 已释放", self.name);
    }
}

#[async_trait]
impl LockProvider for InMemoryLockProvider {
    async fn acquire(&self, name: &str) -> SchedulerResult<Option<Box<dyn LockGuard>>> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| taskloop_core::SchedulerError::Internal("锁表已中毒".to_string()))?;

        if !held.insert(name.to_string()) {
            return Ok(None);
        }

        debug!("锁 {name} 已获取");
        Ok(Some(Box::new(InMemoryLockGuard {
            name: name.to_string(),
            held: self.held.clone(),
        })))
    }
}
