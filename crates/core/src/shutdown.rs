use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::debug;

/// 协作式停止信号
///
/// Worker只在任务之间与轮次之间轮询该信号，从不强行中断正在执行的
/// 运行器。信号源对Worker是外部的：停止条件监听器、CLI的ctrl-c处理
/// 都通过request触发，核心代码不直接依赖操作系统信号。
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// 请求停止，幂等
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            debug!("停止信号已触发");
        }
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// 清除停止标记，restart时使用
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    /// 挂起直到停止被请求，已请求时立即返回
    pub async fn wait(&self) {
        while !self.is_requested() {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_wakes_waiter() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.request();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("等待停止信号超时")
            .unwrap();
        assert!(signal.is_requested());
    }

    #[tokio::test]
    async fn test_reset_clears_flag() {
        let signal = StopSignal::new();
        signal.request();
        assert!(signal.is_requested());

        signal.reset();
        assert!(!signal.is_requested());
    }
}
