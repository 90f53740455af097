//! 任务运行器
//!
//! 每种TaskKind一个运行器。运行器失败分两层：进程退出码非零、
//! HTTP非2xx这类"任务自身失败"用Output的is_error承载；进程无法
//! 启动、网络不可达这类"执行环境失败"直接返回错误，由Worker
//! 包装成FailedTask。

use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info};

use taskloop_core::{
    MessageBus, Output, Runner, SchedulerError, SchedulerResult, Task, TaskKind, TaskPayload,
};

/// Shell运行器：tokio子进程执行，捕获标准输出与标准错误
pub struct ShellRunner;

#[async_trait]
impl Runner for ShellRunner {
    fn kind(&self) -> TaskKind {
        TaskKind::Shell
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskPayload::Shell { command, env, cwd } = &task.payload else {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 的负载不是Shell类型",
                task.name
            )));
        };

        let Some((program, arguments)) = command.split_first() else {
            return Err(SchedulerError::execution_error(format!(
                "任务 {} 的命令行为空",
                task.name
            )));
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(arguments).envs(env);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        // 后台任务只负责拉起进程，不等待也不采集输出
        if task.must_run_in_background {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            cmd.spawn().map_err(|e| {
                SchedulerError::execution_error(format!("无法启动后台进程 {program}: {e}"))
            })?;
            debug!("任务 {} 已转入后台执行", task.name);
            return Ok(Output::empty());
        }

        let result = cmd.output().await.map_err(|e| {
            SchedulerError::execution_error(format!("无法启动进程 {program}: {e}"))
        })?;

        if result.status.success() {
            Ok(Output::success(
                String::from_utf8_lossy(&result.stdout).trim_end().to_string(),
            ))
        } else {
            Ok(Output::error(format!(
                "进程退出码 {}: {}",
                result.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&result.stderr).trim_end()
            )))
        }
    }
}

/// 命令运行器：单个可执行程序加参数列表，语义同Shell运行器，
/// 但负载不携带环境变量与工作目录
pub struct CommandRunner;

#[async_trait]
impl Runner for CommandRunner {
    fn kind(&self) -> TaskKind {
        TaskKind::Command
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskPayload::Command { command, arguments } = &task.payload else {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 的负载不是Command类型",
                task.name
            )));
        };

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(arguments);

        if task.must_run_in_background {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            cmd.spawn().map_err(|e| {
                SchedulerError::execution_error(format!("无法启动后台进程 {command}: {e}"))
            })?;
            debug!("任务 {} 已转入后台执行", task.name);
            return Ok(Output::empty());
        }

        let result = cmd.output().await.map_err(|e| {
            SchedulerError::execution_error(format!("无法启动进程 {command}: {e}"))
        })?;

        if result.status.success() {
            Ok(Output::success(
                String::from_utf8_lossy(&result.stdout).trim_end().to_string(),
            ))
        } else {
            Ok(Output::error(format!(
                "进程退出码 {}: {}",
                result.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&result.stderr).trim_end()
            )))
        }
    }
}

/// HTTP运行器：非2xx响应视为任务失败输出
pub struct HttpRunner {
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for HttpRunner {
    fn kind(&self) -> TaskKind {
        TaskKind::Http
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskPayload::Http { url, method } = &task.payload else {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 的负载不是Http类型",
                task.name
            )));
        };

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| SchedulerError::execution_error(format!("非法的HTTP方法: {method}")))?;

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| SchedulerError::execution_error(format!("请求 {url} 失败: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(Output::success(body))
        } else {
            Ok(Output::error(format!("HTTP {status}: {body}")))
        }
    }
}

type CallbackHandler =
    Arc<dyn Fn() -> BoxFuture<'static, SchedulerResult<Output>> + Send + Sync>;

/// 回调运行器：按名字调用注册表里的异步处理函数
#[derive(Default)]
pub struct CallbackRunner {
    handlers: HashMap<String, CallbackHandler>,
}

impl CallbackRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SchedulerResult<Output>> + Send + 'static,
    {
        self.handlers
            .insert(name.to_string(), Arc::new(move || Box::pin(handler())));
        self
    }
}

#[async_trait]
impl Runner for CallbackRunner {
    fn kind(&self) -> TaskKind {
        TaskKind::Callback
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskPayload::Callback { handler } = &task.payload else {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 的负载不是Callback类型",
                task.name
            )));
        };

        let callback = self.handlers.get(handler).ok_or_else(|| {
            SchedulerError::execution_error(format!("未注册的回调处理器: {handler}"))
        })?;

        callback().await
    }
}

/// 消息运行器：把任务转发到消息总线，由消费方执行
pub struct MessengerRunner {
    bus: Arc<dyn MessageBus>,
}

impl MessengerRunner {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Runner for MessengerRunner {
    fn kind(&self) -> TaskKind {
        TaskKind::Messenger
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        if !matches!(task.payload, TaskPayload::Messenger { .. }) {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 的负载不是Messenger类型",
                task.name
            )));
        }

        self.bus.dispatch(task.clone()).await?;
        info!("任务 {} 已转发到消息总线", task.name);
        Ok(Output::empty())
    }
}

/// 通知运行器：把通知内容按收件人逐条写入日志
///
/// 没有外部投递通道时的默认实现，投递即记录。
pub struct NotificationRunner;

#[async_trait]
impl Runner for NotificationRunner {
    fn kind(&self) -> TaskKind {
        TaskKind::Notification
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskPayload::Notification {
            subject,
            body,
            recipients,
        } = &task.payload
        else {
            return Err(SchedulerError::logic_violation(format!(
                "任务 {} 的负载不是Notification类型",
                task.name
            )));
        };

        if recipients.is_empty() {
            info!("通知 [{subject}]: {body}");
        } else {
            for recipient in recipients {
                info!("通知 [{subject}] 发往 {recipient}: {body}");
            }
        }

        Ok(Output::success(format!(
            "通知 [{subject}] 已投递给 {} 个收件人",
            recipients.len()
        )))
    }
}

/// 空运行器：什么都不做，用于占位与测试
pub struct NullRunner;

#[async_trait]
impl Runner for NullRunner {
    fn kind(&self) -> TaskKind {
        TaskKind::Null
    }

    async fn run(&self, _task: &Task) -> SchedulerResult<Output> {
        Ok(Output::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_shell_runner_captures_stdout() {
        let task = Task::new(
            "echo",
            TaskPayload::Shell {
                command: vec!["echo".to_string(), "hello".to_string()],
                env: HashMap::new(),
                cwd: None,
            },
        );

        let output = ShellRunner.run(&task).await.unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_shell_runner_nonzero_exit_is_error_output() {
        let task = Task::new(
            "fail",
            TaskPayload::Shell {
                command: vec!["false".to_string()],
                env: HashMap::new(),
                cwd: None,
            },
        );

        let output = ShellRunner.run(&task).await.unwrap();
        assert!(output.is_error);
    }

    #[tokio::test]
    async fn test_shell_runner_missing_program_is_execution_error() {
        let task = Task::new(
            "ghost",
            TaskPayload::Shell {
                command: vec!["/nonexistent/program".to_string()],
                env: HashMap::new(),
                cwd: None,
            },
        );

        let err = ShellRunner.run(&task).await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskExecution(_)));
    }

    #[tokio::test]
    async fn test_shell_runner_empty_command_rejected() {
        let task = Task::new(
            "empty",
            TaskPayload::Shell {
                command: vec![],
                env: HashMap::new(),
                cwd: None,
            },
        );

        assert!(ShellRunner.run(&task).await.is_err());
    }

    #[tokio::test]
    async fn test_command_runner_captures_stdout() {
        let task = Task::new(
            "echo",
            TaskPayload::Command {
                command: "echo".to_string(),
                arguments: vec!["hello".to_string()],
            },
        );

        let output = CommandRunner.run(&task).await.unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_command_runner_nonzero_exit_is_error_output() {
        let task = Task::new(
            "fail",
            TaskPayload::Command {
                command: "false".to_string(),
                arguments: vec![],
            },
        );

        let output = CommandRunner.run(&task).await.unwrap();
        assert!(output.is_error);
    }

    #[tokio::test]
    async fn test_command_runner_missing_program_is_execution_error() {
        let task = Task::new(
            "ghost",
            TaskPayload::Command {
                command: "/nonexistent/program".to_string(),
                arguments: vec![],
            },
        );

        let err = CommandRunner.run(&task).await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskExecution(_)));
    }

    #[tokio::test]
    async fn test_notification_runner_reports_recipient_count() {
        let task = Task::new(
            "notify",
            TaskPayload::Notification {
                subject: "夜间构建".to_string(),
                body: "构建完成".to_string(),
                recipients: vec!["ops".to_string(), "dev".to_string()],
            },
        );

        let output = NotificationRunner.run(&task).await.unwrap();
        assert!(!output.is_error);
        assert_eq!(
            output.content.as_deref(),
            Some("通知 [夜间构建] 已投递给 2 个收件人")
        );
    }

    #[tokio::test]
    async fn test_callback_runner_invokes_registered_handler() {
        let runner = CallbackRunner::new()
            .register("greet", || async { Ok(Output::success("你好")) });

        let task = Task::new(
            "cb",
            TaskPayload::Callback {
                handler: "greet".to_string(),
            },
        );
        let output = runner.run(&task).await.unwrap();
        assert_eq!(output.content.as_deref(), Some("你好"));

        let missing = Task::new(
            "cb2",
            TaskPayload::Callback {
                handler: "unknown".to_string(),
            },
        );
        assert!(runner.run(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_messenger_runner_forwards_to_bus() {
        struct RecordingBus {
            names: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl MessageBus for RecordingBus {
            async fn dispatch(&self, task: Task) -> SchedulerResult<()> {
                self.names.lock().unwrap().push(task.name);
                Ok(())
            }
        }

        let bus = Arc::new(RecordingBus {
            names: Mutex::new(Vec::new()),
        });
        let runner = MessengerRunner::new(bus.clone());

        let task = Task::new(
            "msg",
            TaskPayload::Messenger {
                message: serde_json::json!({"kind": "report"}),
            },
        );
        runner.run(&task).await.unwrap();

        assert_eq!(*bus.names.lock().unwrap(), vec!["msg".to_string()]);
    }

    #[tokio::test]
    async fn test_runner_rejects_mismatched_payload() {
        let task = Task::new("noop", TaskPayload::Null);
        assert!(matches!(
            ShellRunner.run(&task).await.unwrap_err(),
            SchedulerError::LogicViolation(_)
        ));
        assert!(!ShellRunner.supports(&task));
        assert!(NullRunner.supports(&task));
    }
}
