//! 端到端集成测试：调度器、存储、锁、事件监听器与Worker协同工作。

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;

use taskloop_core::{EventBus, LockProvider, Runner, SchedulerError, StopSignal, Task, TaskPayload};
use taskloop_dispatcher::Scheduler;
use taskloop_infrastructure::{InMemoryLockProvider, InMemoryStorage, StorageFactory};
use taskloop_worker::{
    CallbackRunner, NullRunner, SingleRunTaskListener, StopWorkerOnFailureLimitListener,
    StopWorkerOnTaskLimitListener, Worker, WorkerOptions,
};

struct Stack {
    scheduler: Arc<Scheduler>,
    lock_provider: Arc<InMemoryLockProvider>,
    event_bus: Arc<EventBus>,
    stop_signal: Arc<StopSignal>,
}

fn stack() -> Stack {
    let event_bus = Arc::new(EventBus::new());
    let storage = Arc::new(InMemoryStorage::default());
    Stack {
        scheduler: Arc::new(Scheduler::new(Tz::UTC, storage, event_bus.clone())),
        lock_provider: Arc::new(InMemoryLockProvider::new()),
        event_bus,
        stop_signal: Arc::new(StopSignal::new()),
    }
}

fn worker(stack: &Stack, runners: Vec<Arc<dyn Runner>>) -> Worker {
    let mut builder = Worker::builder()
        .scheduler(stack.scheduler.clone())
        .lock_provider(stack.lock_provider.clone())
        .event_bus(stack.event_bus.clone())
        .stop_signal(stack.stop_signal.clone())
        .options(WorkerOptions {
            sleep_duration_delay: Duration::from_millis(10),
        });
    for runner in runners {
        builder = builder.register_runner(runner);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_single_run_task_removed_end_to_end() {
    let stack = stack();
    stack
        .event_bus
        .subscribe(Arc::new(SingleRunTaskListener::new(stack.scheduler.clone())))
        .await;

    stack
        .scheduler
        .schedule(Task::new("once", TaskPayload::Null).single_run())
        .await
        .unwrap();

    let worker = worker(&stack, vec![Arc::new(NullRunner)]);
    let tasks = stack.scheduler.get_tasks().await.unwrap();
    worker.execute(tasks).await.unwrap();

    // 监听器在执行过程中完成了注销
    assert!(stack.scheduler.get_tasks().await.unwrap().is_empty());
    assert!(worker.get_failed_tasks().await.is_empty());
}

#[tokio::test]
async fn test_failure_limit_stops_continuous_loop() {
    let stack = stack();
    stack
        .event_bus
        .subscribe(Arc::new(StopWorkerOnFailureLimitListener::new(
            1,
            stack.stop_signal.clone(),
        )))
        .await;

    let runner: Arc<dyn Runner> = Arc::new(CallbackRunner::new().register("boom", || async {
        Err(SchedulerError::execution_error("崩溃"))
    }));
    stack
        .scheduler
        .schedule(Task::new(
            "always_broken",
            TaskPayload::Callback {
                handler: "boom".to_string(),
            },
        ))
        .await
        .unwrap();

    let worker = worker(&stack, vec![runner]);
    // 失败监听器在第一轮触发停止，循环应当自行退出
    tokio::time::timeout(Duration::from_secs(5), worker.run())
        .await
        .expect("Worker循环未在失败上限处停止")
        .unwrap();

    assert_eq!(worker.get_failed_tasks().await.len(), 1);
}

#[tokio::test]
async fn test_task_limit_stops_continuous_loop() {
    let stack = stack();
    stack
        .event_bus
        .subscribe(Arc::new(StopWorkerOnTaskLimitListener::new(
            1,
            stack.stop_signal.clone(),
        )))
        .await;

    stack
        .scheduler
        .schedule(Task::new("minutely", TaskPayload::Null))
        .await
        .unwrap();

    let worker = worker(&stack, vec![Arc::new(NullRunner)]);
    tokio::time::timeout(Duration::from_secs(5), worker.run())
        .await
        .expect("Worker循环未在任务上限处停止")
        .unwrap();

    let task = stack.scheduler.get_task("minutely").await.unwrap();
    assert!(task.last_execution.is_some());
}

#[tokio::test]
async fn test_concurrent_lock_acquisition_single_winner() {
    let provider = Arc::new(InMemoryLockProvider::new());

    let (first, second) = tokio::join!(provider.acquire("same"), provider.acquire("same"));
    let first = first.unwrap();
    let second = second.unwrap();

    assert!(first.is_some() != second.is_some());
}

#[tokio::test]
async fn test_due_flow_through_composite_storage() {
    // 组合存储后端也能承载完整的 登记→到期→执行 流程
    let event_bus = Arc::new(EventBus::new());
    let storage = StorageFactory::create("failover://(memory://nice || memory://batch)").unwrap();
    let scheduler = Arc::new(Scheduler::new(Tz::UTC, storage, event_bus.clone()));

    scheduler
        .schedule(Task::new("composite", TaskPayload::Null))
        .await
        .unwrap();

    let due = scheduler.get_due_tasks().await.unwrap();
    assert_eq!(due.names(), vec!["composite"]);

    let worker = Worker::builder()
        .scheduler(scheduler.clone())
        .lock_provider(Arc::new(InMemoryLockProvider::new()))
        .event_bus(event_bus)
        .register_runner(Arc::new(NullRunner))
        .build()
        .unwrap();
    worker.execute(due).await.unwrap();

    let task = scheduler.get_task("composite").await.unwrap();
    assert!(task.execution_state.is_some());
}

#[tokio::test]
async fn test_reboot_then_due_selection() {
    let stack = stack();

    stack
        .scheduler
        .schedule(Task::new("regular", TaskPayload::Null))
        .await
        .unwrap();
    stack
        .scheduler
        .schedule(Task::new("boot_only", TaskPayload::Null).with_expression("@reboot"))
        .await
        .unwrap();

    stack.scheduler.reboot().await.unwrap();

    // 重启后只剩@reboot任务，且它不会被普通到期求值命中
    assert_eq!(stack.scheduler.get_tasks().await.unwrap().names(), vec!["boot_only"]);
    assert!(stack.scheduler.get_due_tasks().await.unwrap().is_empty());
}
