use taskloop_core::{SchedulerError, SchedulerResult, TaskList};

use crate::policies::{
    BatchPolicy, DeadlinePolicy, FirstInFirstOutPolicy, IdlePolicy, NicePolicy, RoundRobinPolicy,
    SchedulePolicy,
};

/// 按名称把排序请求分发给匹配的策略
///
/// 未注册任何策略时排序请求直接失败；空输入立即原样返回；
/// 多个策略匹配时第一个命中的策略生效。
pub struct SchedulePolicyOrchestrator {
    policies: Vec<Box<dyn SchedulePolicy>>,
}

impl SchedulePolicyOrchestrator {
    pub fn new(policies: Vec<Box<dyn SchedulePolicy>>) -> Self {
        Self { policies }
    }

    /// 注册全部六种内置策略
    pub fn with_default_policies() -> Self {
        Self::new(vec![
            Box::new(FirstInFirstOutPolicy),
            Box::new(RoundRobinPolicy),
            Box::new(DeadlinePolicy),
            Box::new(BatchPolicy),
            Box::new(IdlePolicy),
            Box::new(NicePolicy),
        ])
    }

    pub fn sort(&self, policy: &str, tasks: TaskList) -> SchedulerResult<TaskList> {
        if self.policies.is_empty() {
            return Err(SchedulerError::InvalidConfiguration(
                "没有注册任何排序策略，无法对任务排序".to_string(),
            ));
        }

        if tasks.is_empty() {
            return Ok(tasks);
        }

        for schedule_policy in &self.policies {
            if schedule_policy.supports(policy) {
                return Ok(schedule_policy.sort(tasks));
            }
        }

        Err(SchedulerError::InvalidConfiguration(format!(
            "无法使用排序策略: {policy}"
        )))
    }
}

impl Default for SchedulePolicyOrchestrator {
    fn default() -> Self {
        Self::with_default_policies()
    }
}
