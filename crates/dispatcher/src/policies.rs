//! 排序策略
//!
//! 六种建模自经典操作系统进程调度的排序策略。每个策略对有序任务
//! 列表做一次稳定排序：比较结果为Equal时保持原有相对顺序，因此
//! 对相同输入重复调用得到相同输出（batch的优先级衰减是唯一的
//! 有意副作用）。

use std::cmp::Ordering;

use taskloop_core::TaskList;

/// 排序策略接口，由name匹配请求的execution_mode
pub trait SchedulePolicy: Send + Sync {
    fn sort(&self, tasks: TaskList) -> TaskList;

    fn supports(&self, policy: &str) -> bool;

    fn name(&self) -> &'static str;
}

/// 默认策略：priority升序
///
/// priority为0表示"无偏好"，任一侧为0或左侧不小于右侧时不参与
/// 重排，保持先入先出的相对顺序。
pub struct FirstInFirstOutPolicy;

impl SchedulePolicy for FirstInFirstOutPolicy {
    fn sort(&self, mut tasks: TaskList) -> TaskList {
        tasks.sort_by(|left, right| {
            if left.priority != 0 && right.priority != 0 && left.priority < right.priority {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        });
        tasks
    }

    fn supports(&self, policy: &str) -> bool {
        policy == "first_in_first_out"
    }

    fn name(&self) -> &'static str {
        "first_in_first_out"
    }
}

/// 时间片策略：耗尽配额的任务被降级到后面
///
/// 任务的实测执行耗时达到max_duration、且超过对比任务的耗时，
/// 则排到对比任务之后；否则保持相对顺序。
pub struct RoundRobinPolicy;

impl SchedulePolicy for RoundRobinPolicy {
    fn sort(&self, mut tasks: TaskList) -> TaskList {
        tasks.sort_by(|left, right| {
            let left_spent = left.execution_computation_time.unwrap_or_default();
            let right_spent = right.execution_computation_time.unwrap_or_default();

            if left.exhausted_quantum() && left_spent > right_spent {
                Ordering::Greater
            } else if right.exhausted_quantum() && right_spent > left_spent {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        });
        tasks
    }

    fn supports(&self, policy: &str) -> bool {
        policy == "round_robin"
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// 截止期策略：绝对截止期升序
///
/// 排序前先按 arrival_time + execution_relative_deadline 重算每个
/// 任务的绝对截止期，两者齐备才参与重排。
pub struct DeadlinePolicy;

impl SchedulePolicy for DeadlinePolicy {
    fn sort(&self, mut tasks: TaskList) -> TaskList {
        for task in tasks.iter_mut() {
            task.refresh_absolute_deadline();
        }
        tasks.sort_by(|left, right| {
            match (
                left.execution_absolute_deadline,
                right.execution_absolute_deadline,
            ) {
                (Some(left_deadline), Some(right_deadline)) => left_deadline.cmp(&right_deadline),
                _ => Ordering::Equal,
            }
        });
        tasks
    }

    fn supports(&self, policy: &str) -> bool {
        policy == "deadline"
    }

    fn name(&self) -> &'static str {
        "deadline"
    }
}

/// 批处理策略：每次排序前把所有任务的priority减1（跨调用单调老化），
/// 然后按新priority升序
pub struct BatchPolicy;

impl SchedulePolicy for BatchPolicy {
    fn sort(&self, mut tasks: TaskList) -> TaskList {
        for task in tasks.iter_mut() {
            task.priority -= 1;
        }
        tasks.sort_by(|left, right| left.priority.cmp(&right.priority));
        tasks
    }

    fn supports(&self, policy: &str) -> bool {
        policy == "batch"
    }

    fn name(&self) -> &'static str {
        "batch"
    }
}

/// 空闲策略：只在priority不超过19的"后台"任务之间按priority升序，
/// 超过19的任务不参与重排
pub struct IdlePolicy;

impl SchedulePolicy for IdlePolicy {
    fn sort(&self, mut tasks: TaskList) -> TaskList {
        tasks.sort_by(|left, right| {
            if left.priority > 19 || right.priority > 19 {
                Ordering::Equal
            } else {
                left.priority.cmp(&right.priority)
            }
        });
        tasks
    }

    fn supports(&self, policy: &str) -> bool {
        policy == "idle"
    }

    fn name(&self) -> &'static str {
        "idle"
    }
}

/// nice策略：nice升序，只对priority都为0的任务生效，
/// 任一侧priority非0则不重排
pub struct NicePolicy;

impl SchedulePolicy for NicePolicy {
    fn sort(&self, mut tasks: TaskList) -> TaskList {
        tasks.sort_by(|left, right| {
            if left.priority != 0 || right.priority != 0 {
                Ordering::Equal
            } else {
                left.nice.unwrap_or(0).cmp(&right.nice.unwrap_or(0))
            }
        });
        tasks
    }

    fn supports(&self, policy: &str) -> bool {
        policy == "normal" || policy == "nice"
    }

    fn name(&self) -> &'static str {
        "normal"
    }
}
