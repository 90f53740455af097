use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::debug;

use taskloop_core::{SchedulerError, SchedulerResult, REBOOT_MACRO};

/// CRON表达式解析与到期判定工具
///
/// 接受标准5字段表达式（内部补齐秒字段）、`@hourly`等宏，
/// 以及保留的`@reboot`宏。`@reboot`任务永远不会被普通求值命中。
pub struct CronSchedule {
    expression: String,
    schedule: Option<Schedule>,
}

impl CronSchedule {
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        if cron_expr.trim() == REBOOT_MACRO {
            return Ok(Self {
                expression: REBOOT_MACRO.to_string(),
                schedule: None,
            });
        }

        let normalized = normalize_expression(cron_expr)?;
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
                expr: cron_expr.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            expression: cron_expr.to_string(),
            schedule: Some(schedule),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_reboot(&self) -> bool {
        self.schedule.is_none()
    }

    /// 给定时刻在任务自身时区下是否到期
    ///
    /// CRON的粒度是分钟，判定窗口为(now - 60s, now]：
    /// 窗口内存在一次触发时间即视为到期。
    pub fn is_due(&self, now: DateTime<Utc>, timezone: Tz) -> bool {
        let Some(schedule) = &self.schedule else {
            return false;
        };

        let local_now = now.with_timezone(&timezone);
        let window_start = local_now - Duration::seconds(60);
        match schedule.after(&window_start).next() {
            Some(next) => {
                let due = next <= local_now;
                if due {
                    debug!(
                        "表达式 {} 到期: 触发时间={}, 当前时间={}",
                        self.expression,
                        next.format("%Y-%m-%d %H:%M:%S %Z"),
                        local_now.format("%Y-%m-%d %H:%M:%S %Z")
                    );
                }
                due
            }
            None => false,
        }
    }

    /// 下一次触发时间（UTC）
    pub fn next_execution_time(&self, from: DateTime<Utc>, timezone: Tz) -> Option<DateTime<Utc>> {
        let schedule = self.schedule.as_ref()?;
        schedule
            .after(&from.with_timezone(&timezone))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }

    /// 距离下一次触发还有多久
    pub fn time_until_next_execution(
        &self,
        now: DateTime<Utc>,
        timezone: Tz,
    ) -> Option<Duration> {
        self.next_execution_time(now, timezone).map(|next| next - now)
    }

    /// 仅校验表达式是否合法
    pub fn validate(cron_expr: &str) -> SchedulerResult<()> {
        Self::new(cron_expr).map(|_| ())
    }
}

/// 把5字段表达式补齐为cron crate要求的秒起始形式，宏原样放行
fn normalize_expression(cron_expr: &str) -> SchedulerResult<String> {
    let trimmed = cron_expr.trim();
    if trimmed.is_empty() {
        return Err(SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message: "表达式为空".to_string(),
        });
    }

    if trimmed.starts_with('@') {
        return Ok(trimmed.to_string());
    }

    match trimmed.split_whitespace().count() {
        5 => Ok(format!("0 {trimmed}")),
        6 | 7 => Ok(trimmed.to_string()),
        n => Err(SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message: format!("期望5个字段，实际{n}个"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_five_field_expression_accepted() {
        assert!(CronSchedule::new("0 0 * * *").is_ok());
        assert!(CronSchedule::new("* * * * *").is_ok());
        assert!(CronSchedule::new("*/5 8-18 * * 1-5").is_ok());
    }

    #[test]
    fn test_invalid_expression_rejected() {
        assert!(matches!(
            CronSchedule::new("not a cron"),
            Err(SchedulerError::InvalidCron { .. })
        ));
        assert!(CronSchedule::new("").is_err());
        assert!(CronSchedule::new("* * *").is_err());
    }

    #[test]
    fn test_reboot_macro_never_due() {
        let schedule = CronSchedule::new(REBOOT_MACRO).unwrap();
        assert!(schedule.is_reboot());
        assert!(!schedule.is_due(Utc::now(), chrono_tz::UTC));
        assert!(schedule.next_execution_time(Utc::now(), chrono_tz::UTC).is_none());
    }

    #[test]
    fn test_daily_expression_due_at_midnight_only() {
        let schedule = CronSchedule::new("0 0 * * *").unwrap();

        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 30).unwrap();
        assert!(schedule.is_due(midnight, chrono_tz::UTC));

        let noon = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 30).unwrap();
        assert!(!schedule.is_due(noon, chrono_tz::UTC));
    }

    #[test]
    fn test_due_evaluated_in_task_timezone() {
        // 上海的午夜是UTC的16:00
        let schedule = CronSchedule::new("0 0 * * *").unwrap();
        let shanghai: Tz = "Asia/Shanghai".parse().unwrap();

        let utc_1600 = Utc.with_ymd_and_hms(2026, 3, 1, 16, 0, 10).unwrap();
        assert!(schedule.is_due(utc_1600, shanghai));
        assert!(!schedule.is_due(utc_1600, chrono_tz::UTC));
    }

    #[test]
    fn test_every_minute_always_due() {
        let schedule = CronSchedule::new("* * * * *").unwrap();
        assert!(schedule.is_due(Utc::now(), chrono_tz::UTC));
    }

    #[test]
    fn test_next_execution_time() {
        let schedule = CronSchedule::new("0 0 * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let next = schedule.next_execution_time(from, chrono_tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
    }
}
