//! 存储DSN解析与工厂
//!
//! DSN文法：`scheme://host?opt=val`。组合scheme用括号携带内层
//! DSN列表，以`||`分隔，如`failover://(memory://nice || memory://batch)`。

use std::collections::HashMap;
use std::sync::Arc;

use taskloop_core::{SchedulerError, SchedulerResult, Storage, StorageOptions};

use crate::composite::{FailoverStorage, LongTailStorage, RoundRobinStorage};
use crate::memory_storage::InMemoryStorage;

/// 解析后的存储DSN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDsn {
    pub scheme: String,
    pub host: String,
    pub options: HashMap<String, String>,
    /// 组合scheme的内层DSN，普通scheme为空
    pub inner: Vec<String>,
}

impl StorageDsn {
    pub fn parse(dsn: &str) -> SchedulerResult<Self> {
        let (scheme, rest) = dsn.split_once("://").ok_or_else(|| {
            SchedulerError::InvalidDsn(format!("DSN缺少scheme分隔符: {dsn}"))
        })?;

        if scheme.is_empty() {
            return Err(SchedulerError::InvalidDsn(format!("DSN的scheme为空: {dsn}")));
        }

        if let Some(inner) = rest.strip_prefix('(') {
            let inner = inner.strip_suffix(')').ok_or_else(|| {
                SchedulerError::InvalidDsn(format!("DSN的内层列表未闭合: {dsn}"))
            })?;
            let inner: Vec<String> = inner
                .split("||")
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect();
            if inner.is_empty() {
                return Err(SchedulerError::InvalidDsn(format!(
                    "组合DSN至少需要一个内层后端: {dsn}"
                )));
            }
            return Ok(Self {
                scheme: scheme.to_string(),
                host: String::new(),
                options: HashMap::new(),
                inner,
            });
        }

        let (host, query) = match rest.split_once('?') {
            Some((host, query)) => (host, Some(query)),
            None => (rest, None),
        };

        let mut options = HashMap::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    SchedulerError::InvalidDsn(format!("DSN参数缺少取值: {pair}"))
                })?;
                options.insert(key.to_string(), value.to_string());
            }
        }

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            options,
            inner: Vec::new(),
        })
    }
}

/// 按DSN构建存储后端
pub struct StorageFactory;

impl StorageFactory {
    pub fn create(dsn: &str) -> SchedulerResult<Arc<dyn Storage>> {
        let parsed = StorageDsn::parse(dsn)?;

        match parsed.scheme.as_str() {
            "memory" => {
                let mut options = StorageOptions::default();
                if !parsed.host.is_empty() {
                    options.execution_mode = parsed.host.clone();
                }
                if let Some(nice) = parsed.options.get("nice") {
                    let nice = nice.parse::<i64>().map_err(|_| {
                        SchedulerError::InvalidDsn(format!("nice参数不是整数: {nice}"))
                    })?;
                    options.nice = Some(nice);
                }
                options.extra = parsed.options;
                Ok(Arc::new(InMemoryStorage::new(options)))
            }
            "failover" => Ok(Arc::new(FailoverStorage::new(Self::create_inner(&parsed)?))),
            "roundrobin" => Ok(Arc::new(RoundRobinStorage::new(Self::create_inner(
                &parsed,
            )?))),
            "longtail" => Ok(Arc::new(LongTailStorage::new(Self::create_inner(&parsed)?))),
            scheme => Err(SchedulerError::InvalidDsn(format!(
                "不支持的存储scheme: {scheme}"
            ))),
        }
    }

    fn create_inner(parsed: &StorageDsn) -> SchedulerResult<Vec<Arc<dyn Storage>>> {
        parsed.inner.iter().map(|dsn| Self::create(dsn)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_dsn() {
        let dsn = StorageDsn::parse("memory://batch?nice=5").unwrap();
        assert_eq!(dsn.scheme, "memory");
        assert_eq!(dsn.host, "batch");
        assert_eq!(dsn.options.get("nice"), Some(&"5".to_string()));
        assert!(dsn.inner.is_empty());
    }

    #[test]
    fn test_parse_composite_dsn() {
        let dsn =
            StorageDsn::parse("failover://(memory://nice || memory://batch)").unwrap();
        assert_eq!(dsn.scheme, "failover");
        assert_eq!(dsn.inner, vec!["memory://nice", "memory://batch"]);
    }

    #[test]
    fn test_parse_rejects_malformed_dsn() {
        assert!(matches!(
            StorageDsn::parse("memory"),
            Err(SchedulerError::InvalidDsn(_))
        ));
        assert!(matches!(
            StorageDsn::parse("failover://(memory://nice"),
            Err(SchedulerError::InvalidDsn(_))
        ));
        assert!(matches!(
            StorageDsn::parse("failover://()"),
            Err(SchedulerError::InvalidDsn(_))
        ));
        assert!(matches!(
            StorageDsn::parse("memory://fifo?nice"),
            Err(SchedulerError::InvalidDsn(_))
        ));
    }

    #[test]
    fn test_factory_builds_memory_storage_with_options() {
        let storage = StorageFactory::create("memory://deadline?nice=3").unwrap();
        let options = storage.options();
        assert_eq!(options.execution_mode, "deadline");
        assert_eq!(options.nice, Some(3));
    }

    #[test]
    fn test_factory_defaults_execution_mode() {
        let storage = StorageFactory::create("memory://").unwrap();
        assert_eq!(storage.options().execution_mode, "first_in_first_out");
    }

    #[test]
    fn test_factory_rejects_unknown_scheme() {
        assert!(matches!(
            StorageFactory::create("redis://localhost"),
            Err(SchedulerError::InvalidDsn(_))
        ));
        assert!(matches!(
            StorageFactory::create("memory://fifo?nice=abc"),
            Err(SchedulerError::InvalidDsn(_))
        ));
    }

    #[tokio::test]
    async fn test_factory_composite_round_trip() {
        let storage =
            StorageFactory::create("longtail://(memory://nice || memory://batch)").unwrap();
        storage
            .create(taskloop_core::Task::new("app", taskloop_core::TaskPayload::Null))
            .await
            .unwrap();
        assert_eq!(storage.get("app").await.unwrap().name, "app");
    }
}
