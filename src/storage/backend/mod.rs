//! SeaORM storage backend
//!
//! 提供基于 SeaORM 的数据库存储，支持 SQLite、MySQL/MariaDB 和 PostgreSQL。

mod connection;
mod query;
pub mod retry;
mod sequence;

use sea_orm::{DatabaseConnection, DbBackend};
use tracing::warn;

use crate::errors::{AdTrackerError, Result};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use query::{AdUpdate, VisitLogPage, bucket_expr};
pub use sequence::{AD_SEQ_ATTEMPTS, OwnerLocks, first_free_sequence, next_daily_sequence};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(AdTrackerError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 规范化 backend 名称
pub fn normalize_backend_name(backend: &str) -> String {
    match backend {
        "mariadb" => "mysql".to_string(),
        other => other.to_string(),
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    /// 重试配置
    retry_config: retry::RetryConfig,
    /// 广告序号分配的 per-owner 互斥锁
    owner_locks: OwnerLocks,
}

impl SeaOrmStorage {
    pub async fn new(database_url: &str, backend_name: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(AdTrackerError::database_config(
                "DATABASE_URL 未设置".to_string(),
            ));
        }

        // 读取重试配置
        let config = crate::config::get_config();
        let retry_config = retry::RetryConfig {
            max_retries: config.database.retry_count,
            base_delay_ms: config.database.retry_base_delay_ms,
            max_delay_ms: config.database.retry_max_delay_ms,
        };

        // 根据不同数据库类型配置连接选项
        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, backend_name).await?
        };

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            retry_config,
            owner_locks: OwnerLocks::new(),
        };

        // 运行迁移
        run_migrations(&storage.db).await?;

        warn!(
            "{} Storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    pub fn get_backend_name(&self) -> &str {
        &self.backend_name
    }

    /// 获取数据库连接（测试与需要直接访问数据库的场景）
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub(crate) fn retry_config(&self) -> retry::RetryConfig {
        self.retry_config
    }

    pub(crate) fn db_backend(&self) -> DbBackend {
        match self.backend_name.as_str() {
            "sqlite" => DbBackend::Sqlite,
            "mysql" => DbBackend::MySql,
            _ => DbBackend::Postgres,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(
            infer_backend_from_url("sqlite://adtracker.db").unwrap(),
            "sqlite"
        );
        assert_eq!(
            infer_backend_from_url("mysql://root@localhost/adtracker").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("postgres://localhost/adtracker").unwrap(),
            "postgres"
        );
        assert!(infer_backend_from_url("redis://localhost").is_err());
    }

    #[test]
    fn test_normalize_backend_name() {
        assert_eq!(normalize_backend_name("mariadb"), "mysql");
        assert_eq!(normalize_backend_name("sqlite"), "sqlite");
    }
}
