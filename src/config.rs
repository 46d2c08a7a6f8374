//! 配置管理
//!
//! 静态配置从 `config.toml` 与环境变量加载（ENV 优先，前缀 AT，分隔符 __），
//! 通过 `init_config()` / `get_config()` 全局访问。

use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

static CONFIG: OnceLock<ArcSwap<AppConfig>> = OnceLock::new();

/// 获取全局配置实例
///
/// 返回 Arc 指针，克隆开销小且不持有任何锁。
pub fn get_config() -> Arc<AppConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// 初始化全局配置
pub fn init_config() {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(AppConfig::load()));
}

/// 应用配置
///
/// - server: 监听地址、端口、worker 数量、CORS
/// - database: 数据库连接与重试配置
/// - logging: 日志配置
/// - tracking: 追踪与统计配置（参考时区偏移）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl AppConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// 示例：AT__SERVER__PORT=9999
    pub fn load() -> Self {
        use config::{Config, Environment, File};

        let path = "config.toml";

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("AT")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<AppConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 仪表盘前端的来源，为空时允许任意来源
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            cors_origin: None,
        }
    }
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 日志文件路径，为空时输出到控制台
    #[serde(default)]
    pub file: Option<String>,
    /// 输出格式："plain" 或 "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub enable_rotation: bool,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            format: default_log_format(),
            enable_rotation: true,
            max_backups: default_max_backups(),
        }
    }
}

/// 追踪与统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// 参考时区相对 UTC 的小时偏移（默认 +9，KST）
    #[serde(default = "default_timezone_offset_hours")]
    pub timezone_offset_hours: i32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            timezone_offset_hours: default_timezone_offset_hours(),
        }
    }
}

impl TrackingConfig {
    /// 参考时区，所有桶边界运算都以它为准
    pub fn reference_tz(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(9 * 3600).expect("valid fixed offset"))
    }
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_database_url() -> String {
    "sqlite://adtracker.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_backups() -> u32 {
    7
}

fn default_timezone_offset_hours() -> i32 {
    9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.tracking.timezone_offset_hours, 9);
        assert_eq!(config.database.retry_count, 3);
    }

    #[test]
    fn test_reference_tz_offset() {
        let tracking = TrackingConfig::default();
        assert_eq!(tracking.reference_tz().local_minus_utc(), 9 * 3600);

        let utc = TrackingConfig {
            timezone_offset_hours: 0,
        };
        assert_eq!(utc.reference_tz().local_minus_utc(), 0);
    }
}
