//! 数据库操作重试模块
//!
//! 瞬态错误（断线、死锁、锁等待）带指数退避重试；
//! 唯一约束冲突由 `with_retry_on` 按调用方给定的次数上限重试，
//! 序号分配（5 次）与日志写入（2 次）共用这一个组合子。

use rand::RngExt;
use sea_orm::DbErr;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 判断数据库错误是否可重试（瞬态错误）
pub fn is_retryable_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | // 连接池获取失败
        DbErr::Conn(_) => true, // 连接问题
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => {
            is_retryable_runtime_error(runtime_err)
        }
        _ => false,
    }
}

/// 判断运行时错误是否可重试（死锁、锁超时等）
fn is_retryable_runtime_error(err: &sea_orm::error::RuntimeErr) -> bool {
    use sea_orm::error::RuntimeErr;

    match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            if let Some(db_err) = sqlx_err.deref().as_database_error() {
                // 通过错误码识别可重试错误
                if let Some(code) = db_err.code() {
                    let code_str = code.as_ref();
                    return matches!(
                        code_str,
                        // MySQL 死锁和锁超时
                        "1213" | "1205" |
                        // PostgreSQL 序列化失败和死锁
                        "40001" | "40P01" |
                        // SQLite BUSY 和 LOCKED
                        "5" | "6"
                    );
                }
            }
            // 回退到字符串匹配（用于非 Database 错误）
            let err_str = sqlx_err.to_string().to_lowercase();
            is_retryable_error_message(&err_str)
        }
        RuntimeErr::Internal(msg) => {
            let err_str = msg.to_lowercase();
            is_retryable_error_message(&err_str)
        }
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// 通过错误消息判断是否可重试（回退方案）
fn is_retryable_error_message(err_str: &str) -> bool {
    err_str.contains("deadlock")
        || err_str.contains("lock wait timeout")
        || err_str.contains("database is locked")
        || err_str.contains("serialization failure")
}

/// 判断是否为唯一约束冲突
///
/// 序号分配器据此决定是否换下一个候选值重试。
pub fn is_unique_violation(err: &DbErr) -> bool {
    match err {
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => {
            use sea_orm::error::RuntimeErr;
            match runtime_err {
                RuntimeErr::SqlxError(sqlx_err) => {
                    use std::ops::Deref;
                    if let Some(db_err) = sqlx_err.deref().as_database_error() {
                        if db_err.is_unique_violation() {
                            return true;
                        }
                        // 回退到错误码匹配
                        if let Some(code) = db_err.code() {
                            return matches!(
                                code.as_ref(),
                                // MySQL ER_DUP_ENTRY
                                "1062" |
                                // PostgreSQL unique_violation
                                "23505" |
                                // SQLite CONSTRAINT_PRIMARYKEY / CONSTRAINT_UNIQUE
                                "1555" | "2067"
                            );
                        }
                    }
                    is_unique_violation_message(&sqlx_err.to_string().to_lowercase())
                }
                RuntimeErr::Internal(msg) => is_unique_violation_message(&msg.to_lowercase()),
                #[allow(unreachable_patterns)]
                _ => false,
            }
        }
        DbErr::RecordNotInserted => true,
        _ => false,
    }
}

fn is_unique_violation_message(err_str: &str) -> bool {
    err_str.contains("unique constraint")
        || err_str.contains("duplicate entry")
        || err_str.contains("duplicate key")
}

/// 重试配置
#[derive(Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// 指数退避重试执行器（仅瞬态错误）
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "Operation '{}' succeeded after {} retries",
                        operation_name, attempt
                    );
                }
                return Ok(result);
            }
            Err(e) if is_retryable_error(&e) && attempt < config.max_retries => {
                attempt += 1;
                let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}; retrying in {} ms",
                    operation_name,
                    attempt,
                    config.max_retries + 1,
                    e,
                    delay
                );
                sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    debug!(
                        "Operation '{}' failed with non-retryable error: {}",
                        operation_name, e
                    );
                }
                return Err(e);
            }
        }
    }
}

/// 有界重试组合子
///
/// 总共最多执行 `attempts` 次 `operation`；只有 `is_retryable`
/// 判定为真的错误才会触发下一次尝试，耗尽后返回最后一个错误。
/// 重试策略（次数、判定条件）是参数，不在调用点内联。
pub async fn with_retry_on<T, F, Fut, P>(
    operation_name: &str,
    attempts: u32,
    is_retryable: P,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
    P: Fn(&DbErr) -> bool,
{
    debug_assert!(attempts >= 1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "Operation '{}' succeeded on attempt {}/{}",
                        operation_name, attempt, attempts
                    );
                }
                return Ok(result);
            }
            Err(e) if is_retryable(&e) && attempt < attempts => {
                warn!(
                    "Operation '{}' hit retryable error (attempt {}/{}): {}",
                    operation_name, attempt, attempts, e
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 计算指数退避延迟（带抖动）
fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let exp_delay = base_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
    let capped = exp_delay.min(max_ms);
    // 添加 0-25% 的随机抖动，避免惊群效应
    let jitter = rand::rng().random_range(0..=capped / 4);
    capped.saturating_add(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_is_retryable_error_connection_acquire() {
        let err = DbErr::ConnectionAcquire(sea_orm::error::ConnAcquireErr::Timeout);
        assert!(is_retryable_error(&err));
    }

    #[test]
    fn test_is_retryable_error_deadlock() {
        let err = DbErr::Exec(sea_orm::error::RuntimeErr::Internal(
            "Deadlock found when trying to get lock".to_string(),
        ));
        assert!(is_retryable_error(&err));
    }

    #[test]
    fn test_is_retryable_error_database_locked() {
        let err = DbErr::Query(sea_orm::error::RuntimeErr::Internal(
            "database is locked".to_string(),
        ));
        assert!(is_retryable_error(&err));
    }

    #[test]
    fn test_is_unique_violation_messages() {
        let err = DbErr::Exec(sea_orm::error::RuntimeErr::Internal(
            "UNIQUE constraint failed: ads.user_no, ads.ad_seq".to_string(),
        ));
        assert!(is_unique_violation(&err));

        let err = DbErr::Exec(sea_orm::error::RuntimeErr::Internal(
            "Duplicate entry '2-1' for key 'uq_ads_user_no_ad_seq'".to_string(),
        ));
        assert!(is_unique_violation(&err));

        let err = DbErr::RecordNotFound("not found".to_string());
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn test_unique_violation_is_not_transient() {
        let err = DbErr::Exec(sea_orm::error::RuntimeErr::Internal(
            "UNIQUE constraint failed: visit_logs.log_key".to_string(),
        ));
        assert!(!is_retryable_error(&err));
    }

    #[test]
    fn test_calculate_backoff_exponential() {
        let delay1 = calculate_backoff(1, 100, 2000);
        assert!((100..=125).contains(&delay1)); // 100 + 0-25% jitter

        let delay2 = calculate_backoff(2, 100, 2000);
        assert!((200..=250).contains(&delay2));
    }

    #[test]
    fn test_calculate_backoff_capped_at_max() {
        let delay = calculate_backoff(10, 100, 2000);
        assert!((2000..=2500).contains(&delay));
    }

    #[tokio::test]
    async fn test_with_retry_success_first_try() {
        let config = RetryConfig::default();
        let call_count = AtomicU32::new(0);

        let result = with_retry("test_op", config, || {
            call_count.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, DbErr>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_on_bounded_attempts() {
        let call_count = AtomicU32::new(0);

        let result = with_retry_on("alloc", 5, is_unique_violation, || {
            call_count.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<i32, _>(DbErr::Exec(sea_orm::error::RuntimeErr::Internal(
                    "UNIQUE constraint failed: ads.user_ad_no".to_string(),
                )))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_with_retry_on_recovers() {
        let call_count = AtomicU32::new(0);

        let result = with_retry_on("alloc", 5, is_unique_violation, || {
            let count = call_count.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(DbErr::Exec(sea_orm::error::RuntimeErr::Internal(
                        "UNIQUE constraint failed: ads.user_ad_no".to_string(),
                    )))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_on_non_matching_error_no_retry() {
        let call_count = AtomicU32::new(0);

        let result = with_retry_on("alloc", 5, is_unique_violation, || {
            call_count.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(DbErr::RecordNotFound("missing".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
