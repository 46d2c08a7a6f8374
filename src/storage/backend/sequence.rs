//! 序号分配器
//!
//! 两套互不依赖的分配协议：
//!
//! - 广告序号：per-owner 互斥锁（有界等待）+ 事务内 `FOR UPDATE` 升序扫描，
//!   取最小空闲正整数（删除留下的空洞会被复用），插入冲突按上限重试。
//! - 每日日志序号：(created_day, user_ad_no) 计数器的原子 upsert-increment，
//!   同一事务内回读新值，行锁保证并发调用互不重复。

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DbBackend, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use super::SeaOrmStorage;
use super::retry::{is_unique_violation, with_retry_on};
use crate::errors::{AdTrackerError, Result};
use migration::entities::{ad, visit_log, visit_sequence};

/// 广告序号插入的重试上限
pub const AD_SEQ_ATTEMPTS: u32 = 5;

/// owner 锁的有界等待时长
pub const OWNER_LOCK_WAIT: Duration = Duration::from_secs(5);

/// per-owner 互斥锁表
///
/// 同一 owner 的广告序号分配在进程内先串行化；跨进程实例由
/// 事务内的行锁扫描兜底。锁守卫是 RAII 的，任何退出路径都会释放。
#[derive(Clone, Default)]
pub struct OwnerLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 有界等待获取 owner 锁，超时返回 `LockTimeout`
    pub async fn acquire(&self, user_no: i64, wait: Duration) -> Result<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(user_no)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(wait, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(
                    "Owner lock for user {} not acquired within {:?}",
                    user_no, wait
                );
                Err(AdTrackerError::lock_timeout(format!(
                    "Cannot acquire user lock for user {}",
                    user_no
                )))
            }
        }
    }
}

/// 最小空闲正整数扫描
///
/// `existing` 必须升序。候选值从 1 开始，遇到等于候选值的已有序号
/// 就推进一位，遇到大于候选值的序号（或扫完）即得到第一个空洞。
/// 重复值与小于候选值的异常值会被跳过。
pub fn first_free_sequence(existing: &[i32]) -> i32 {
    let mut candidate = 1;
    for &value in existing {
        if value < candidate {
            continue;
        }
        if value == candidate {
            candidate += 1;
        } else {
            break;
        }
    }
    candidate
}

impl SeaOrmStorage {
    /// 分配广告序号并插入新广告，返回创建的行
    ///
    /// 冲突重试耗尽返回 `AllocationExhausted`，锁等待超时返回 `LockTimeout`。
    pub async fn allocate_ad(
        &self,
        user_no: i64,
        ad_name: &str,
        ad_domain: &str,
        ad_code: Option<&str>,
    ) -> Result<ad::Model> {
        let _guard = self.owner_locks.acquire(user_no, OWNER_LOCK_WAIT).await?;

        let result = with_retry_on(
            "allocate_ad_seq",
            AD_SEQ_ATTEMPTS,
            is_unique_violation,
            || self.try_insert_ad(user_no, ad_name, ad_domain, ad_code),
        )
        .await;

        match result {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => {
                Err(AdTrackerError::allocation_exhausted(format!(
                    "Failed to allocate ad sequence for user {} after {} attempts",
                    user_no, AD_SEQ_ATTEMPTS
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 单次分配尝试：锁定扫描 + 插入，整体一个事务
    ///
    /// 唯一冲突时整个事务重来（Postgres 在约束错误后会中止事务，
    /// 不能在原事务里换号重插）；新扫描自然会越过冲突值。
    async fn try_insert_ad(
        &self,
        user_no: i64,
        ad_name: &str,
        ad_domain: &str,
        ad_code: Option<&str>,
    ) -> std::result::Result<ad::Model, DbErr> {
        let txn = self.get_db().begin().await?;

        let mut query = ad::Entity::find()
            .select_only()
            .column(ad::Column::AdSeq)
            .filter(ad::Column::UserNo.eq(user_no))
            .order_by_asc(ad::Column::AdSeq);
        // SQLite 的写事务本身就是排他的，没有 FOR UPDATE
        if self.db_backend() != DbBackend::Sqlite {
            query = query.lock_exclusive();
        }
        let existing: Vec<i32> = query.into_tuple().all(&txn).await?;

        let ad_seq = first_free_sequence(&existing);
        let user_ad_no = format!("{}_{}", user_no, ad_seq);
        let created_at = Utc::now();

        let model = ad::ActiveModel {
            user_ad_no: Set(user_ad_no.clone()),
            user_no: Set(user_no),
            ad_seq: Set(ad_seq),
            ad_name: Set(ad_name.to_string()),
            ad_domain: Set(ad_domain.to_string()),
            ad_code: Set(ad_code.map(String::from)),
            created_at: Set(created_at),
        };

        if let Err(e) = ad::Entity::insert(model).exec_without_returning(&txn).await {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Rollback after ad insert failure failed: {}", rollback_err);
            }
            return Err(e);
        }

        txn.commit().await?;

        Ok(ad::Model {
            user_ad_no,
            user_no,
            ad_seq,
            ad_name: ad_name.to_string(),
            ad_domain: ad_domain.to_string(),
            ad_code: ad_code.map(String::from),
            created_at,
        })
    }

    /// 写入一条访问日志（单次尝试）
    ///
    /// 在一个事务内完成计数器递增与日志插入；
    /// upsert 拿到的行锁把同一 (day, ad) 的并发调用串行化。
    pub async fn try_insert_visit(
        &self,
        ad_code: &str,
        user_ad_no: &str,
        raw_ip: &str,
        day: NaiveDate,
        day_compact: &str,
    ) -> std::result::Result<String, DbErr> {
        let txn = self.get_db().begin().await?;

        let seq = next_daily_sequence(&txn, day, user_ad_no).await?;
        let log_key = format!("{}_{}_{:04}", day_compact, ad_code, seq);

        let model = visit_log::ActiveModel {
            log_key: Set(log_key.clone()),
            user_ad_no: Set(user_ad_no.to_string()),
            raw_ip: Set(raw_ip.to_string()),
            created_at: Set(Utc::now()),
        };

        if let Err(e) = visit_log::Entity::insert(model)
            .exec_without_returning(&txn)
            .await
        {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Rollback after visit insert failure failed: {}", rollback_err);
            }
            return Err(e);
        }

        txn.commit().await?;
        Ok(log_key)
    }
}

/// (day, user_ad_no) 计数器的原子递增，返回本次分配到的序号
///
/// 不存在则插入 next_seq = 1，存在则 next_seq = next_seq + 1，
/// 随后在同一事务内回读。首日首次访问得到 1，之后连续递增。
pub async fn next_daily_sequence<C: ConnectionTrait>(
    conn: &C,
    day: NaiveDate,
    user_ad_no: &str,
) -> std::result::Result<i32, DbErr> {
    visit_sequence::Entity::insert(visit_sequence::ActiveModel {
        created_day: Set(day),
        user_ad_no: Set(user_ad_no.to_string()),
        next_seq: Set(1),
    })
    .on_conflict(
        OnConflict::columns([
            visit_sequence::Column::CreatedDay,
            visit_sequence::Column::UserAdNo,
        ])
        .value(
            visit_sequence::Column::NextSeq,
            Expr::col((visit_sequence::Entity, visit_sequence::Column::NextSeq)).add(1),
        )
        .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    let row = visit_sequence::Entity::find_by_id((day, user_ad_no.to_string()))
        .one(conn)
        .await?
        .ok_or_else(|| {
            DbErr::RecordNotFound(format!(
                "visit_log_sequences row missing after upsert: ({}, {})",
                day, user_ad_no
            ))
        })?;

    Ok(row.next_seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_sequence_empty() {
        assert_eq!(first_free_sequence(&[]), 1);
    }

    #[test]
    fn test_first_free_sequence_dense() {
        assert_eq!(first_free_sequence(&[1, 2, 3]), 4);
    }

    #[test]
    fn test_first_free_sequence_gap_reuse() {
        // 删除 3 之后 {1,2,4} 的下一个是 3
        assert_eq!(first_free_sequence(&[1, 2, 4]), 3);
    }

    #[test]
    fn test_first_free_sequence_leading_gap() {
        assert_eq!(first_free_sequence(&[2, 3]), 1);
    }

    #[test]
    fn test_first_free_sequence_duplicates_and_outliers() {
        // 重复值与异常值不应推进候选
        assert_eq!(first_free_sequence(&[0, 1, 1, 2]), 3);
        assert_eq!(first_free_sequence(&[-3, 1, 2]), 3);
    }

    #[tokio::test]
    async fn test_owner_lock_timeout() {
        let locks = OwnerLocks::new();
        let _held = locks
            .acquire(7, Duration::from_millis(100))
            .await
            .unwrap();

        let err = locks
            .acquire(7, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AdTrackerError::LockTimeout(_)));

        // 不同 owner 互不阻塞
        let _other = locks
            .acquire(8, Duration::from_millis(50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_owner_lock_released_on_drop() {
        let locks = OwnerLocks::new();
        {
            let _guard = locks
                .acquire(7, Duration::from_millis(50))
                .await
                .unwrap();
        }
        // 守卫析构后可以再次获取
        let _again = locks
            .acquire(7, Duration::from_millis(50))
            .await
            .unwrap();
    }
}
