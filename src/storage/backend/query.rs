//! 广告与访问日志查询
//!
//! 时间戳一律按 UTC 存储；聚合时在 SQL 里把 `created_at` 平移
//! 参考时区偏移量后再截断，桶键文本与 Bucket Calendar 的标签
//! 逐字节一致（对齐层靠字符串精确匹配）。

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DbBackend, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

use super::SeaOrmStorage;
use super::retry::with_retry;
use crate::analytics::{BucketCountRow, Granularity};
use crate::errors::Result;
use migration::entities::{ad, visit_log, visit_sequence};

/// 广告的部分更新
///
/// 外层 `None` 表示不更新该字段；`ad_code` 的内层 `None` 表示清除追踪码。
#[derive(Debug, Clone, Default)]
pub struct AdUpdate {
    pub ad_name: Option<String>,
    pub ad_domain: Option<String>,
    pub ad_code: Option<Option<String>>,
}

impl AdUpdate {
    pub fn is_empty(&self) -> bool {
        self.ad_name.is_none() && self.ad_domain.is_none() && self.ad_code.is_none()
    }
}

/// 访问日志的一页
#[derive(Debug, Clone)]
pub struct VisitLogPage {
    pub logs: Vec<visit_log::Model>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

#[derive(FromQueryResult)]
struct RawBucketRow {
    user_ad_no: String,
    bucket_key: String,
    count: i64,
}

/// 生成按参考时区平移后截断 `created_at` 的 SQL 表达式
///
/// 产出的文本必须与 `analytics::bucket` 的标签格式完全一致：
/// - 分钟粒度 `YYYY-MM-DD HH:MM`（向下取整到步长）
/// - 小时 `YYYY-MM-DD HH:00`，天 `YYYY-MM-DD`，月 `YYYY-MM`
/// - 周为 ISO 周 `GGGG-WNN`（周四规则，跨年周归属随 ISO 年）
pub fn bucket_expr(backend: DbBackend, granularity: Granularity, offset_seconds: i32) -> String {
    match backend {
        DbBackend::Sqlite => {
            let shifted = format!("created_at, '{} seconds'", offset_seconds);
            match granularity {
                Granularity::Min1
                | Granularity::Min5
                | Granularity::Min10
                | Granularity::Min30 => {
                    // 文本日期做不了分钟取整，换 epoch 整除
                    let step = granularity.minute_step().unwrap_or(1) as i64 * 60;
                    format!(
                        "strftime('%Y-%m-%d %H:%M', ((strftime('%s', created_at) + {offset_seconds}) / {step}) * {step}, 'unixepoch')"
                    )
                }
                Granularity::Hour1 => format!("strftime('%Y-%m-%d %H:00', {shifted})"),
                Granularity::Day1 => format!("strftime('%Y-%m-%d', {shifted})"),
                Granularity::Week1 => format!("strftime('%G-W%V', {shifted})"),
                Granularity::Month1 => format!("strftime('%Y-%m', {shifted})"),
            }
        }
        DbBackend::MySql => {
            let shifted = format!("DATE_ADD(created_at, INTERVAL {offset_seconds} SECOND)");
            match granularity {
                Granularity::Min1 => format!("DATE_FORMAT({shifted}, '%Y-%m-%d %H:%i')"),
                Granularity::Min5 | Granularity::Min10 | Granularity::Min30 => {
                    let step = granularity.minute_step().unwrap_or(1);
                    format!(
                        "DATE_FORMAT(DATE_SUB({shifted}, INTERVAL MOD(MINUTE({shifted}), {step}) MINUTE), '%Y-%m-%d %H:%i')"
                    )
                }
                Granularity::Hour1 => format!("DATE_FORMAT({shifted}, '%Y-%m-%d %H:00')"),
                Granularity::Day1 => format!("DATE_FORMAT({shifted}, '%Y-%m-%d')"),
                // %x/%v 是 ISO 年/周
                Granularity::Week1 => format!("DATE_FORMAT({shifted}, '%x-W%v')"),
                Granularity::Month1 => format!("DATE_FORMAT({shifted}, '%Y-%m')"),
            }
        }
        _ => {
            // TO_CHAR 对 timestamptz 会跟随会话时区，先转成 naive 再平移
            let shifted =
                format!("(created_at AT TIME ZONE 'UTC' + INTERVAL '{offset_seconds} seconds')");
            match granularity {
                Granularity::Min1
                | Granularity::Min5
                | Granularity::Min10
                | Granularity::Min30 => {
                    let step = granularity.minute_step().unwrap_or(1);
                    format!(
                        "TO_CHAR(date_bin('{step} minutes', {shifted}, TIMESTAMP '2000-01-01'), 'YYYY-MM-DD HH24:MI')"
                    )
                }
                Granularity::Hour1 => format!("TO_CHAR({shifted}, 'YYYY-MM-DD HH24:00')"),
                Granularity::Day1 => format!("TO_CHAR({shifted}, 'YYYY-MM-DD')"),
                Granularity::Week1 => format!("TO_CHAR({shifted}, 'IYYY-\"W\"IW')"),
                Granularity::Month1 => format!("TO_CHAR({shifted}, 'YYYY-MM')"),
            }
        }
    }
}

impl SeaOrmStorage {
    /// 某 owner 的全部广告，按创建时间倒序
    pub async fn list_ads(&self, user_no: i64) -> Result<Vec<ad::Model>> {
        let ads = with_retry("list_ads", self.retry_config(), || {
            ad::Entity::find()
                .filter(ad::Column::UserNo.eq(user_no))
                .order_by_desc(ad::Column::CreatedAt)
                .all(self.get_db())
        })
        .await?;
        Ok(ads)
    }

    /// 按 (owner, 序号) 查找广告
    pub async fn find_ad(&self, user_no: i64, ad_seq: i32) -> Result<Option<ad::Model>> {
        let found = with_retry("find_ad", self.retry_config(), || {
            ad::Entity::find()
                .filter(ad::Column::UserNo.eq(user_no))
                .filter(ad::Column::AdSeq.eq(ad_seq))
                .one(self.get_db())
        })
        .await?;
        Ok(found)
    }

    /// 按追踪码查找广告（Tracking Ingest 的入口解析）
    pub async fn find_ad_by_code(&self, ad_code: &str) -> Result<Option<ad::Model>> {
        let found = with_retry("find_ad_by_code", self.retry_config(), || {
            ad::Entity::find()
                .filter(ad::Column::AdCode.eq(ad_code))
                .one(self.get_db())
        })
        .await?;
        Ok(found)
    }

    /// 部分更新广告，返回更新后的行；广告不存在时返回 `None`
    pub async fn update_ad(
        &self,
        user_no: i64,
        ad_seq: i32,
        update: AdUpdate,
    ) -> Result<Option<ad::Model>> {
        let Some(existing) = self.find_ad(user_no, ad_seq).await? else {
            return Ok(None);
        };

        let mut active: ad::ActiveModel = existing.into();
        if let Some(name) = update.ad_name {
            active.ad_name = Set(name);
        }
        if let Some(domain) = update.ad_domain {
            active.ad_domain = Set(domain);
        }
        if let Some(code) = update.ad_code {
            active.ad_code = Set(code);
        }

        let updated = ad::Entity::update(active).exec(self.get_db()).await?;
        Ok(Some(updated))
    }

    /// 某 owner 名下所有广告的访问日志，按时间倒序分页
    pub async fn list_visit_logs(
        &self,
        user_no: i64,
        limit: u64,
        offset: u64,
    ) -> Result<VisitLogPage> {
        let ad_ids: Vec<String> = ad::Entity::find()
            .select_only()
            .column(ad::Column::UserAdNo)
            .filter(ad::Column::UserNo.eq(user_no))
            .into_tuple()
            .all(self.get_db())
            .await?;

        if ad_ids.is_empty() {
            return Ok(VisitLogPage {
                logs: Vec::new(),
                total: 0,
                limit,
                offset,
                has_more: false,
            });
        }

        let base = visit_log::Entity::find()
            .filter(visit_log::Column::UserAdNo.is_in(ad_ids.clone()));

        let total = base.clone().count(self.get_db()).await?;
        let logs = base
            .order_by_desc(visit_log::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.get_db())
            .await?;

        Ok(VisitLogPage {
            has_more: offset + (logs.len() as u64) < total,
            logs,
            total,
            limit,
            offset,
        })
    }

    /// 按 (广告, 桶) 分组计数
    ///
    /// 只返回有数据的桶（稀疏行），补零与对齐交给 `analytics::align_series`。
    pub async fn grouped_visit_counts(
        &self,
        user_ad_nos: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        offset_seconds: i32,
    ) -> Result<Vec<BucketCountRow>> {
        if user_ad_nos.is_empty() {
            return Ok(Vec::new());
        }

        let expr = bucket_expr(self.db_backend(), granularity, offset_seconds);
        let rows = with_retry("grouped_visit_counts", self.retry_config(), || {
            visit_log::Entity::find()
                .select_only()
                .column(visit_log::Column::UserAdNo)
                .column_as(Expr::cust(expr.clone()), "bucket_key")
                .column_as(visit_log::Column::LogKey.count(), "count")
                .filter(visit_log::Column::UserAdNo.is_in(user_ad_nos.to_vec()))
                .filter(visit_log::Column::CreatedAt.between(start, end))
                .group_by(visit_log::Column::UserAdNo)
                .group_by(Expr::cust(expr.clone()))
                .into_model::<RawBucketRow>()
                .all(self.get_db())
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| BucketCountRow {
                user_ad_no: r.user_ad_no,
                bucket_key: r.bucket_key,
                count: r.count,
            })
            .collect())
    }

    /// 批量删除广告及其日志与计数器，返回实际删除的广告数
    ///
    /// `ids` 中每个元素可以是序号（如 `"3"`）或复合标识（如 `"2_3"`）；
    /// 不属于该 owner 的标识被忽略。三张表的删除在同一事务内完成。
    pub async fn delete_ads(&self, user_no: i64, ids: &[String]) -> Result<u64> {
        let owned = self.list_ads(user_no).await?;

        let mut targets: Vec<String> = Vec::new();
        for ad_model in &owned {
            let matched = ids.iter().any(|id| {
                id == &ad_model.user_ad_no
                    || id.parse::<i32>().is_ok_and(|seq| seq == ad_model.ad_seq)
            });
            if matched {
                targets.push(ad_model.user_ad_no.clone());
            }
        }
        if targets.is_empty() {
            return Ok(0);
        }

        let txn = self.get_db().begin().await?;

        visit_log::Entity::delete_many()
            .filter(visit_log::Column::UserAdNo.is_in(targets.clone()))
            .exec(&txn)
            .await?;
        visit_sequence::Entity::delete_many()
            .filter(visit_sequence::Column::UserAdNo.is_in(targets.clone()))
            .exec(&txn)
            .await?;
        let deleted = ad::Entity::delete_many()
            .filter(ad::Column::UserAdNo.is_in(targets))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(deleted.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_expr_sqlite_minute_epoch_floor() {
        let expr = bucket_expr(DbBackend::Sqlite, Granularity::Min5, 32400);
        assert!(expr.contains("strftime('%s', created_at)"));
        assert!(expr.contains("+ 32400"));
        assert!(expr.contains("/ 300) * 300"));
        assert!(expr.contains("'unixepoch'"));
    }

    #[test]
    fn test_bucket_expr_sqlite_iso_week() {
        let expr = bucket_expr(DbBackend::Sqlite, Granularity::Week1, 32400);
        assert_eq!(expr, "strftime('%G-W%V', created_at, '32400 seconds')");
    }

    #[test]
    fn test_bucket_expr_mysql_offset_and_week() {
        let expr = bucket_expr(DbBackend::MySql, Granularity::Day1, 32400);
        assert_eq!(
            expr,
            "DATE_FORMAT(DATE_ADD(created_at, INTERVAL 32400 SECOND), '%Y-%m-%d')"
        );

        let expr = bucket_expr(DbBackend::MySql, Granularity::Week1, 32400);
        assert!(expr.contains("'%x-W%v'"));
    }

    #[test]
    fn test_bucket_expr_mysql_minute_floor() {
        let expr = bucket_expr(DbBackend::MySql, Granularity::Min30, 0);
        assert!(expr.contains("MOD(MINUTE("));
        assert!(expr.contains("30"));
    }

    #[test]
    fn test_bucket_expr_postgres_formats() {
        let expr = bucket_expr(DbBackend::Postgres, Granularity::Min10, 32400);
        assert!(expr.contains("date_bin('10 minutes'"));
        assert!(expr.contains("AT TIME ZONE 'UTC'"));

        let expr = bucket_expr(DbBackend::Postgres, Granularity::Week1, 32400);
        assert!(expr.contains("'IYYY-\"W\"IW'"));

        let expr = bucket_expr(DbBackend::Postgres, Granularity::Hour1, 32400);
        assert!(expr.ends_with("'YYYY-MM-DD HH24:00')"));
    }

    #[test]
    fn test_ad_update_is_empty() {
        assert!(AdUpdate::default().is_empty());
        assert!(
            !AdUpdate {
                ad_name: Some("n".to_string()),
                ..Default::default()
            }
            .is_empty()
        );
        // 清除追踪码也是一次更新
        assert!(
            !AdUpdate {
                ad_code: Some(None),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
