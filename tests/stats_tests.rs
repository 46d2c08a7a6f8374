//! 统计聚合集成测试
//!
//! 覆盖分组计数的桶键与 Bucket Calendar 标签的一致性、
//! 补零对齐、时区日界，以及 StatsService 的端到端路径。

use std::sync::{Arc, Once};

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use tempfile::TempDir;

use adtracker::analytics::{AdMeta, Granularity, align_series, label_series, previous_label};
use adtracker::config::init_config;
use adtracker::services::{StatsQuery, StatsService, TrackService};
use adtracker::storage::backend::SeaOrmStorage;
use migration::entities::visit_log;

static INIT: Once = Once::new();

fn init_static_config() {
    INIT.call_once(|| {
        init_config();
    });
}

fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    init_static_config();
    let td = TempDir::new().unwrap();
    let p = td.path().join("test.db");
    let u = format!("sqlite://{}?mode=rwc", p.display());
    let s = SeaOrmStorage::new(&u, "sqlite").await.unwrap();
    (Arc::new(s), td)
}

async fn insert_visit_at(
    storage: &SeaOrmStorage,
    log_key: &str,
    user_ad_no: &str,
    created_at: DateTime<Utc>,
) {
    visit_log::ActiveModel {
        log_key: Set(log_key.to_string()),
        user_ad_no: Set(user_ad_no.to_string()),
        raw_ip: Set("10.0.0.1".to_string()),
        created_at: Set(created_at),
    }
    .insert(storage.get_db())
    .await
    .unwrap();
}

#[tokio::test]
async fn test_5m_scenario_grouping_and_alignment() {
    let (storage, _td) = create_temp_storage().await;
    storage
        .allocate_ad(2, "homepage", "example.com", None)
        .await
        .unwrap();

    // KST 2024-01-01 00:02 / 00:07 / 00:11
    insert_visit_at(&storage, "k1", "2_1", utc(2023, 12, 31, 15, 2, 0)).await;
    insert_visit_at(&storage, "k2", "2_1", utc(2023, 12, 31, 15, 7, 0)).await;
    insert_visit_at(&storage, "k3", "2_1", utc(2023, 12, 31, 15, 11, 0)).await;

    // 窗口 KST [00:00, 00:15]，5 分钟桶
    let start = utc(2023, 12, 31, 15, 0, 0);
    let end = utc(2023, 12, 31, 15, 15, 0);
    let tz = kst();

    let labels = label_series(start, end, Granularity::Min5, tz);
    assert_eq!(
        labels,
        vec![
            "2024-01-01 00:00",
            "2024-01-01 00:05",
            "2024-01-01 00:10",
            "2024-01-01 00:15",
        ]
    );

    let rows = storage
        .grouped_visit_counts(
            &["2_1".to_string()],
            start,
            end,
            Granularity::Min5,
            tz.local_minus_utc(),
        )
        .await
        .unwrap();
    // SQL 桶键必须与日历标签逐字节一致
    for row in &rows {
        assert!(labels.contains(&row.bucket_key), "stray key {}", row.bucket_key);
    }

    let metas = vec![AdMeta {
        user_ad_no: "2_1".to_string(),
        ad_seq: Some(1),
        ad_name: None,
    }];
    let prev = previous_label(end, Granularity::Min5, tz);
    let series = align_series(labels, &metas, rows, prev);

    assert_eq!(series.series.len(), 1);
    assert_eq!(series.series[0].data, vec![1, 1, 1, 0]);
    assert_eq!(series.series[0].name, "1");
}

#[tokio::test]
async fn test_day_bucket_respects_reference_timezone() {
    let (storage, _td) = create_temp_storage().await;
    storage
        .allocate_ad(2, "ad", "example.com", None)
        .await
        .unwrap();

    // UTC 还是 2023-12-31，KST 已是 2024-01-01
    insert_visit_at(&storage, "k1", "2_1", utc(2023, 12, 31, 15, 2, 0)).await;
    // UTC 与 KST 同日
    insert_visit_at(&storage, "k2", "2_1", utc(2023, 12, 31, 3, 0, 0)).await;

    let rows = storage
        .grouped_visit_counts(
            &["2_1".to_string()],
            utc(2023, 12, 30, 15, 0, 0),
            utc(2024, 1, 1, 14, 59, 59),
            Granularity::Day1,
            kst().local_minus_utc(),
        )
        .await
        .unwrap();

    let mut by_key: Vec<(String, i64)> = rows
        .into_iter()
        .map(|r| (r.bucket_key, r.count))
        .collect();
    by_key.sort();
    assert_eq!(
        by_key,
        vec![
            ("2023-12-31".to_string(), 1),
            ("2024-01-01".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_ad_without_visits_is_zero_filled() {
    let (storage, _td) = create_temp_storage().await;
    storage
        .allocate_ad(2, "with-data", "example.com", None)
        .await
        .unwrap();
    storage
        .allocate_ad(2, "silent", "example.com", None)
        .await
        .unwrap();

    insert_visit_at(&storage, "k1", "2_1", utc(2024, 6, 1, 3, 0, 0)).await;

    let start = utc(2024, 5, 31, 15, 0, 0);
    let end = utc(2024, 6, 1, 14, 59, 59);
    let tz = kst();

    let labels = label_series(start, end, Granularity::Day1, tz);
    let rows = storage
        .grouped_visit_counts(
            &["2_1".to_string(), "2_2".to_string()],
            start,
            end,
            Granularity::Day1,
            tz.local_minus_utc(),
        )
        .await
        .unwrap();

    let metas = vec![
        AdMeta {
            user_ad_no: "2_1".to_string(),
            ad_seq: Some(1),
            ad_name: Some("with-data".to_string()),
        },
        AdMeta {
            user_ad_no: "2_2".to_string(),
            ad_seq: Some(2),
            ad_name: Some("silent".to_string()),
        },
    ];
    let prev = previous_label(end, Granularity::Day1, tz);
    let series = align_series(labels, &metas, rows, prev);

    assert_eq!(series.series.len(), 2);
    for s in &series.series {
        assert_eq!(s.data.len(), series.labels.len());
    }
    assert_eq!(series.series[0].data.iter().sum::<u64>(), 1);
    assert_eq!(series.series[1].data.iter().sum::<u64>(), 0);
}

#[tokio::test]
async fn test_stats_service_end_to_end() {
    let (storage, _td) = create_temp_storage().await;
    storage
        .allocate_ad(2, "homepage", "example.com", Some("og_2_1"))
        .await
        .unwrap();
    let track = TrackService::new(storage.clone(), kst());
    track.ingest_visit("og_2_1", "203.0.113.7").await.unwrap();
    track.ingest_visit("og_2_1", "203.0.113.7").await.unwrap();

    let stats = StatsService::new(storage.clone(), kst());
    let result = stats
        .query_stats(
            2,
            StatsQuery {
                days: 1,
                granularity: Granularity::Day1,
                ad: None,
            },
        )
        .await
        .unwrap();

    // 单日窗口也至少两个标签
    assert!(result.labels.len() >= 2);
    assert_eq!(result.series.len(), 1);
    assert_eq!(result.series[0].name, "homepage");
    assert_eq!(result.series[0].data.iter().sum::<u64>(), 2);
    assert_eq!(result.series[0].data.len(), result.labels.len());
}

#[tokio::test]
async fn test_stats_service_filters() {
    let (storage, _td) = create_temp_storage().await;
    storage
        .allocate_ad(2, "a", "example.com", Some("code-a"))
        .await
        .unwrap();
    storage
        .allocate_ad(2, "b", "example.com", Some("code-b"))
        .await
        .unwrap();
    let track = TrackService::new(storage.clone(), kst());
    track.ingest_visit("code-a", "203.0.113.7").await.unwrap();

    let stats = StatsService::new(storage.clone(), kst());

    // 按序号过滤
    let one = stats
        .query_stats(
            2,
            StatsQuery {
                days: 1,
                granularity: Granularity::Hour1,
                ad: Some("2".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(one.series.len(), 1);
    assert_eq!(one.series[0].user_ad_no, "2_2");

    // 过滤命中可见集之外：空结果而非错误
    let none = stats
        .query_stats(
            2,
            StatsQuery {
                days: 1,
                granularity: Granularity::Hour1,
                ad: Some("99".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(none.labels.is_empty());
    assert!(none.series.is_empty());

    // 没有任何广告的 owner：空结果
    let empty = stats
        .query_stats(
            9,
            StatsQuery {
                days: 7,
                granularity: Granularity::Day1,
                ad: None,
            },
        )
        .await
        .unwrap();
    assert!(empty.labels.is_empty());
}

#[tokio::test]
async fn test_stats_service_clamps_minute_windows() {
    let (storage, _td) = create_temp_storage().await;
    storage
        .allocate_ad(2, "ad", "example.com", None)
        .await
        .unwrap();

    let stats = StatsService::new(storage, kst());
    let result = stats
        .query_stats(
            2,
            StatsQuery {
                days: 30,
                granularity: Granularity::Min1,
                ad: None,
            },
        )
        .await
        .unwrap();

    // 1m 上限 1 天：最多一天的分钟桶
    assert!(!result.labels.is_empty());
    assert!(result.labels.len() <= 24 * 60 + 1);
}
