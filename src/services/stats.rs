//! Stats aggregation service
//!
//! Resolves the visible ad set, derives the query window, runs one
//! grouped count per request and reshapes the sparse rows onto the
//! dense bucket label series.

use std::sync::Arc;

use chrono::{Duration, FixedOffset, TimeZone, Utc};
use tracing::warn;

use crate::analytics::{
    AdMeta, BucketSeries, Granularity, align_series, label_series, previous_label,
};
use crate::errors::Result;
use crate::storage::SeaOrmStorage;
use migration::entities::ad;

/// Stats request, already parsed at the HTTP layer
#[derive(Debug, Clone)]
pub struct StatsQuery {
    /// How many local days back the window reaches (>= 1)
    pub days: i64,
    pub granularity: Granularity,
    /// `None` / empty / `"ALL"` means every visible ad; otherwise a
    /// single `ad_seq` number or `user_ad_no`
    pub ad: Option<String>,
}

pub struct StatsService {
    storage: Arc<SeaOrmStorage>,
    tz: FixedOffset,
}

impl StatsService {
    pub fn new(storage: Arc<SeaOrmStorage>, tz: FixedOffset) -> Self {
        Self { storage, tz }
    }

    /// One aggregation round trip; "no data" is a success value
    pub async fn query_stats(&self, user_no: i64, query: StatsQuery) -> Result<BucketSeries> {
        let visible = self.storage.list_ads(user_no).await?;
        if visible.is_empty() {
            return Ok(BucketSeries::empty());
        }

        let targets = resolve_filter(&visible, query.ad.as_deref());
        if targets.is_empty() {
            // Filter named an ad outside the visible set
            return Ok(BucketSeries::empty());
        }

        let mut days = query.days.max(1);
        if let Some(cap) = query.granularity.max_range_days()
            && days > cap
        {
            warn!(
                "Clamping {}-day window to {} days for {} buckets",
                days, cap, query.granularity
            );
            days = cap;
        }

        // Local calendar window: midnight of (today - (days-1)) .. end of today
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        let start_local = (today - Duration::days(days - 1))
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default();
        let end_local = today.and_hms_opt(23, 59, 59).unwrap_or_default();
        let start = self
            .tz
            .from_local_datetime(&start_local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let end = self
            .tz
            .from_local_datetime(&end_local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let labels = label_series(start, end, query.granularity, self.tz);
        let prev = previous_label(end, query.granularity, self.tz);

        let ids: Vec<String> = targets.iter().map(|m| m.user_ad_no.clone()).collect();
        let rows = self
            .storage
            .grouped_visit_counts(
                &ids,
                start,
                end,
                query.granularity,
                self.tz.local_minus_utc(),
            )
            .await?;

        let metas: Vec<AdMeta> = targets
            .iter()
            .map(|m| AdMeta {
                user_ad_no: m.user_ad_no.clone(),
                ad_seq: Some(m.ad_seq),
                ad_name: Some(m.ad_name.clone()),
            })
            .collect();

        Ok(align_series(labels, &metas, rows, prev))
    }
}

/// Narrow the visible set by an optional single-ad filter
///
/// Matching is exact, against `user_ad_no` or the decimal `ad_seq`;
/// a filter that matches nothing yields an empty target set.
fn resolve_filter<'a>(visible: &'a [ad::Model], filter: Option<&str>) -> Vec<&'a ad::Model> {
    match filter.map(str::trim) {
        None | Some("") => visible.iter().collect(),
        Some(f) if f.eq_ignore_ascii_case("all") => visible.iter().collect(),
        Some(f) => visible
            .iter()
            .filter(|m| {
                m.user_ad_no == f || f.parse::<i32>().is_ok_and(|seq| seq == m.ad_seq)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ad_model(user_ad_no: &str, ad_seq: i32) -> ad::Model {
        ad::Model {
            user_ad_no: user_ad_no.to_string(),
            user_no: 2,
            ad_seq,
            ad_name: String::new(),
            ad_domain: "example.com".to_string(),
            ad_code: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_resolve_filter_all_variants() {
        let visible = vec![ad_model("2_1", 1), ad_model("2_2", 2)];
        assert_eq!(resolve_filter(&visible, None).len(), 2);
        assert_eq!(resolve_filter(&visible, Some("")).len(), 2);
        assert_eq!(resolve_filter(&visible, Some("ALL")).len(), 2);
        assert_eq!(resolve_filter(&visible, Some("all")).len(), 2);
    }

    #[test]
    fn test_resolve_filter_by_seq_and_composite_id() {
        let visible = vec![ad_model("2_1", 1), ad_model("2_2", 2)];

        let by_seq = resolve_filter(&visible, Some("2"));
        assert_eq!(by_seq.len(), 1);
        assert_eq!(by_seq[0].user_ad_no, "2_2");

        let by_id = resolve_filter(&visible, Some("2_1"));
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].ad_seq, 1);
    }

    #[test]
    fn test_resolve_filter_outside_visible_set() {
        let visible = vec![ad_model("2_1", 1)];
        assert!(resolve_filter(&visible, Some("99")).is_empty());
        assert!(resolve_filter(&visible, Some("9_9")).is_empty());
    }
}
