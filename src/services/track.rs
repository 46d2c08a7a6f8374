//! Tracking ingest service
//!
//! Resolves a tracking code to its ad, allocates the daily log
//! sequence and records one visit row. The allocate-and-insert pair
//! is retried exactly once on a uniqueness violation (counter races
//! across process instances); a second failure propagates.

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use tracing::debug;

use crate::errors::{AdTrackerError, Result};
use crate::storage::SeaOrmStorage;
use crate::storage::backend::retry::{is_unique_violation, with_retry_on};

/// Total attempts for one ingest (initial try + one retry)
const INGEST_ATTEMPTS: u32 = 2;

pub struct TrackService {
    storage: Arc<SeaOrmStorage>,
    tz: FixedOffset,
}

impl TrackService {
    pub fn new(storage: Arc<SeaOrmStorage>, tz: FixedOffset) -> Self {
        Self { storage, tz }
    }

    /// Record one visit for the ad behind `ad_code`, returns the log key
    ///
    /// Log keys follow `"{YYYYMMDD}_{ad_code}_{seq:04}"` with the day
    /// taken in the reference timezone.
    pub async fn ingest_visit(&self, ad_code: &str, client_ip: &str) -> Result<String> {
        let ad = self
            .storage
            .find_ad_by_code(ad_code)
            .await?
            .ok_or_else(|| AdTrackerError::not_found(format!("Unknown ad code: {}", ad_code)))?;

        let log_key = with_retry_on("ingest_visit", INGEST_ATTEMPTS, is_unique_violation, || {
            async {
                // Reference-timezone day, recomputed per attempt so a
                // retry across midnight still lands on the right day key
                let day = Utc::now().with_timezone(&self.tz).date_naive();
                let day_compact = day.format("%Y%m%d").to_string();
                self.storage
                    .try_insert_visit(ad_code, &ad.user_ad_no, client_ip, day, &day_compact)
                    .await
            }
        })
        .await?;

        debug!("Recorded visit {} from {}", log_key, client_ip);
        Ok(log_key)
    }
}
