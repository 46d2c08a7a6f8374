//! Ad management service
//!
//! CRUD over the `ads` table. Creation goes through the sequence
//! allocator so every owner gets the smallest unused `ad_seq`.

use std::sync::Arc;

use tracing::info;

use crate::errors::{AdTrackerError, Result};
use crate::storage::{AdUpdate, SeaOrmStorage, VisitLogPage};
use migration::entities::ad;

/// Visit log pagination bounds
const LOG_LIMIT_DEFAULT: u64 = 200;
const LOG_LIMIT_MAX: u64 = 500;

/// Request to create a new ad
#[derive(Debug, Clone)]
pub struct CreateAdRequest {
    pub ad_name: String,
    pub ad_domain: String,
    /// Tracking code used by the pixel endpoint (optional)
    pub ad_code: Option<String>,
}

/// Request to partially update an ad
#[derive(Debug, Clone, Default)]
pub struct UpdateAdRequest {
    pub ad_name: Option<String>,
    pub ad_domain: Option<String>,
    /// `Some(None)` clears the tracking code
    pub ad_code: Option<Option<String>>,
}

pub struct AdService {
    storage: Arc<SeaOrmStorage>,
}

impl AdService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    /// Create an ad; the sequence allocator assigns the smallest unused seq
    pub async fn create_ad(&self, user_no: i64, req: CreateAdRequest) -> Result<ad::Model> {
        if req.ad_name.trim().is_empty() {
            return Err(AdTrackerError::validation("Ad name must not be empty"));
        }
        if req.ad_domain.trim().is_empty() {
            return Err(AdTrackerError::validation("Ad domain must not be empty"));
        }

        let created = self
            .storage
            .allocate_ad(
                user_no,
                req.ad_name.trim(),
                req.ad_domain.trim(),
                req.ad_code.as_deref().map(str::trim).filter(|c| !c.is_empty()),
            )
            .await?;

        info!(
            "Created ad {} (seq {}) for user {}",
            created.user_ad_no, created.ad_seq, user_no
        );
        Ok(created)
    }

    /// All ads of an owner, newest first
    pub async fn list_ads(&self, user_no: i64) -> Result<Vec<ad::Model>> {
        self.storage.list_ads(user_no).await
    }

    pub async fn get_ad(&self, user_no: i64, ad_seq: i32) -> Result<ad::Model> {
        self.storage
            .find_ad(user_no, ad_seq)
            .await?
            .ok_or_else(|| {
                AdTrackerError::not_found(format!("Ad {} not found for user {}", ad_seq, user_no))
            })
    }

    /// Partial update; rejects empty updates before touching the store
    pub async fn update_ad(
        &self,
        user_no: i64,
        ad_seq: i32,
        req: UpdateAdRequest,
    ) -> Result<ad::Model> {
        let update = AdUpdate {
            ad_name: req.ad_name,
            ad_domain: req.ad_domain,
            ad_code: req.ad_code,
        };
        if update.is_empty() {
            return Err(AdTrackerError::validation("No fields to update"));
        }

        self.storage
            .update_ad(user_no, ad_seq, update)
            .await?
            .ok_or_else(|| {
                AdTrackerError::not_found(format!("Ad {} not found for user {}", ad_seq, user_no))
            })
    }

    /// Delete ads by a mixed list of seqs and composite ids, returns the count
    pub async fn bulk_delete(&self, user_no: i64, ids: Vec<String>) -> Result<u64> {
        if ids.is_empty() {
            return Err(AdTrackerError::validation("No ad ids supplied"));
        }
        let deleted = self.storage.delete_ads(user_no, &ids).await?;
        info!("Deleted {} ads for user {}", deleted, user_no);
        Ok(deleted)
    }

    /// Paged visit logs across all ads of the owner, newest first
    pub async fn list_logs(
        &self,
        user_no: i64,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<VisitLogPage> {
        let limit = limit.unwrap_or(LOG_LIMIT_DEFAULT).clamp(1, LOG_LIMIT_MAX);
        let offset = offset.unwrap_or(0);
        self.storage.list_visit_logs(user_no, limit, offset).await
    }
}
