//! API 请求/响应类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::VisitLogPage;
use migration::entities::{ad, visit_log};

/// 统一响应信封
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 广告行的对外表示
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdDto {
    pub user_ad_no: String,
    pub user_no: i64,
    pub ad_seq: i32,
    pub ad_name: String,
    pub ad_domain: String,
    pub ad_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ad::Model> for AdDto {
    fn from(m: ad::Model) -> Self {
        Self {
            user_ad_no: m.user_ad_no,
            user_no: m.user_no,
            ad_seq: m.ad_seq,
            ad_name: m.ad_name,
            ad_domain: m.ad_domain,
            ad_code: m.ad_code,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitLogDto {
    pub log_key: String,
    pub user_ad_no: String,
    pub raw_ip: String,
    pub created_at: DateTime<Utc>,
}

impl From<visit_log::Model> for VisitLogDto {
    fn from(m: visit_log::Model) -> Self {
        Self {
            log_key: m.log_key,
            user_ad_no: m.user_ad_no,
            raw_ip: m.raw_ip,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitLogPageDto {
    pub logs: Vec<VisitLogDto>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

impl From<VisitLogPage> for VisitLogPageDto {
    fn from(page: VisitLogPage) -> Self {
        Self {
            logs: page.logs.into_iter().map(VisitLogDto::from).collect(),
            total: page.total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.has_more,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackParams {
    pub ad_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdBody {
    pub ad_name: String,
    pub ad_domain: String,
    pub ad_code: Option<String>,
}

/// PATCH 请求体；`adCode` 传空字符串表示清除追踪码
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdBody {
    pub ad_name: Option<String>,
    pub ad_domain: Option<String>,
    pub ad_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    pub days: Option<i64>,
    pub bucket: Option<String>,
    pub ad: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// 批量删除接受序号与复合标识混用
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AdIdent {
    Seq(i64),
    Id(String),
}

impl AdIdent {
    pub fn into_string(self) -> String {
        match self {
            AdIdent::Seq(n) => n.to_string(),
            AdIdent::Id(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
    pub ids: Vec<AdIdent>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResult {
    pub deleted: u64,
}
