//! 请求处理函数

use actix_web::{HttpRequest, HttpResponse, web};

use crate::errors::AdTrackerError;
use crate::services::{CreateAdRequest, StatsQuery, UpdateAdRequest};
use crate::utils::extract_client_ip;

use super::AppState;
use super::helpers::{api_result, error_response, owner_from_request};
use super::types::{
    AdDto, BulkDeleteBody, BulkDeleteResult, CreateAdBody, LogsParams, StatsParams, TrackParams,
    UpdateAdBody, VisitLogPageDto,
};

/// GET /api/track?adCode=...
///
/// 像素打点入口，成功时 204 无响应体。
pub async fn track(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<TrackParams>,
) -> HttpResponse {
    let Some(code) = params
        .ad_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    else {
        return error_response(&AdTrackerError::validation("Missing adCode parameter"));
    };

    let client_ip = extract_client_ip(&req);
    match state.track.ingest_visit(code, &client_ip).await {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/ads
pub async fn list_ads(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let user_no = match owner_from_request(&req) {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    api_result(
        state
            .ads
            .list_ads(user_no)
            .await
            .map(|ads| ads.into_iter().map(AdDto::from).collect::<Vec<_>>()),
    )
}

/// POST /api/ads
pub async fn create_ad(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateAdBody>,
) -> HttpResponse {
    let user_no = match owner_from_request(&req) {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    let body = body.into_inner();
    api_result(
        state
            .ads
            .create_ad(
                user_no,
                CreateAdRequest {
                    ad_name: body.ad_name,
                    ad_domain: body.ad_domain,
                    ad_code: body.ad_code,
                },
            )
            .await
            .map(AdDto::from),
    )
}

/// GET /api/ads/{ad_seq}
pub async fn get_ad(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> HttpResponse {
    let user_no = match owner_from_request(&req) {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    api_result(
        state
            .ads
            .get_ad(user_no, path.into_inner())
            .await
            .map(AdDto::from),
    )
}

/// PATCH /api/ads/{ad_seq}
pub async fn update_ad(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i32>,
    body: web::Json<UpdateAdBody>,
) -> HttpResponse {
    let user_no = match owner_from_request(&req) {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    let body = body.into_inner();
    let update = UpdateAdRequest {
        ad_name: body.ad_name,
        ad_domain: body.ad_domain,
        // 空字符串清除追踪码
        ad_code: body.ad_code.map(|c| {
            let trimmed = c.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        }),
    };
    api_result(
        state
            .ads
            .update_ad(user_no, path.into_inner(), update)
            .await
            .map(AdDto::from),
    )
}

/// POST /api/ads/bulk-delete
pub async fn bulk_delete(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<BulkDeleteBody>,
) -> HttpResponse {
    let user_no = match owner_from_request(&req) {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    let ids: Vec<String> = body
        .into_inner()
        .ids
        .into_iter()
        .map(|id| id.into_string())
        .collect();
    api_result(
        state
            .ads
            .bulk_delete(user_no, ids)
            .await
            .map(|deleted| BulkDeleteResult { deleted }),
    )
}

/// GET /api/ads/stats?days=&bucket=&ad=
pub async fn stats(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<StatsParams>,
) -> HttpResponse {
    let user_no = match owner_from_request(&req) {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    let params = params.into_inner();

    let granularity = match params
        .bucket
        .as_deref()
        .map(str::parse::<crate::analytics::Granularity>)
        .transpose()
    {
        Ok(g) => g.unwrap_or_default(),
        Err(msg) => return error_response(&AdTrackerError::validation(msg)),
    };

    api_result(
        state
            .stats
            .query_stats(
                user_no,
                StatsQuery {
                    days: params.days.unwrap_or(7),
                    granularity,
                    ad: params.ad,
                },
            )
            .await,
    )
}

/// GET /api/ads/logs?limit=&offset=
pub async fn logs(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<LogsParams>,
) -> HttpResponse {
    let user_no = match owner_from_request(&req) {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    api_result(
        state
            .ads
            .list_logs(user_no, params.limit, params.offset)
            .await
            .map(VisitLogPageDto::from),
    )
}
