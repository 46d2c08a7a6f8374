//! API 帮助函数

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

use crate::errors::AdTrackerError;

use super::types::ApiResponse;

/// 错误分类到 HTTP 状态码
pub fn http_status(err: &AdTrackerError) -> StatusCode {
    match err {
        AdTrackerError::Validation(_) | AdTrackerError::DateParse(_) => StatusCode::BAD_REQUEST,
        AdTrackerError::NotFound(_) => StatusCode::NOT_FOUND,
        AdTrackerError::UniqueConflict(_) | AdTrackerError::AllocationExhausted(_) => {
            StatusCode::CONFLICT
        }
        AdTrackerError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: status.as_u16() as i32,
            message: message.into(),
            data,
        })
}

pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, "OK", Some(data))
}

pub fn error_response(err: &AdTrackerError) -> HttpResponse {
    json_response::<()>(http_status(err), err.message(), None)
}

/// 统一 Result -> HttpResponse 转换
pub fn api_result<T: Serialize>(result: crate::errors::Result<T>) -> HttpResponse {
    match result {
        Ok(data) => success_response(data),
        Err(e) => error_response(&e),
    }
}

/// 从 `X-User-No` 头取出已认证的 owner 编号
///
/// 认证在上游网关完成，这里只做取值与解析。
pub fn owner_from_request(req: &HttpRequest) -> crate::errors::Result<i64> {
    req.headers()
        .get("x-user-no")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| AdTrackerError::validation("Missing or invalid X-User-No header"))
}
