//! HTTP API
//!
//! 薄封装：路由与 DTO 转换在这里，业务逻辑都在 `services`。
//! owner 主体由上游认证后以 `X-User-No` 头传入。

mod handlers;
pub mod helpers;
pub mod types;

use std::sync::Arc;

use actix_web::web;
use chrono::FixedOffset;

use crate::services::{AdService, StatsService, TrackService};
use crate::storage::SeaOrmStorage;

pub struct AppState {
    pub ads: AdService,
    pub track: TrackService,
    pub stats: StatsService,
}

impl AppState {
    pub fn new(storage: Arc<SeaOrmStorage>, tz: FixedOffset) -> Self {
        Self {
            ads: AdService::new(storage.clone()),
            track: TrackService::new(storage.clone(), tz),
            stats: StatsService::new(storage, tz),
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/track", web::get().to(handlers::track))
            .service(
                // 字面路由必须先于 /{ad_seq} 注册
                web::scope("/ads")
                    .route("", web::get().to(handlers::list_ads))
                    .route("", web::post().to(handlers::create_ad))
                    .route("/stats", web::get().to(handlers::stats))
                    .route("/logs", web::get().to(handlers::logs))
                    .route("/bulk-delete", web::post().to(handlers::bulk_delete))
                    .route("/{ad_seq}", web::get().to(handlers::get_ad))
                    .route("/{ad_seq}", web::patch().to(handlers::update_ad)),
            ),
    );
}
