//! 访问日志实体
//!
//! 每次追踪请求写入一行，永不修改。
//! `log_key` 形如 `"{YYYYMMDD}_{ad_code}_{seq:04}"`，
//! 其中 seq 在（参考时区日期, 广告）范围内严格递增。

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "visit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub log_key: String,
    pub user_ad_no: String,
    /// 客户端地址，可能带有代理链痕迹
    pub raw_ip: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
