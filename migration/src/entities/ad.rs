//! 广告实体
//!
//! 一条记录代表一个被追踪的广告（链接/像素）。
//! `user_ad_no` 是 `"{user_no}_{ad_seq}"` 形式的复合标识，
//! `(user_no, ad_seq)` 全局唯一，序号由分配器按最小空闲值发放。

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "ads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_ad_no: String,
    pub user_no: i64,
    pub ad_seq: i32,
    pub ad_name: String,
    pub ad_domain: String,
    /// 追踪码（像素 URL 中的 adCode），未设置时为空
    pub ad_code: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
