//! 每日访问序号计数器实体
//!
//! `(created_day, user_ad_no)` 为复合主键，`next_seq` 从 1 起单调递增，
//! 由原子 upsert-increment 维护。

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "visit_log_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub created_day: Date,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_ad_no: String,
    pub next_seq: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
