//! 初始表迁移
//!
//! 创建三张表：
//! - ads：广告元数据，(user_no, ad_seq) 唯一
//! - visit_logs：访问日志，按 (user_ad_no, created_at DESC) 建索引供聚合范围扫描
//! - visit_log_sequences：每日序号计数器，(created_day, user_ad_no) 复合主键

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 ads 表
        manager
            .create_table(
                Table::create()
                    .table(Ads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Ads::UserAdNo)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Ads::UserNo).big_integer().not_null())
                    .col(ColumnDef::new(Ads::AdSeq).integer().not_null())
                    .col(ColumnDef::new(Ads::AdName).string_len(255).not_null())
                    .col(ColumnDef::new(Ads::AdDomain).string_len(255).not_null())
                    .col(ColumnDef::new(Ads::AdCode).string_len(128).null())
                    .col(
                        ColumnDef::new(Ads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // (user_no, ad_seq) 唯一约束，序号分配的冲突检测依赖它
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_ads_user_no_ad_seq")
                    .table(Ads::Table)
                    .col(Ads::UserNo)
                    .col(Ads::AdSeq)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ad_code 查找索引（追踪端点按 adCode 解析广告）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ads_ad_code")
                    .table(Ads::Table)
                    .col(Ads::AdCode)
                    .to_owned(),
            )
            .await?;

        // 列表按创建时间倒序
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ads_user_no_created_at")
                    .table(Ads::Table)
                    .col(Ads::UserNo)
                    .col(Ads::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // 创建 visit_logs 表
        manager
            .create_table(
                Table::create()
                    .table(VisitLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VisitLogs::LogKey)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VisitLogs::UserAdNo)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(VisitLogs::RawIp).string_len(64).not_null())
                    .col(
                        ColumnDef::new(VisitLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 聚合查询的范围扫描索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_visit_logs_ad_time")
                    .table(VisitLogs::Table)
                    .col(VisitLogs::UserAdNo)
                    .col((VisitLogs::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // 创建 visit_log_sequences 表（复合主键）
        manager
            .create_table(
                Table::create()
                    .table(VisitLogSequences::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VisitLogSequences::CreatedDay).date().not_null())
                    .col(
                        ColumnDef::new(VisitLogSequences::UserAdNo)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VisitLogSequences::NextSeq)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(VisitLogSequences::CreatedDay)
                            .col(VisitLogSequences::UserAdNo),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VisitLogSequences::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_visit_logs_ad_time").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VisitLogs::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_ads_user_no_created_at").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_ads_ad_code").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uq_ads_user_no_ad_seq").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Ads::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Ads {
    Table,
    UserAdNo,
    UserNo,
    AdSeq,
    AdName,
    AdDomain,
    AdCode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum VisitLogs {
    Table,
    LogKey,
    UserAdNo,
    RawIp,
    CreatedAt,
}

#[derive(DeriveIden)]
enum VisitLogSequences {
    Table,
    CreatedDay,
    UserAdNo,
    NextSeq,
}
