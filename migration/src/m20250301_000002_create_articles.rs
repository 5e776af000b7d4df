use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_categories::Category;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Article::Table)
                    .if_not_exists()
                    .col(pk_auto(Article::Id))
                    .col(string_len(Article::Name, 120).not_null())
                    .col(string_len(Article::Addition, 255).not_null().default(""))
                    .col(integer(Article::CategoryId).not_null())
                    .col(decimal_len(Article::Price, 12, 2).not_null())
                    .col(string_len(Article::Unit, 16).not_null().default("kom"))
                    .col(boolean(Article::Available).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_article_category")
                            .from(Article::Table, Article::CategoryId)
                            .to(Category::Table, Category::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Article::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Article {
    Table,
    Id,
    Name,
    Addition,
    CategoryId,
    Price,
    Unit,
    Available,
}
