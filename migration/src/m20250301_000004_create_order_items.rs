use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000002_create_articles::Article;
use super::m20250301_000003_create_orders::CustomerOrder;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderItem::Table)
                    .if_not_exists()
                    .col(pk_auto(OrderItem::Id))
                    .col(integer(OrderItem::OrderId).not_null())
                    .col(integer_null(OrderItem::ArticleId))
                    .col(string_len(OrderItem::ArticleName, 120).not_null())
                    .col(decimal_len(OrderItem::UnitPrice, 12, 2).not_null())
                    .col(integer(OrderItem::Quantity).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_item_order")
                            .from(OrderItem::Table, OrderItem::OrderId)
                            .to(CustomerOrder::Table, CustomerOrder::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_item_article")
                            .from(OrderItem::Table, OrderItem::ArticleId)
                            .to(Article::Table, Article::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderItem::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OrderItem {
    Table,
    Id,
    OrderId,
    ArticleId,
    ArticleName,
    UnitPrice,
    Quantity,
}
