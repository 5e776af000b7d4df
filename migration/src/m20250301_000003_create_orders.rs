use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create order status enum
        manager
            .create_type(
                Type::create()
                    .as_enum(OrderStatus::Enum)
                    .values([
                        OrderStatus::Pending,
                        OrderStatus::Confirmed,
                        OrderStatus::Preparing,
                        OrderStatus::Delivering,
                        OrderStatus::Delivered,
                        OrderStatus::Cancelled,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CustomerOrder::Table)
                    .if_not_exists()
                    .col(pk_auto(CustomerOrder::Id))
                    .col(string_len(CustomerOrder::CustomerName, 160).not_null())
                    .col(string_len(CustomerOrder::Phone, 16).not_null())
                    .col(text(CustomerOrder::Address).not_null())
                    .col(double(CustomerOrder::Latitude).not_null())
                    .col(double(CustomerOrder::Longitude).not_null())
                    .col(double(CustomerOrder::DistanceKm).not_null())
                    .col(
                        ColumnDef::new(CustomerOrder::Status)
                            .custom(OrderStatus::Enum)
                            .not_null(),
                    )
                    .col(boolean(CustomerOrder::Verified).not_null().default(false))
                    .col(decimal_len(CustomerOrder::Subtotal, 12, 2).not_null())
                    .col(decimal_len(CustomerOrder::DeliveryFee, 12, 2).not_null())
                    .col(text_null(CustomerOrder::Note))
                    .col(
                        timestamp_with_time_zone(CustomerOrder::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CustomerOrder::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(OrderStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CustomerOrder {
    Table,
    Id,
    CustomerName,
    Phone,
    Address,
    Latitude,
    Longitude,
    DistanceKm,
    Status,
    Verified,
    Subtotal,
    DeliveryFee,
    Note,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum OrderStatus {
    #[sea_orm(iden = "order_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "confirmed")]
    Confirmed,
    #[sea_orm(iden = "preparing")]
    Preparing,
    #[sea_orm(iden = "delivering")]
    Delivering,
    #[sea_orm(iden = "delivered")]
    Delivered,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
}
