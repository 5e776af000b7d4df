use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Category::Table)
                    .if_not_exists()
                    .col(pk_auto(Category::Id))
                    .col(string_len(Category::Name, 80).not_null().unique_key())
                    .col(string_len(Category::Emoji, 16).not_null().default(""))
                    .to_owned(),
            )
            .await?;

        // Seed categories
        let insert = Query::insert()
            .into_table(Category::Table)
            .columns([Category::Name, Category::Emoji])
            .values_panic(["Voće i povrće".into(), "🥕".into()])
            .values_panic(["Cigarete".into(), "🚬".into()])
            .values_panic(["Pića".into(), "🥤".into()])
            .values_panic(["Slatkiši".into(), "🍫".into()])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Category::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Category {
    Table,
    Id,
    Name,
    Emoji,
}
