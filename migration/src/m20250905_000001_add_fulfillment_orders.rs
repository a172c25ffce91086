use sea_orm_migration::prelude::*;

/// Fulfillment orders: one row per won item that is linked to a shop product.
/// status: pending -> created | failed -> (retry) -> created | abandoned
#[derive(DeriveIden)]
enum FulfillmentOrders {
    Table,
    Id,
    DrawId,
    UserId,
    ItemId,
    ExternalProductId,
    Status,
    Attempts,
    ExternalOrderId,
    LastError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FulfillmentOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FulfillmentOrders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FulfillmentOrders::DrawId).uuid().not_null())
                    .col(ColumnDef::new(FulfillmentOrders::UserId).big_integer().not_null())
                    .col(ColumnDef::new(FulfillmentOrders::ItemId).big_integer().not_null())
                    .col(
                        ColumnDef::new(FulfillmentOrders::ExternalProductId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FulfillmentOrders::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(FulfillmentOrders::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FulfillmentOrders::ExternalOrderId)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(FulfillmentOrders::LastError).text().null())
                    .col(
                        ColumnDef::new(FulfillmentOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FulfillmentOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_fulfillment_orders_draw_unique")
                    .table(FulfillmentOrders::Table)
                    .col(FulfillmentOrders::DrawId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_fulfillment_orders_status")
                    .table(FulfillmentOrders::Table)
                    .col(FulfillmentOrders::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(FulfillmentOrders::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
