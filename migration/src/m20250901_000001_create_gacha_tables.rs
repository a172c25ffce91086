use sea_orm_migration::prelude::*;

/// Currency balances (one row per customer)
#[derive(DeriveIden)]
enum CurrencyBalances {
    Table,
    Id,
    UserId,
    Amount,
    CreatedAt,
    UpdatedAt,
}

/// Pool items (catalog entries that can be won)
#[derive(DeriveIden)]
enum PoolItems {
    Table,
    Id,
    PoolId,
    ExternalProductId,
    Name,
    ImageUrl,
    Rank,
    ReferencePrice,
    Weight,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

/// Inventory entries (owned quantity per customer and item)
#[derive(DeriveIden)]
enum InventoryEntries {
    Table,
    Id,
    UserId,
    ItemId,
    Quantity,
    Status,
    CreatedAt,
    UpdatedAt,
}

/// Draw history (append-only audit trail)
#[derive(DeriveIden)]
enum DrawHistory {
    Table,
    Id,
    DrawId,
    UserId,
    ItemId,
    AmountDebited,
    PoolId,
    ClientIp,
    OutcomeStatus,
    FailureKind,
    ErrorDetail,
    CreatedAt,
}

/// External orders that already produced a currency credit
#[derive(DeriveIden)]
enum ProcessedPayments {
    Table,
    Id,
    ExternalOrderId,
    UserId,
    CreditAmount,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Timestamps are written by the application, no database defaults, so the
/// same schema runs on Postgres and SQLite.
/// Item ids in inventory/history are weak references: no foreign keys, so a
/// retired item never blocks reading old history.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CurrencyBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CurrencyBalances::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CurrencyBalances::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CurrencyBalances::Amount)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(CurrencyBalances::Amount).gte(0)),
                    )
                    .col(
                        ColumnDef::new(CurrencyBalances::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CurrencyBalances::UpdatedAt)
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
                    .name("idx_currency_balances_user_unique")
                    .table(CurrencyBalances::Table)
                    .col(CurrencyBalances::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PoolItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PoolItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PoolItems::PoolId).string_len(128).not_null())
                    .col(ColumnDef::new(PoolItems::ExternalProductId).big_integer().null())
                    .col(ColumnDef::new(PoolItems::Name).string_len(255).not_null())
                    .col(ColumnDef::new(PoolItems::ImageUrl).text().not_null())
                    .col(ColumnDef::new(PoolItems::Rank).string_len(2).not_null())
                    .col(
                        ColumnDef::new(PoolItems::ReferencePrice)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PoolItems::Weight)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(PoolItems::Weight).gte(0)),
                    )
                    .col(
                        ColumnDef::new(PoolItems::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PoolItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PoolItems::UpdatedAt)
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
                    .name("idx_pool_items_pool_active")
                    .table(PoolItems::Table)
                    .col(PoolItems::PoolId)
                    .col(PoolItems::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InventoryEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InventoryEntries::UserId).big_integer().not_null())
                    .col(ColumnDef::new(InventoryEntries::ItemId).big_integer().not_null())
                    .col(
                        ColumnDef::new(InventoryEntries::Quantity)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(InventoryEntries::Quantity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(InventoryEntries::Status)
                            .string_len(32)
                            .not_null()
                            .default("owned"),
                    )
                    .col(
                        ColumnDef::new(InventoryEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 一个用户对同一物品只有一条库存记录 (upsert target)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inventory_entries_user_item_unique")
                    .table(InventoryEntries::Table)
                    .col(InventoryEntries::UserId)
                    .col(InventoryEntries::ItemId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DrawHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DrawHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DrawHistory::DrawId).uuid().not_null())
                    .col(ColumnDef::new(DrawHistory::UserId).big_integer().not_null())
                    .col(ColumnDef::new(DrawHistory::ItemId).big_integer().null())
                    .col(
                        ColumnDef::new(DrawHistory::AmountDebited)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(DrawHistory::AmountDebited).gte(0)),
                    )
                    .col(ColumnDef::new(DrawHistory::PoolId).string_len(128).not_null())
                    .col(ColumnDef::new(DrawHistory::ClientIp).string_len(64).null())
                    .col(
                        ColumnDef::new(DrawHistory::OutcomeStatus)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DrawHistory::FailureKind).string_len(32).null())
                    .col(ColumnDef::new(DrawHistory::ErrorDetail).text().null())
                    .col(
                        ColumnDef::new(DrawHistory::CreatedAt)
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
                    .name("idx_draw_history_draw_id_unique")
                    .table(DrawHistory::Table)
                    .col(DrawHistory::DrawId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_draw_history_user_created")
                    .table(DrawHistory::Table)
                    .col(DrawHistory::UserId)
                    .col(DrawHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProcessedPayments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProcessedPayments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProcessedPayments::ExternalOrderId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProcessedPayments::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ProcessedPayments::CreditAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProcessedPayments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 去重键：外部订单号
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_processed_payments_order_unique")
                    .table(ProcessedPayments::Table)
                    .col(ProcessedPayments::ExternalOrderId)
                    .unique()
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
                    .table(ProcessedPayments::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(DrawHistory::Table).to_owned())
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(InventoryEntries::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(PoolItems::Table).to_owned())
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(CurrencyBalances::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
