use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_stock_tables::Migration),
            Box::new(m20240301_000003_create_sales_document_tables::Migration),
            Box::new(m20240301_000004_create_procurement_tables::Migration),
            Box::new(m20240301_000005_create_finance_tables::Migration),
        ]
    }
}

/// SQLite caps decimal precision at 16.
fn money(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(16, 4)
        .not_null()
        .default(0)
        .to_owned()
}

fn timestamp(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

mod m20240301_000001_create_catalog_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null().unique_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::IsSerialized)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::IsKit)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Products::DefaultSupplierId).uuid().null())
                        .col(money(Products::LastPurchaseCost))
                        .col(timestamp(Products::CreatedAt))
                        .col(timestamp(Products::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(KitComponents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(KitComponents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(KitComponents::KitProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(KitComponents::ComponentProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(KitComponents::QuantityPerUnit)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(KitComponents::Position).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_kit_components_kit")
                                .from(KitComponents::Table, KitComponents::KitProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kit_components_kit")
                        .table(KitComponents::Table)
                        .col(KitComponents::KitProductId)
                        .col(KitComponents::Position)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(KitComponents::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Sku,
        Name,
        IsSerialized,
        IsKit,
        DefaultSupplierId,
        LastPurchaseCost,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum KitComponents {
        Table,
        Id,
        KitProductId,
        ComponentProductId,
        QuantityPerUnit,
        Position,
    }
}

mod m20240301_000002_create_stock_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryBalances::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryBalances::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryBalances::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::OnHand)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::Reserved)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(timestamp(InventoryBalances::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_inventory_balances_product_warehouse")
                        .table(InventoryBalances::Table)
                        .col(InventoryBalances::ProductId)
                        .col(InventoryBalances::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::Quantity).integer().not_null())
                        .col(ColumnDef::new(StockMovements::Reason).string_len(32).not_null())
                        .col(ColumnDef::new(StockMovements::ReferenceKind).string_len(20).null())
                        .col(ColumnDef::new(StockMovements::ReferenceId).uuid().null())
                        .col(
                            ColumnDef::new(StockMovements::IsReconciliation)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(StockMovements::Notes).text().null())
                        .col(ColumnDef::new(StockMovements::CreatedBy).uuid().null())
                        .col(timestamp(StockMovements::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_warehouse")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .col(StockMovements::WarehouseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_reference")
                        .table(StockMovements::Table)
                        .col(StockMovements::ReferenceKind)
                        .col(StockMovements::ReferenceId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SerializedUnits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SerializedUnits::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SerializedUnits::ProductId).uuid().not_null())
                        .col(ColumnDef::new(SerializedUnits::WarehouseId).uuid().null())
                        .col(
                            ColumnDef::new(SerializedUnits::SerialNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SerializedUnits::State).string_len(20).not_null())
                        .col(
                            ColumnDef::new(SerializedUnits::OriginatingPurchaseId)
                                .uuid()
                                .null(),
                        )
                        .col(ColumnDef::new(SerializedUnits::SaleId).uuid().null())
                        .col(timestamp(SerializedUnits::CreatedAt))
                        .col(timestamp(SerializedUnits::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_serialized_units_product_serial")
                        .table(SerializedUnits::Table)
                        .col(SerializedUnits::ProductId)
                        .col(SerializedUnits::SerialNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_serialized_units_purchase")
                        .table(SerializedUnits::Table)
                        .col(SerializedUnits::OriginatingPurchaseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SerializedUnits::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryBalances::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryBalances {
        Table,
        Id,
        ProductId,
        WarehouseId,
        OnHand,
        Reserved,
        Version,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        ProductId,
        WarehouseId,
        Quantity,
        Reason,
        ReferenceKind,
        ReferenceId,
        IsReconciliation,
        Notes,
        CreatedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SerializedUnits {
        Table,
        Id,
        ProductId,
        WarehouseId,
        SerialNumber,
        State,
        OriginatingPurchaseId,
        SaleId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_sales_document_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_sales_document_tables"
        }
    }

    /// Quote, order and sale lines share one layout.
    fn line_table<T: IntoIden + Copy + 'static>(
        table: T,
        parent_col: T,
        columns: [T; 6],
    ) -> TableCreateStatement {
        let [id, item_kind, item_id, quantity, unit_price, position] = columns;
        Table::create()
            .table(table)
            .if_not_exists()
            .col(ColumnDef::new(id).uuid().primary_key().not_null())
            .col(ColumnDef::new(parent_col).uuid().not_null())
            .col(ColumnDef::new(item_kind).string_len(10).not_null())
            .col(ColumnDef::new(item_id).uuid().not_null())
            .col(ColumnDef::new(quantity).integer().not_null())
            .col(money(unit_price))
            .col(ColumnDef::new(position).integer().not_null().default(0))
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Quotes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Quotes::QuoteNumber).string().not_null())
                        .col(ColumnDef::new(Quotes::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Quotes::Status).string_len(24).not_null())
                        .col(ColumnDef::new(Quotes::Notes).text().null())
                        .col(ColumnDef::new(Quotes::CreatedBy).uuid().null())
                        .col(timestamp(Quotes::CreatedAt))
                        .col(timestamp(Quotes::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(line_table(
                    QuoteItems::Table,
                    QuoteItems::QuoteId,
                    [
                        QuoteItems::Id,
                        QuoteItems::ItemKind,
                        QuoteItems::ItemId,
                        QuoteItems::Quantity,
                        QuoteItems::UnitPrice,
                        QuoteItems::Position,
                    ],
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::QuoteId).uuid().null())
                        .col(ColumnDef::new(Orders::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Orders::UpdatedBy).uuid().null())
                        .col(timestamp(Orders::CreatedAt))
                        .col(timestamp(Orders::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(line_table(
                    OrderItems::Table,
                    OrderItems::OrderId,
                    [
                        OrderItems::Id,
                        OrderItems::ItemKind,
                        OrderItems::ItemId,
                        OrderItems::Quantity,
                        OrderItems::UnitPrice,
                        OrderItems::Position,
                    ],
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sales::SaleNumber).string().not_null())
                        .col(ColumnDef::new(Sales::OrderId).uuid().null().unique_key())
                        .col(ColumnDef::new(Sales::QuoteId).uuid().null())
                        .col(ColumnDef::new(Sales::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Sales::Status).string_len(20).not_null())
                        .col(money(Sales::Subtotal))
                        .col(money(Sales::Tax))
                        .col(money(Sales::Total))
                        .col(ColumnDef::new(Sales::CreatedBy).uuid().null())
                        .col(timestamp(Sales::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(line_table(
                    SaleItems::Table,
                    SaleItems::SaleId,
                    [
                        SaleItems::Id,
                        SaleItems::ItemKind,
                        SaleItems::ItemId,
                        SaleItems::Quantity,
                        SaleItems::UnitPrice,
                        SaleItems::Position,
                    ],
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItemSerials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleItemSerials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleItemSerials::SaleItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(SaleItemSerials::SerializedUnitId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(SaleItemSerials::SerialNumber)
                                .string()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                SaleItemSerials::Table.into_iden(),
                SaleItems::Table.into_iden(),
                Sales::Table.into_iden(),
                OrderItems::Table.into_iden(),
                Orders::Table.into_iden(),
                QuoteItems::Table.into_iden(),
                Quotes::Table.into_iden(),
            ] {
                manager
                    .drop_table(Table::drop().table(table).to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Quotes {
        Table,
        Id,
        QuoteNumber,
        WarehouseId,
        Status,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum QuoteItems {
        Table,
        Id,
        QuoteId,
        ItemKind,
        ItemId,
        Quantity,
        UnitPrice,
        Position,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        QuoteId,
        WarehouseId,
        Status,
        Notes,
        CreatedBy,
        UpdatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ItemKind,
        ItemId,
        Quantity,
        UnitPrice,
        Position,
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        SaleNumber,
        OrderId,
        QuoteId,
        WarehouseId,
        Status,
        Subtotal,
        Tax,
        Total,
        CreatedBy,
        CreatedAt,
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum SaleItems {
        Table,
        Id,
        SaleId,
        ItemKind,
        ItemId,
        Quantity,
        UnitPrice,
        Position,
    }

    #[derive(DeriveIden)]
    enum SaleItemSerials {
        Table,
        Id,
        SaleItemId,
        SerializedUnitId,
        SerialNumber,
    }
}

mod m20240301_000004_create_procurement_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_procurement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::PoNumber).string().not_null())
                        .col(ColumnDef::new(PurchaseOrders::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::OrderId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrders::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::Status).string_len(20).not_null())
                        .col(ColumnDef::new(PurchaseOrders::Notes).text().null())
                        .col(money(PurchaseOrders::Subtotal))
                        .col(money(PurchaseOrders::Tax))
                        .col(money(PurchaseOrders::Total))
                        .col(timestamp(PurchaseOrders::CreatedAt))
                        .col(timestamp(PurchaseOrders::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_order")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(money(PurchaseOrderItems::UnitCost))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Purchases::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Purchases::PurchaseNumber).string().not_null())
                        .col(ColumnDef::new(Purchases::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(Purchases::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Purchases::PurchaseOrderId).uuid().null())
                        .col(ColumnDef::new(Purchases::BankAccountId).uuid().null())
                        .col(ColumnDef::new(Purchases::Status).string_len(20).not_null())
                        .col(money(Purchases::Subtotal))
                        .col(money(Purchases::Tax))
                        .col(money(Purchases::Total))
                        .col(ColumnDef::new(Purchases::Notes).text().null())
                        .col(ColumnDef::new(Purchases::CreatedBy).uuid().null())
                        .col(timestamp(Purchases::CreatedAt))
                        .col(timestamp(Purchases::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseItems::PurchaseId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseItems::Quantity).integer().not_null())
                        .col(money(PurchaseItems::UnitCost))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                PurchaseItems::Table.into_iden(),
                Purchases::Table.into_iden(),
                PurchaseOrderItems::Table.into_iden(),
                PurchaseOrders::Table.into_iden(),
            ] {
                manager
                    .drop_table(Table::drop().table(table).to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        PoNumber,
        SupplierId,
        OrderId,
        WarehouseId,
        Status,
        Notes,
        Subtotal,
        Tax,
        Total,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderItems {
        Table,
        Id,
        PurchaseOrderId,
        ProductId,
        Quantity,
        UnitCost,
    }

    #[derive(DeriveIden)]
    enum Purchases {
        Table,
        Id,
        PurchaseNumber,
        SupplierId,
        WarehouseId,
        PurchaseOrderId,
        BankAccountId,
        Status,
        Subtotal,
        Tax,
        Total,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseItems {
        Table,
        Id,
        PurchaseId,
        ProductId,
        Quantity,
        UnitCost,
    }
}

mod m20240301_000005_create_finance_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_finance_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payables::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payables::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Payables::PurchaseId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(money(Payables::AmountTotal))
                        .col(money(Payables::AmountPaid))
                        .col(money(Payables::AmountPending))
                        .col(ColumnDef::new(Payables::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Payables::Notes).text().null())
                        .col(timestamp(Payables::CreatedAt))
                        .col(timestamp(Payables::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BankAccounts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BankAccounts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BankAccounts::Name).string().not_null())
                        .col(money(BankAccounts::Balance))
                        .col(timestamp(BankAccounts::CreatedAt))
                        .col(timestamp(BankAccounts::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BankMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BankMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BankMovements::BankAccountId).uuid().not_null())
                        .col(ColumnDef::new(BankMovements::Kind).string_len(12).not_null())
                        .col(money(BankMovements::Amount))
                        .col(ColumnDef::new(BankMovements::Description).string().not_null())
                        .col(ColumnDef::new(BankMovements::PurchaseId).uuid().null())
                        .col(timestamp(BankMovements::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_bank_movements_account")
                                .from(BankMovements::Table, BankMovements::BankAccountId)
                                .to(BankAccounts::Table, BankAccounts::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                BankMovements::Table.into_iden(),
                BankAccounts::Table.into_iden(),
                Payables::Table.into_iden(),
            ] {
                manager
                    .drop_table(Table::drop().table(table).to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Payables {
        Table,
        Id,
        PurchaseId,
        AmountTotal,
        AmountPaid,
        AmountPending,
        Status,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BankAccounts {
        Table,
        Id,
        Name,
        Balance,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BankMovements {
        Table,
        Id,
        BankAccountId,
        Kind,
        Amount,
        Description,
        PurchaseId,
        CreatedAt,
    }
}
