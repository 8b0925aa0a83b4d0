use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_products_table::Migration),
            Box::new(m20250101_000002_create_cart_items_table::Migration),
            Box::new(m20250101_000003_create_orders_table::Migration),
            Box::new(m20250101_000004_create_discount_codes_table::Migration),
            Box::new(m20250101_000005_create_payment_methods_table::Migration),
            Box::new(m20250101_000006_create_content_blocks_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create products table aligned with entities::product Model
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Price).decimal().not_null())
                        .col(
                            ColumnDef::new(Products::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::Image1).string().null())
                        .col(ColumnDef::new(Products::Image2).string().null())
                        .col(ColumnDef::new(Products::Coordinates).string().null())
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // Storefront listings filter on availability
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_is_active")
                        .table(Products::Table)
                        .col(Products::IsActive)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Description,
        Price,
        Quantity,
        Image1,
        Image2,
        Coordinates,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_cart_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_cart_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::ClientId).big_integer().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).integer().not_null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(CartItems::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // One row per (client, product); quantity accumulates on repeat adds
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_client_product")
                        .table(CartItems::Table)
                        .col(CartItems::ClientId)
                        .col(CartItems::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        ClientId,
        ProductId,
        Quantity,
        CreatedAt,
    }
}

mod m20250101_000003_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // One row per line item; rows of the same checkout share an order_id
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::OrderId).string().not_null())
                        .col(ColumnDef::new(Orders::ClientId).big_integer().not_null())
                        .col(ColumnDef::new(Orders::ClientName).string().not_null())
                        .col(ColumnDef::new(Orders::ProductId).integer().not_null())
                        .col(ColumnDef::new(Orders::ProductName).string().not_null())
                        .col(ColumnDef::new(Orders::Quantity).integer().not_null())
                        .col(ColumnDef::new(Orders::TotalPrice).decimal().not_null())
                        .col(ColumnDef::new(Orders::PaymentCurrency).string().not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentSourceAddress)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::DiscountCode).string().null())
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string()
                                .not_null()
                                .default("Pending"),
                        )
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // Useful indexes
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_id")
                        .table(Orders::Table)
                        .col(Orders::OrderId)
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
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_client_id")
                        .table(Orders::Table)
                        .col(Orders::ClientId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderId,
        ClientId,
        ClientName,
        ProductId,
        ProductName,
        Quantity,
        TotalPrice,
        PaymentCurrency,
        PaymentSourceAddress,
        DiscountCode,
        Status,
        CreatedAt,
    }
}

mod m20250101_000004_create_discount_codes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_discount_codes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DiscountCodes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DiscountCodes::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DiscountCodes::Code).string().not_null())
                        .col(
                            ColumnDef::new(DiscountCodes::DiscountPercentage)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DiscountCodes::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(DiscountCodes::MaxUses)
                                .integer()
                                .not_null()
                                .default(-1),
                        )
                        .col(
                            ColumnDef::new(DiscountCodes::UsedCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DiscountCodes::IsGeneral)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(DiscountCodes::ClientId).big_integer().null())
                        .col(ColumnDef::new(DiscountCodes::ClientUsername).string().null())
                        .col(
                            ColumnDef::new(DiscountCodes::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(DiscountCodes::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Codes are matched case-insensitively by storing them upper-cased
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_discount_codes_code")
                        .table(DiscountCodes::Table)
                        .col(DiscountCodes::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DiscountCodes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DiscountCodes {
        Table,
        Id,
        Code,
        DiscountPercentage,
        ExpiryDate,
        MaxUses,
        UsedCount,
        IsGeneral,
        ClientId,
        ClientUsername,
        IsActive,
        CreatedAt,
    }
}

mod m20250101_000005_create_payment_methods_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_payment_methods_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentMethods::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentMethods::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::CurrencyCode)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentMethods::Address).string().not_null())
                        .col(ColumnDef::new(PaymentMethods::Network).string().null())
                        .col(
                            ColumnDef::new(PaymentMethods::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_methods_currency_code")
                        .table(PaymentMethods::Table)
                        .col(PaymentMethods::CurrencyCode)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentMethods::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PaymentMethods {
        Table,
        Id,
        CurrencyCode,
        Address,
        Network,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000006_create_content_blocks_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_content_blocks_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Operator-editable copy for static screens (about, contact, faq, ...)
            manager
                .create_table(
                    Table::create()
                        .table(ContentBlocks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ContentBlocks::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ContentBlocks::Key).string().not_null())
                        .col(ColumnDef::new(ContentBlocks::Body).text().not_null())
                        .col(
                            ColumnDef::new(ContentBlocks::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_content_blocks_key")
                        .table(ContentBlocks::Table)
                        .col(ContentBlocks::Key)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ContentBlocks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ContentBlocks {
        Table,
        Id,
        Key,
        Body,
        UpdatedAt,
    }
}
