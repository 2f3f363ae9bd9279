//! Migration: Create service_orders table.
//!
//! One row per submitted inspection. Rows are written once and never updated.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE service_orders (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting

                    -- Identification (upper-cased by the server)
                    order_id VARCHAR(50) NOT NULL,
                    technician VARCHAR(100) NOT NULL,
                    advisor VARCHAR(100),
                    vehicle_model VARCHAR(100) NOT NULL,
                    vehicle_year INTEGER NOT NULL,

                    -- Diagnosis
                    failures TEXT NOT NULL,
                    comments TEXT,

                    -- Stored artefacts
                    evidence_urls JSONB NOT NULL DEFAULT '[]'::jsonb,
                    report_url VARCHAR(1000) NOT NULL,

                    -- Open set: no CHECK constraint
                    status VARCHAR(20) NOT NULL DEFAULT 'pending',

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for order lookup
                CREATE INDEX idx_service_orders_order_id ON service_orders(order_id);

                -- Index for chronological listing
                CREATE INDEX idx_service_orders_created_at ON service_orders(created_at DESC);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS service_orders CASCADE;")
            .await?;

        Ok(())
    }
}
