//! Service order entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "service_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Identification
    pub order_id: String,
    pub technician: String,
    pub advisor: Option<String>,
    pub vehicle_model: String,
    pub vehicle_year: i32,

    // Diagnosis
    #[sea_orm(column_type = "Text")]
    pub failures: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    // Stored artefacts
    #[sea_orm(column_type = "JsonBinary")]
    pub evidence_urls: JsonValue,
    pub report_url: String,

    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
