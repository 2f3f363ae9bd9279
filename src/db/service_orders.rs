//! Database queries for service orders.

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

use crate::entity::service_order::{self, ActiveModel, Entity as ServiceOrder};
use crate::error::{AppError, AppResult};
use crate::models::{OrderStatus, ServiceOrderRecord};

use super::{DbPool, ServiceOrderRepository};

#[async_trait]
impl ServiceOrderRepository for DbPool {
    async fn ping(&self) -> AppResult<()> {
        self.connection()
            .ping()
            .await
            .map_err(|e| AppError::Database(format!("Failed to ping database: {}", e)))
    }

    async fn insert_service_order(
        &self,
        record: ServiceOrderRecord,
    ) -> AppResult<ServiceOrderRecord> {
        let model = active_model_for(&record)?;

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert service order: {}", e)))?;

        record_from_model(result)
    }

    async fn get_service_order(&self, id: Uuid) -> AppResult<Option<ServiceOrderRecord>> {
        let result = ServiceOrder::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get service order: {}", e)))?;

        result.map(record_from_model).transpose()
    }
}

fn active_model_for(record: &ServiceOrderRecord) -> AppResult<ActiveModel> {
    let evidence_urls = serde_json::to_value(&record.evidence_urls)
        .map_err(|e| AppError::Database(format!("Failed to encode evidence URLs: {}", e)))?;

    Ok(ActiveModel {
        id: Set(record.id),
        order_id: Set(record.order_id.clone()),
        technician: Set(record.technician.clone()),
        advisor: Set(record.advisor.clone()),
        vehicle_model: Set(record.vehicle_model.clone()),
        vehicle_year: Set(record.vehicle_year),
        failures: Set(record.failures.clone()),
        comments: Set(record.comments.clone()),
        evidence_urls: Set(evidence_urls),
        report_url: Set(record.report_url.clone()),
        status: Set(record.status.as_str().to_string()),
        created_at: Set(record.created_at),
    })
}

fn record_from_model(model: service_order::Model) -> AppResult<ServiceOrderRecord> {
    let evidence_urls: Vec<String> = serde_json::from_value(model.evidence_urls)
        .map_err(|e| AppError::Database(format!("Failed to decode evidence URLs: {}", e)))?;

    let status = OrderStatus::from(model.status);

    Ok(ServiceOrderRecord {
        id: model.id,
        order_id: model.order_id,
        technician: model.technician,
        advisor: model.advisor,
        vehicle_model: model.vehicle_model,
        vehicle_year: model.vehicle_year,
        failures: model.failures,
        comments: model.comments,
        evidence_urls,
        report_url: model.report_url,
        status,
        created_at: model.created_at,
    })
}
