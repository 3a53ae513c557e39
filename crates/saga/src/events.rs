//! Saga domain events.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{DomainEvent, OrderNumber};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::steps::{Compensation, CreationStep};

/// Events that can occur during saga execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A saga step started execution.
    StepStarted(StepData),

    /// A saga step completed successfully.
    StepCompleted(StepData),

    /// A saga step failed.
    StepFailed(StepFailedData),

    /// The pending order was written to the store.
    OrderPersisted(OrderPersistedData),

    /// Stock for one line was reserved; pushes a compensation.
    StockReserved(StockReservedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationStartedData),

    /// A compensation ran successfully.
    CompensationStepCompleted(CompensationData),

    /// A compensation failed (logged, compensation continues).
    CompensationStepFailed(CompensationFailedData),

    /// Saga completed successfully.
    SagaCompleted(SagaCompletedData),

    /// Saga failed after compensation.
    SagaFailed(SagaFailedData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::OrderPersisted(_) => "OrderPersisted",
            SagaEvent::StockReserved(_) => "StockReserved",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: Uuid,
    /// The buyer the order is created for.
    pub user_id: UserId,
    pub saga_type: String,
    pub started_at: DateTime<Utc>,
}

/// Data for step started/completed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    pub step: CreationStep,
}

/// Data for StepFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step: CreationStep,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for OrderPersisted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPersistedData {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
}

/// Data for StockReserved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReservedData {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationStartedData {
    /// The step that triggered compensation.
    pub from_step: Option<CreationStep>,
}

/// Data for CompensationStepCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    pub compensation: Compensation,
}

/// Data for CompensationStepFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationFailedData {
    pub compensation: Compensation,
    pub error: String,
}

/// Data for SagaCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompletedData {
    pub completed_at: DateTime<Utc>,
}

/// Data for SagaFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(user_id: UserId) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id: Uuid::new_v4(),
            user_id,
            saga_type: crate::steps::SAGA_TYPE.to_string(),
            started_at: Utc::now(),
        })
    }

    pub fn step_started(step: CreationStep) -> Self {
        SagaEvent::StepStarted(StepData { step })
    }

    pub fn step_completed(step: CreationStep) -> Self {
        SagaEvent::StepCompleted(StepData { step })
    }

    pub fn step_failed(step: CreationStep, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step,
            error: error.into(),
        })
    }

    pub fn order_persisted(order_id: OrderId, order_number: OrderNumber) -> Self {
        SagaEvent::OrderPersisted(OrderPersistedData {
            order_id,
            order_number,
        })
    }

    pub fn stock_reserved(product_id: ProductId, quantity: u32) -> Self {
        SagaEvent::StockReserved(StockReservedData {
            product_id,
            quantity,
        })
    }

    pub fn compensation_started(from_step: Option<CreationStep>) -> Self {
        SagaEvent::CompensationStarted(CompensationStartedData { from_step })
    }

    pub fn compensation_step_completed(compensation: Compensation) -> Self {
        SagaEvent::CompensationStepCompleted(CompensationData { compensation })
    }

    pub fn compensation_step_failed(compensation: Compensation, error: impl Into<String>) -> Self {
        SagaEvent::CompensationStepFailed(CompensationFailedData {
            compensation,
            error: error.into(),
        })
    }

    pub fn saga_completed() -> Self {
        SagaEvent::SagaCompleted(SagaCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_keeps_step_names() {
        let event = SagaEvent::step_failed(CreationStep::ReserveStock, "insufficient stock");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "StepFailed");
        assert_eq!(json["data"]["step"], "reserve_stock");
        assert_eq!(json["data"]["error"], "insufficient stock");
    }

    #[test]
    fn test_compensation_serialization() {
        let event = SagaEvent::compensation_step_completed(Compensation::ReleaseStock {
            product_id: ProductId::new(4),
            quantity: 2,
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: SagaEvent = serde_json::from_str(&json).unwrap();

        let SagaEvent::CompensationStepCompleted(data) = deserialized else {
            panic!("Expected CompensationStepCompleted event");
        };
        assert_eq!(data.compensation.product_id(), ProductId::new(4));
        assert_eq!(event.event_type(), "CompensationStepCompleted");
    }
}
