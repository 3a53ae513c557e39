//! Saga instance aggregate.

use common::{OrderId, ProductId, UserId};
use domain::{Aggregate, OrderNumber};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::SagaEvent;
use crate::state::SagaState;
use crate::steps::{Compensation, CreationStep};

/// State of one order creation run.
///
/// Tracks completed steps and the compensation stack. Every successful
/// reservation pushes a compensation; compensations are popped in reverse
/// order when the saga fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaInstance {
    saga_id: Option<Uuid>,
    user_id: Option<UserId>,
    state: SagaState,
    current_step: Option<CreationStep>,
    completed_steps: Vec<CreationStep>,
    order_id: Option<OrderId>,
    order_number: Option<OrderNumber>,
    /// Pending compensations, most recent last.
    compensations: Vec<Compensation>,
    released: Vec<ProductId>,
    unreleased: Vec<ProductId>,
    failure_reason: Option<String>,
}

impl Aggregate for SagaInstance {
    type Event = SagaEvent;

    fn aggregate_type() -> &'static str {
        "OrderCreationSaga"
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.saga_id = Some(data.saga_id);
                self.user_id = Some(data.user_id);
                self.state = SagaState::Running;
            }
            SagaEvent::StepStarted(data) => {
                self.current_step = Some(data.step);
            }
            SagaEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step);
            }
            SagaEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error);
            }
            SagaEvent::OrderPersisted(data) => {
                self.order_id = Some(data.order_id);
                self.order_number = Some(data.order_number);
            }
            SagaEvent::StockReserved(data) => {
                self.compensations.push(Compensation::ReleaseStock {
                    product_id: data.product_id,
                    quantity: data.quantity,
                });
            }
            SagaEvent::CompensationStarted(_) => {
                self.state = SagaState::Compensating;
            }
            SagaEvent::CompensationStepCompleted(data) => {
                self.remove_compensation(&data.compensation);
                self.released.push(data.compensation.product_id());
            }
            SagaEvent::CompensationStepFailed(data) => {
                self.remove_compensation(&data.compensation);
                self.unreleased.push(data.compensation.product_id());
            }
            SagaEvent::SagaCompleted(_) => {
                self.state = SagaState::Completed;
                self.current_step = None;
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason.get_or_insert(data.reason);
            }
        }
    }
}

impl SagaInstance {
    fn remove_compensation(&mut self, compensation: &Compensation) {
        if let Some(index) = self.compensations.iter().rposition(|c| c == compensation) {
            self.compensations.remove(index);
        }
    }
}

// Query methods
impl SagaInstance {
    pub fn saga_id(&self) -> Option<Uuid> {
        self.saga_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Returns the step that was started last, until the saga completes.
    pub fn current_step(&self) -> Option<CreationStep> {
        self.current_step
    }

    pub fn completed_steps(&self) -> &[CreationStep] {
        &self.completed_steps
    }

    /// Returns the persisted order, if the saga got that far.
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    /// Returns the compensations still to run, most recent last.
    pub fn pending_compensations(&self) -> &[Compensation] {
        &self.compensations
    }

    /// Returns products whose reservation was released during compensation.
    pub fn released(&self) -> &[ProductId] {
        &self.released
    }

    /// Returns products whose release failed during compensation.
    pub fn unreleased(&self) -> &[ProductId] {
        &self.unreleased
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve(product: i64, quantity: u32) -> SagaEvent {
        SagaEvent::stock_reserved(ProductId::new(product), quantity)
    }

    fn release(product: i64, quantity: u32) -> Compensation {
        Compensation::ReleaseStock {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_default_saga_instance() {
        let saga = SagaInstance::default();
        assert!(saga.saga_id().is_none());
        assert_eq!(saga.state(), SagaState::NotStarted);
        assert!(saga.completed_steps().is_empty());
    }

    #[test]
    fn test_happy_path() {
        let mut saga = SagaInstance::default();
        saga.apply(SagaEvent::saga_started(UserId::new(1)));
        assert_eq!(saga.state(), SagaState::Running);

        for step in CreationStep::ALL {
            saga.apply(SagaEvent::step_started(step));
            if step == CreationStep::PersistOrder {
                saga.apply(SagaEvent::order_persisted(
                    OrderId::new(5),
                    OrderNumber::new("ORD202610191432ABCDE"),
                ));
            }
            if step == CreationStep::ReserveStock {
                saga.apply(reserve(1, 2));
            }
            saga.apply(SagaEvent::step_completed(step));
        }
        saga.apply(SagaEvent::saga_completed());

        assert_eq!(saga.state(), SagaState::Completed);
        assert_eq!(saga.completed_steps(), &CreationStep::ALL);
        assert_eq!(saga.order_id(), Some(OrderId::new(5)));
        assert_eq!(saga.current_step(), None);
    }

    #[test]
    fn test_compensation_stack_unwinds() {
        let mut saga = SagaInstance::default();
        saga.apply(SagaEvent::saga_started(UserId::new(1)));
        saga.apply(SagaEvent::step_started(CreationStep::ReserveStock));
        saga.apply(reserve(1, 2));
        saga.apply(reserve(2, 1));
        assert_eq!(saga.pending_compensations(), &[release(1, 2), release(2, 1)]);

        saga.apply(SagaEvent::step_failed(
            CreationStep::ReserveStock,
            "insufficient stock",
        ));
        saga.apply(SagaEvent::compensation_started(saga.current_step()));
        assert_eq!(saga.state(), SagaState::Compensating);

        saga.apply(SagaEvent::compensation_step_completed(release(2, 1)));
        saga.apply(SagaEvent::compensation_step_failed(release(1, 2), "timeout"));
        saga.apply(SagaEvent::saga_failed("insufficient stock for product 3"));

        assert_eq!(saga.state(), SagaState::Failed);
        assert!(saga.pending_compensations().is_empty());
        assert_eq!(saga.released(), &[ProductId::new(2)]);
        assert_eq!(saga.unreleased(), &[ProductId::new(1)]);
        assert_eq!(saga.failure_reason(), Some("insufficient stock"));
    }
}
