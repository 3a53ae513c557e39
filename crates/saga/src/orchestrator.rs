//! Order creation saga.

use std::future::Future;

use common::{ProductId, UserId};
use domain::{Aggregate, Order, OrderItem, OrderNumberGenerator};
use order_store::{OrderStore, StoreError};

use crate::aggregate::SagaInstance;
use crate::clients::{ReleaseOutcome, StockReservationClient, UserValidationClient};
use crate::config::SagaConfig;
use crate::error::CreateOrderError;
use crate::events::SagaEvent;
use crate::request::{CreateOrderRequest, OrderLineRequest};
use crate::services::{Catalog, UserDirectory};
use crate::steps::{Compensation, CreationStep};

/// Outcome of one saga run: the final saga state and the result.
#[derive(Debug)]
pub struct SagaOutcome {
    pub saga: SagaInstance,
    pub result: Result<Order, CreateOrderError>,
}

/// Creates orders as a saga with compensation.
///
/// Steps run in order: validate the buyer, validate every line against the
/// catalog, persist the pending order under a fresh order number, then reserve
/// stock line by line. A reservation failure releases the lines reserved so
/// far in reverse order and flags the persisted order for reconciliation.
pub struct OrderCreationOrchestrator<S, D, C>
where
    S: OrderStore,
    D: UserDirectory,
    C: Catalog,
{
    store: S,
    users: UserValidationClient<D>,
    stock: StockReservationClient<C>,
    numbers: OrderNumberGenerator,
    config: SagaConfig,
}

impl<S, D, C> OrderCreationOrchestrator<S, D, C>
where
    S: OrderStore,
    D: UserDirectory,
    C: Catalog,
{
    /// Creates a new orchestrator.
    pub fn new(store: S, directory: D, catalog: C, config: SagaConfig) -> Self {
        Self {
            store,
            users: UserValidationClient::new(directory, config.call_timeout),
            stock: StockReservationClient::new(catalog, &config),
            numbers: OrderNumberGenerator::new(),
            config,
        }
    }

    /// Creates an order and reserves its stock.
    ///
    /// Returns the persisted order in `Pending` status.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, CreateOrderError> {
        self.execute(request).await.result
    }

    /// Runs the saga and returns its final state along with the result.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, lines = request.items.len()))]
    pub async fn execute(&self, request: CreateOrderRequest) -> SagaOutcome {
        let started = std::time::Instant::now();
        let mut saga = SagaInstance::default();

        let result = match request.validate() {
            Ok(()) => {
                saga.apply(SagaEvent::saga_started(request.user_id));
                self.run(&mut saga, &request).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(order) => {
                saga.apply(SagaEvent::saga_completed());
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = ?order.id(),
                    order_number = ?order.order_number().map(|n| n.as_str()),
                    total = %order.total_amount(),
                    saga_state = %saga.state(),
                    "order created"
                );
            }
            Err(e) => {
                if saga.state().can_compensate() {
                    self.compensate(&mut saga).await;
                }
                if saga.saga_id().is_some() {
                    saga.apply(SagaEvent::saga_failed(e.to_string()));
                }
                metrics::counter!("order_creation_failed_total", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(
                    kind = %e.kind(),
                    saga_state = %saga.state(),
                    compensated = saga.released().len(),
                    error = %e,
                    "order creation failed"
                );
            }
        }

        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        SagaOutcome { saga, result }
    }

    async fn run(
        &self,
        saga: &mut SagaInstance,
        request: &CreateOrderRequest,
    ) -> Result<Order, CreateOrderError> {
        let user = self
            .step(
                saga,
                CreationStep::ValidateUser,
                self.users.validate(request.user_id),
            )
            .await?;

        let items = self
            .step(
                saga,
                CreationStep::ValidateItems,
                self.build_items(&request.items),
            )
            .await?;

        let mut order = self
            .step(
                saga,
                CreationStep::PersistOrder,
                self.persist(request, user.id, items),
            )
            .await?;
        if let (Some(id), Some(number)) = (order.id(), order.order_number()) {
            saga.apply(SagaEvent::order_persisted(id, number.clone()));
        }

        saga.apply(SagaEvent::step_started(CreationStep::ReserveStock));
        if let Err((product_id, error)) = self.reserve_all(saga, &order).await {
            saga.apply(SagaEvent::step_failed(
                CreationStep::ReserveStock,
                error.to_string(),
            ));
            self.compensate(saga).await;
            self.flag_for_reconciliation(saga, &mut order, product_id, &error)
                .await;
            return Err(error);
        }
        saga.apply(SagaEvent::step_completed(CreationStep::ReserveStock));

        Ok(order)
    }

    /// Runs one step, recording its start and outcome on the saga.
    async fn step<T, E>(
        &self,
        saga: &mut SagaInstance,
        step: CreationStep,
        work: impl Future<Output = Result<T, E>>,
    ) -> Result<T, CreateOrderError>
    where
        E: Into<CreateOrderError>,
    {
        tracing::debug!(step = step.as_str(), "saga step started");
        saga.apply(SagaEvent::step_started(step));

        match work.await.map_err(Into::into) {
            Ok(value) => {
                saga.apply(SagaEvent::step_completed(step));
                Ok(value)
            }
            Err(error) => {
                tracing::debug!(step = step.as_str(), %error, "saga step failed");
                saga.apply(SagaEvent::step_failed(step, error.to_string()));
                Err(error)
            }
        }
    }

    /// Builds order lines from catalog data, one line at a time.
    async fn build_items(
        &self,
        lines: &[OrderLineRequest],
    ) -> Result<Vec<OrderItem>, CreateOrderError> {
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            let product = self.stock.product(line.product_id).await?;

            if !product.active {
                return Err(CreateOrderError::ProductUnavailable {
                    product_id: line.product_id,
                    reason: "inactive".to_string(),
                });
            }
            if !product.available {
                return Err(CreateOrderError::ProductUnavailable {
                    product_id: line.product_id,
                    reason: "not available".to_string(),
                });
            }

            if !self
                .stock
                .check_availability(line.product_id, line.quantity)
                .await?
            {
                return Err(CreateOrderError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                });
            }

            let mut item = OrderItem::new(product.snapshot(), line.quantity, product.price);
            item.notes = line.notes.clone();
            items.push(item);
        }

        Ok(items)
    }

    /// Places the order under a fresh number and saves it.
    ///
    /// A number found in the store, or rejected by it as a duplicate, is
    /// replaced until `order_number_attempts` is exhausted.
    async fn persist(
        &self,
        request: &CreateOrderRequest,
        user_id: UserId,
        items: Vec<OrderItem>,
    ) -> Result<Order, CreateOrderError> {
        let attempts = self.config.order_number_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let number = self.numbers.generate();

            if !self.store.exists_by_number(&number).await? {
                let mut order = Order::default();
                let events = order
                    .place(number.clone(), user_id, request.details(), items.clone())
                    .map_err(|e| CreateOrderError::Validation(e.to_string()))?;
                order.apply_events(events);

                match self.store.save(&mut order).await {
                    Ok(_) => return Ok(order),
                    Err(StoreError::DuplicateOrderNumber(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }

            if attempt >= attempts {
                tracing::error!(%number, attempt, "no unique order number found");
                return Err(StoreError::DuplicateOrderNumber(number).into());
            }
            tracing::debug!(%number, attempt, "order number taken, regenerating");
        }
    }

    /// Reserves every line in order, pushing a compensation for each success.
    async fn reserve_all(
        &self,
        saga: &mut SagaInstance,
        order: &Order,
    ) -> Result<(), (ProductId, CreateOrderError)> {
        for item in order.items() {
            let product_id = item.product_id();
            match self.stock.reserve(product_id, item.quantity).await {
                Ok(()) => saga.apply(SagaEvent::stock_reserved(product_id, item.quantity)),
                Err(e) => return Err((product_id, e.into())),
            }
        }
        Ok(())
    }

    /// Pops and runs pending compensations, most recent first.
    async fn compensate(&self, saga: &mut SagaInstance) {
        saga.apply(SagaEvent::compensation_started(saga.current_step()));

        let pending: Vec<Compensation> = saga.pending_compensations().to_vec();
        for compensation in pending.into_iter().rev() {
            match compensation {
                Compensation::ReleaseStock {
                    product_id,
                    quantity,
                } => match self.stock.release(product_id, quantity).await {
                    ReleaseOutcome::Released { .. } => {
                        saga.apply(SagaEvent::compensation_step_completed(compensation));
                    }
                    ReleaseOutcome::Failed { error, .. } => {
                        saga.apply(SagaEvent::compensation_step_failed(
                            compensation,
                            error.to_string(),
                        ));
                    }
                },
            }
        }
    }

    /// Records the failed reservation on the persisted order.
    ///
    /// A concurrent status change makes the save conflict; the order is then
    /// reloaded and flagged again, up to `flag_attempts` saves. Failures here
    /// are logged only; the reservation error is what the caller sees.
    async fn flag_for_reconciliation(
        &self,
        saga: &SagaInstance,
        order: &mut Order,
        product_id: ProductId,
        error: &CreateOrderError,
    ) {
        let attempts = self.config.flag_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let events = match order.flag_stock_reservation_failure(
                product_id,
                error.to_string(),
                saga.released().to_vec(),
                saga.unreleased().to_vec(),
            ) {
                Ok(events) => events,
                Err(e) => {
                    tracing::error!(order_id = ?order.id(), error = %e, "cannot flag order for reconciliation");
                    return;
                }
            };
            order.apply_events(events);

            match self.store.save(order).await {
                Ok(_) => {
                    metrics::counter!("orders_flagged_for_reconciliation_total").increment(1);
                    tracing::warn!(
                        order_id = ?order.id(),
                        %product_id,
                        status = %order.status(),
                        unreleased = ?saga.unreleased(),
                        "order flagged for reconciliation after failed stock reservation"
                    );
                    return;
                }
                Err(StoreError::ConcurrencyConflict { order_id, .. }) if attempt < attempts => {
                    tracing::debug!(%order_id, attempt, "order changed concurrently, reloading before flagging");
                    match self.store.find_by_id(order_id).await {
                        Ok(Some(fresh)) => *order = fresh,
                        Ok(None) => {
                            tracing::error!(%order_id, "order vanished before reconciliation flag");
                            return;
                        }
                        Err(e) => {
                            tracing::error!(%order_id, error = %e, "failed to reload order for reconciliation flag");
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        order_id = ?order.id(),
                        %product_id,
                        attempt,
                        error = %e,
                        "failed to persist reconciliation flag"
                    );
                    return;
                }
            }
        }
    }
}
