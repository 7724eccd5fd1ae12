//! End-to-end pipeline scenarios over the in-memory store and broker.
//!
//! Each test publishes an order-initialization message to the fan-out
//! topic, pumps the five worker runners until every queue drains, and then
//! inspects the durable state.

use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, ProductId, TransactionId};
use document_store::{DocumentStore, InMemoryDocumentStore};
use domain::{
    AddressData, CustomerData, INITIALIZE_ORDER_SUBJECT, InitializeOrder, Lead, LeadDirectory,
    Money, Order, OrderItemRequest, OrderRepository, OrderStatus, PaymentData, PaymentStatus,
    Product, ProductCatalog, StockEntry, StockLedger, StockOperation, StockUpdate,
    TransactionRepository,
};
use message_bus::{InMemoryMessageBus, MessageBus, MessageEnvelope};
use workers::{
    GatewayOutcome, LeadWorker, OrderWorker, PaymentGateway, PaymentWorker, PipelineConfig,
    RunnerSettings, StockReaper, StockWorker, UpdateWorker, WorkerRunner,
};

/// Deterministic gateway for scenario tests: approves everything except
/// card numbers with the declined suffix.
#[derive(Clone)]
struct ScriptedGateway;

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(&self, _amount: Money, card_number: &str) -> GatewayOutcome {
        if card_number.ends_with("0000") {
            GatewayOutcome::Declined {
                reason: "Card declined by issuer".to_string(),
            }
        } else {
            GatewayOutcome::Approved {
                auth_code: "AUTH-E2E001".to_string(),
            }
        }
    }
}

struct Pipeline {
    store: InMemoryDocumentStore,
    bus: InMemoryMessageBus,
    config: PipelineConfig,
    lead: WorkerRunner<LeadWorker<InMemoryDocumentStore>, InMemoryMessageBus>,
    order: WorkerRunner<OrderWorker<InMemoryDocumentStore, InMemoryMessageBus>, InMemoryMessageBus>,
    stock: WorkerRunner<StockWorker<InMemoryDocumentStore>, InMemoryMessageBus>,
    payment: WorkerRunner<
        PaymentWorker<InMemoryDocumentStore, InMemoryMessageBus, ScriptedGateway>,
        InMemoryMessageBus,
    >,
    update: WorkerRunner<UpdateWorker<InMemoryDocumentStore>, InMemoryMessageBus>,
}

impl Pipeline {
    async fn new() -> Self {
        let store = InMemoryDocumentStore::new();
        let bus = InMemoryMessageBus::new();
        let config = PipelineConfig::local();

        bus.subscribe(&config.initialize_topic, &config.lead_queue).await;
        bus.subscribe(&config.initialize_topic, &config.order_queue).await;

        let settings = RunnerSettings {
            batch_size: 10,
            record_timeout: Duration::from_secs(5),
            max_receive_count: 3,
            poll_interval: Duration::from_millis(10),
        };

        let lead = WorkerRunner::new(
            LeadWorker::new(store.clone(), &config),
            bus.clone(),
            config.lead_queue.clone(),
            settings,
        );
        let order = WorkerRunner::new(
            OrderWorker::new(store.clone(), bus.clone(), &config),
            bus.clone(),
            config.order_queue.clone(),
            settings,
        );
        let stock = WorkerRunner::new(
            StockWorker::new(store.clone(), &config),
            bus.clone(),
            config.stock_queue.clone(),
            settings,
        );
        let payment = WorkerRunner::new(
            PaymentWorker::new(store.clone(), bus.clone(), ScriptedGateway, &config),
            bus.clone(),
            config.payment_queue.clone(),
            settings,
        );
        let update = WorkerRunner::new(
            UpdateWorker::new(store.clone(), &config),
            bus.clone(),
            config.update_queue.clone(),
            settings,
        );

        Self {
            store,
            bus,
            config,
            lead,
            order,
            stock,
            payment,
            update,
        }
    }

    /// Pumps every runner until no queue (dead-letter queues aside) holds
    /// work, bounded to keep a broken pipeline from spinning forever.
    async fn drain(&self) {
        for _ in 0..25 {
            let mut seen = 0;
            seen += self.lead.run_once().await.unwrap().total();
            seen += self.order.run_once().await.unwrap().total();
            seen += self.stock.run_once().await.unwrap().total();
            seen += self.payment.run_once().await.unwrap().total();
            seen += self.update.run_once().await.unwrap().total();
            if seen == 0 {
                return;
            }
        }
        panic!("pipeline did not drain");
    }

    async fn seed_product(&self, id: &str, cents: i64, stock: u32) {
        ProductCatalog::new(self.store.clone(), self.config.product_table.clone())
            .add(&Product {
                id: ProductId::new(id),
                name: "Widget".to_string(),
                price: Money::from_cents(cents),
                description: String::new(),
                is_active: true,
                has_stock_control: true,
            })
            .await
            .unwrap();
        if stock > 0 {
            self.ledger()
                .append(&StockEntry::new(
                    ProductId::new(id),
                    StockOperation::Increase,
                    stock,
                    "Initial load",
                    None,
                ))
                .await
                .unwrap();
        }
    }

    async fn submit(&self, message: &InitializeOrder) {
        let envelope = MessageEnvelope::new(message)
            .unwrap()
            .with_subject(INITIALIZE_ORDER_SUBJECT);
        self.bus
            .publish(&self.config.initialize_topic, envelope)
            .await
            .unwrap();
    }

    fn orders(&self) -> OrderRepository<InMemoryDocumentStore> {
        OrderRepository::new(self.store.clone(), self.config.order_table.clone())
    }

    fn transactions(&self) -> TransactionRepository<InMemoryDocumentStore> {
        TransactionRepository::new(self.store.clone(), self.config.transaction_table.clone())
    }

    fn ledger(&self) -> StockLedger<InMemoryDocumentStore> {
        StockLedger::new(self.store.clone(), self.config.stock_table.clone())
    }

    async fn lead_for(&self, email: &str, cpf: &str) -> Option<Lead> {
        LeadDirectory::new(self.store.clone(), self.config.lead_table.clone())
            .find_by_identity(email, cpf)
            .await
            .unwrap()
    }

    async fn dead_letter_count(&self) -> usize {
        let mut total = 0;
        for queue in [
            &self.config.lead_queue,
            &self.config.order_queue,
            &self.config.stock_queue,
            &self.config.payment_queue,
            &self.config.update_queue,
        ] {
            total += self.bus.queue_len(&format!("{queue}-dlq")).await;
        }
        total
    }
}

fn submission(order_id: OrderId, card_number: &str, items: Vec<(&str, u32)>) -> InitializeOrder {
    InitializeOrder {
        order_id,
        customer_data: CustomerData {
            cpf: "12345678901".to_string(),
            email: "ana@example.com".to_string(),
            name: "Ana".to_string(),
        },
        payment_data: Some(PaymentData {
            card_number: card_number.to_string(),
            card_holder_name: "ANA SILVA".to_string(),
            expiry_month: "03".to_string(),
            expiry_year: "2030".to_string(),
            cvv: "123".to_string(),
        }),
        address_data: Some(AddressData {
            street: "Rua A".to_string(),
            number: "10".to_string(),
            complement: None,
            neighborhood: "Centro".to_string(),
            city: "Sao Paulo".to_string(),
            state: "SP".to_string(),
            zip_code: "01234-567".to_string(),
            country: "BR".to_string(),
        }),
        items: items
            .into_iter()
            .map(|(id, quantity)| OrderItemRequest {
                id: ProductId::new(id),
                quantity,
            })
            .collect(),
    }
}

#[tokio::test]
async fn happy_path_processes_the_order() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 100).await;

    let order_id = OrderId::new();
    pipeline
        .submit(&submission(order_id, "4111111111111111", vec![("p1", 2)]))
        .await;
    pipeline.drain().await;

    // Order reached the approved terminal state with the right totals.
    let order = pipeline.orders().get(order_id).await.unwrap().unwrap();
    assert_eq!(order.total_items, 2);
    assert_eq!(order.total_value.cents(), 5998);
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(
        order.transaction_id.as_ref().unwrap(),
        &TransactionId::for_order(order_id)
    );

    // The transaction is approved with a masked card.
    let transaction = pipeline
        .transactions()
        .get(&TransactionId::for_order(order_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.payment_status, PaymentStatus::Approved);
    assert!(transaction.auth_code.is_some());
    assert_eq!(transaction.card_data.card_number, "****-****-****-1111");

    // The ledger gained exactly one DECREASE of 2.
    assert_eq!(
        pipeline
            .ledger()
            .current_stock(&ProductId::new("p1"))
            .await
            .unwrap(),
        98
    );
    let decreases: Vec<_> = pipeline
        .ledger()
        .all()
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.operation == StockOperation::Decrease)
        .collect();
    assert_eq!(decreases.len(), 1);
    assert_eq!(decreases[0].order_id, Some(order_id));

    // Lead was deduplicated into existence.
    assert!(
        pipeline
            .lead_for("ana@example.com", "12345678901")
            .await
            .is_some()
    );
    assert_eq!(pipeline.dead_letter_count().await, 0);
}

#[tokio::test]
async fn declined_suffix_cancels_the_order() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 100).await;

    let order_id = OrderId::new();
    pipeline
        .submit(&submission(order_id, "4111111111110000", vec![("p1", 2)]))
        .await;
    pipeline.drain().await;

    let order = pipeline.orders().get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.reason.unwrap().starts_with("Payment declined"));

    let transaction = pipeline
        .transactions()
        .get(&TransactionId::for_order(order_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.payment_status, PaymentStatus::Declined);

    // The reservation stands even though the order was cancelled.
    assert_eq!(
        pipeline
            .ledger()
            .current_stock(&ProductId::new("p1"))
            .await
            .unwrap(),
        98
    );
}

#[tokio::test]
async fn insufficient_stock_leaves_no_trace() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 2).await;

    let order_id = OrderId::new();
    pipeline
        .submit(&submission(order_id, "4111111111111111", vec![("p1", 10)]))
        .await;
    pipeline.drain().await;

    assert!(pipeline.orders().get(order_id).await.unwrap().is_none());
    assert!(
        pipeline
            .transactions()
            .get(&TransactionId::for_order(order_id))
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(
        pipeline
            .ledger()
            .current_stock(&ProductId::new("p1"))
            .await
            .unwrap(),
        2
    );
    // The failed record went to the order queue's dead-letter queue.
    assert_eq!(
        pipeline
            .bus
            .queue_len(&format!("{}-dlq", pipeline.config.order_queue))
            .await,
        1
    );
}

#[tokio::test]
async fn concurrent_duplicate_identities_converge() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 100).await;

    let first = OrderId::new();
    let second = OrderId::new();
    // Two submissions with the same (email, cpf) arrive back to back.
    pipeline
        .submit(&submission(first, "4111111111111111", vec![("p1", 1)]))
        .await;
    pipeline
        .submit(&submission(second, "4111111111111111", vec![("p1", 1)]))
        .await;
    pipeline.drain().await;

    // At least one lead with the identity; both orders reference a lead
    // carrying that identity.
    let lead = pipeline
        .lead_for("ana@example.com", "12345678901")
        .await
        .expect("lead must exist");
    assert_eq!(pipeline.store.document_count("leads").await, 1);

    for order_id in [first, second] {
        let order = pipeline.orders().get(order_id).await.unwrap().unwrap();
        assert_eq!(order.lead_id, lead.id);
        assert_eq!(order.customer_data.email, "ana@example.com");
    }
}

#[tokio::test]
async fn invalid_transition_is_rejected_and_dead_lettered() {
    let pipeline = Pipeline::new().await;

    // An order already in CANCELLED.
    let order = Order::create(
        OrderId::new(),
        common::LeadId::new(),
        CustomerData {
            cpf: "12345678901".to_string(),
            email: "ana@example.com".to_string(),
            name: "Ana".to_string(),
        },
        Vec::new(),
        None,
    );
    pipeline.orders().insert_new(&order).await.unwrap();
    pipeline
        .orders()
        .apply_status_update(order.id, OrderStatus::Cancelled, None, None)
        .await
        .unwrap();

    // Inject a PROCESSED update for it.
    let update = domain::UpdateOrder {
        order_id: order.id,
        status: OrderStatus::Processed,
        reason: None,
        transaction_id: None,
    };
    pipeline
        .bus
        .send(
            &pipeline.config.update_queue,
            MessageEnvelope::new(&update).unwrap(),
        )
        .await
        .unwrap();
    pipeline.drain().await;

    let loaded = pipeline.orders().get(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Cancelled);
    assert_eq!(
        pipeline
            .bus
            .queue_len(&format!("{}-dlq", pipeline.config.update_queue))
            .await,
        1
    );
}

#[tokio::test]
async fn replaying_a_completed_order_is_a_noop() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 100).await;

    let order_id = OrderId::new();
    let message = submission(order_id, "4111111111111111", vec![("p1", 2)]);
    pipeline.submit(&message).await;
    pipeline.drain().await;

    let order = pipeline.orders().get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processed);

    // Replay the same INITIALIZE message after completion.
    pipeline.submit(&message).await;
    pipeline.drain().await;

    // Still exactly one order row, one transaction, and the terminal state.
    let order = pipeline.orders().get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(
        pipeline
            .store
            .document_count(&pipeline.config.transaction_table)
            .await,
        1
    );
    assert_eq!(pipeline.dead_letter_count().await, 0);

    // The replay did publish another reservation (ledger idempotency is
    // not guaranteed); the order row itself was untouched.
    assert_eq!(
        pipeline
            .ledger()
            .current_stock(&ProductId::new("p1"))
            .await
            .unwrap(),
        96
    );
}

#[tokio::test]
async fn orphaned_reservation_is_reconciled_by_the_reaper() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 10).await;

    // A reservation whose order never materialized (Phase C/D failure
    // after a successful Phase B publish).
    let ghost_order = OrderId::new();
    let reservation = StockUpdate {
        product_id: ProductId::new("p1"),
        quantity: 4,
        operation: StockOperation::Decrease,
        order_id: Some(ghost_order),
        reason: "Order sale".to_string(),
    };
    pipeline
        .bus
        .send(
            &pipeline.config.stock_queue,
            MessageEnvelope::new(&reservation).unwrap(),
        )
        .await
        .unwrap();
    pipeline.drain().await;
    assert_eq!(
        pipeline
            .ledger()
            .current_stock(&ProductId::new("p1"))
            .await
            .unwrap(),
        6
    );

    let mut config = pipeline.config.clone();
    config.reaper_grace = Duration::ZERO;
    let reaper = StockReaper::new(pipeline.store.clone(), pipeline.bus.clone(), &config);

    let outcome = reaper.sweep().await.unwrap();
    assert_eq!(outcome.released, 1);
    pipeline.drain().await;

    // Stock is restored and a second sweep finds nothing to do.
    assert_eq!(
        pipeline
            .ledger()
            .current_stock(&ProductId::new("p1"))
            .await
            .unwrap(),
        10
    );
    assert_eq!(reaper.sweep().await.unwrap().released, 0);
}

#[tokio::test]
async fn no_persisted_transaction_carries_raw_card_data() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 100).await;

    for card in ["4111111111111111", "5500000000000000"] {
        pipeline
            .submit(&submission(OrderId::new(), card, vec![("p1", 1)]))
            .await;
    }
    pipeline.drain().await;

    let documents = pipeline
        .store
        .scan(&pipeline.config.transaction_table)
        .await
        .unwrap();
    assert_eq!(documents.len(), 2);
    for document in documents {
        let raw = document.to_string();
        assert!(!raw.contains("4111111111111111"));
        assert!(!raw.contains("5500000000000000"));
        assert!(!raw.contains("12345678901"));
        assert_eq!(document["cardData"]["cvv"], "***");
    }
}

#[tokio::test]
async fn transient_store_outage_redelivers_and_recovers() {
    let pipeline = Pipeline::new().await;
    pipeline.seed_product("p1", 2999, 100).await;

    let order_id = OrderId::new();
    pipeline
        .submit(&submission(order_id, "4111111111111111", vec![("p1", 2)]))
        .await;

    // First pass against a dead store: both INITIALIZE consumers surrender
    // their record.
    pipeline.store.set_unavailable(true);
    let lead_outcome = pipeline.lead.run_once().await.unwrap();
    let order_outcome = pipeline.order.run_once().await.unwrap();
    assert_eq!(lead_outcome.redelivered, 1);
    assert_eq!(order_outcome.redelivered, 1);

    // Store recovers; the pipeline completes normally.
    pipeline.store.set_unavailable(false);
    pipeline.drain().await;

    let order = pipeline.orders().get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(pipeline.dead_letter_count().await, 0);
}
