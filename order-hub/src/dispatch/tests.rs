use super::*;
use crate::db::MemoryStore;
use crate::live::Outbound;
use crate::test_support::*;
use shared::error::ErrorCode;
use tokio::sync::mpsc;

struct Harness {
    store: Arc<MemoryStore>,
    dispatcher: OrderEventDispatcher,
}

struct Client {
    conn: ConnectionId,
    rx: mpsc::Receiver<Outbound>,
}

impl Client {
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(e) = self.rx.try_recv() {
            out.push((*e).clone());
        }
        out
    }

    fn names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerEvent::name).collect()
    }
}

impl Harness {
    fn new() -> Self {
        Self::with_routing(RoutingConfig::default())
    }

    fn with_routing(routing: RoutingConfig) -> Self {
        let store = seeded_store();
        let registry = SessionRegistry::new();
        let dispatcher = OrderEventDispatcher::new(
            store.clone(),
            OrderManager::new(store.clone(), "EUR"),
            registry.clone(),
            NotificationService::new(store.clone(), registry),
            routing,
        );
        Self { store, dispatcher }
    }

    fn connect(&self) -> Client {
        self.connect_with_capacity(32)
    }

    fn connect_with_capacity(&self, capacity: usize) -> Client {
        let (tx, rx) = mpsc::channel(capacity);
        Client {
            conn: self.dispatcher.registry().connect(tx),
            rx,
        }
    }

    async fn send(&self, client: &Client, intent: ClientIntent) {
        self.dispatcher.dispatch(client.conn, intent).await;
    }

    async fn staff(&self, restaurant: &str) -> Client {
        let mut c = self.connect();
        self.send(
            &c,
            ClientIntent::JoinRestaurant {
                restaurant_id: restaurant.into(),
            },
        )
        .await;
        assert_eq!(c.names(), vec!["joined_restaurant"]);
        c
    }

    async fn diner(&self, qr: &str) -> Client {
        let mut c = self.connect();
        self.send(
            &c,
            ClientIntent::JoinTable {
                qr_code_id: qr.into(),
            },
        )
        .await;
        assert_eq!(c.names(), vec!["joined_table"]);
        c
    }

    async fn create(&self, client: &mut Client, req: CreateOrderRequest) -> Order {
        self.send(client, ClientIntent::CreateOrder(req)).await;
        match client.drain().pop() {
            Some(ServerEvent::OrderCreated { order }) => *order,
            other => panic!("expected order_created, got {other:?}"),
        }
    }

    async fn update(&self, client: &Client, order_id: &str, status: OrderStatus) {
        self.send(
            client,
            ClientIntent::UpdateOrderStatus {
                order_id: order_id.into(),
                status,
                restaurant_id: "r1".into(),
            },
        )
        .await;
    }
}

fn error_code(events: &[ServerEvent]) -> Option<ErrorCode> {
    match events {
        [ServerEvent::Error { code, .. }] => Some(*code),
        _ => None,
    }
}

// ========================================================================
// Joins
// ========================================================================

#[tokio::test]
async fn test_join_table_replies_with_table_number() {
    let h = Harness::new();
    let mut c = h.connect();
    h.send(
        &c,
        ClientIntent::JoinTable {
            qr_code_id: "qr-2".into(),
        },
    )
    .await;
    assert_eq!(
        c.drain(),
        vec![ServerEvent::JoinedTable {
            qr_code_id: "qr-2".into(),
            table_number: "2".into()
        }]
    );
    assert!(
        h.dispatcher
            .registry()
            .is_member(c.conn, &AudienceKey::table("qr-2"))
    );
}

#[tokio::test]
async fn test_join_unknown_audiences_rejected() {
    let h = Harness::new();
    let mut c = h.connect();

    for intent in [
        ClientIntent::JoinRestaurant {
            restaurant_id: "nope".into(),
        },
        ClientIntent::JoinTable {
            qr_code_id: "qr-9".into(), // inactive
        },
        ClientIntent::JoinTable {
            qr_code_id: "missing".into(),
        },
        ClientIntent::JoinAdmin {
            admin_id: "mallory".into(),
        },
    ] {
        h.send(&c, intent).await;
        assert_eq!(error_code(&c.drain()), Some(ErrorCode::AudienceNotFound));
    }
    assert!(h.dispatcher.registry().joined_keys(c.conn).is_empty());
}

#[tokio::test]
async fn test_leave_intents_are_silent() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    h.send(
        &staff,
        ClientIntent::LeaveRestaurant {
            restaurant_id: "r1".into(),
        },
    )
    .await;
    assert!(staff.drain().is_empty());
    assert!(h.dispatcher.registry().joined_keys(staff.conn).is_empty());

    let mut admin = h.connect();
    h.send(
        &admin,
        ClientIntent::JoinAdmin {
            admin_id: "a1".into(),
        },
    )
    .await;
    h.send(
        &admin,
        ClientIntent::LeaveAdmin {
            admin_id: "a1".into(),
        },
    )
    .await;
    assert_eq!(admin.names(), vec!["joined_admin"]);
    assert!(h.dispatcher.registry().joined_keys(admin.conn).is_empty());
}

// ========================================================================
// create_order
// ========================================================================

#[tokio::test]
async fn test_create_order_reply_and_restaurant_broadcast_only() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut other_staff = h.staff("r2").await;
    let mut diner = h.diner("qr-1").await;

    h.send(
        &diner,
        ClientIntent::CreateOrder(dine_in("r1", "1", vec![large(item("pizza", 3))])),
    )
    .await;

    let reply = diner.drain();
    assert_eq!(reply.len(), 1, "diner gets exactly one direct reply");
    let ServerEvent::OrderCreated { order } = &reply[0] else {
        panic!("expected order_created, got {reply:?}");
    };
    assert_eq!(order.total_price, dec("33.00"));

    let staff_events = staff.drain();
    assert_eq!(staff_events.len(), 1);
    match &staff_events[0] {
        ServerEvent::NewOrder { order: o, message } => {
            assert_eq!(o.id, order.id);
            assert_eq!(message, "New order from table 1");
        }
        other => panic!("expected new_order, got {other:?}"),
    }
    assert!(other_staff.drain().is_empty());
}

#[tokio::test]
async fn test_create_order_failure_is_private() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut customer = h.connect();

    h.send(
        &customer,
        ClientIntent::CreateOrder(delivery("r1", None, vec![item("cola", 1)])),
    )
    .await;
    assert_eq!(
        error_code(&customer.drain()),
        Some(ErrorCode::MissingCustomerInfo)
    );

    h.send(
        &customer,
        ClientIntent::CreateOrder(dine_in("r1", "42", vec![item("cola", 1)])),
    )
    .await;
    assert_eq!(error_code(&customer.drain()), Some(ErrorCode::InvalidTable));

    h.send(
        &customer,
        ClientIntent::CreateOrder(dine_in("r1", "1", vec![item("ghost", 1)])),
    )
    .await;
    assert_eq!(error_code(&customer.drain()), Some(ErrorCode::ItemNotFound));

    assert!(staff.drain().is_empty());
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn test_storage_failure_is_retryable_and_not_broadcast() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut diner = h.diner("qr-1").await;

    h.store.fail_next_write();
    h.send(
        &diner,
        ClientIntent::CreateOrder(dine_in("r1", "1", vec![item("cola", 1)])),
    )
    .await;

    match diner.drain().as_slice() {
        [ServerEvent::Error {
            code, retryable, ..
        }] => {
            assert_eq!(*code, ErrorCode::DatabaseError);
            assert!(*retryable);
        }
        other => panic!("expected one error, got {other:?}"),
    }
    assert!(staff.drain().is_empty());
}

// ========================================================================
// update_order_status
// ========================================================================

#[tokio::test]
async fn test_dine_in_status_update_routing() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut diner = h.diner("qr-1").await;
    let mut neighbour = h.diner("qr-2").await;
    let mut other_staff = h.staff("r2").await;

    let order = h
        .create(&mut diner, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;
    staff.drain();

    h.update(&staff, &order.id, OrderStatus::Preparing).await;

    let staff_events = staff.drain();
    assert_eq!(
        staff_events[0],
        ServerEvent::OrderUpdateSuccess {
            order_id: order.id.clone(),
            status: OrderStatus::Preparing
        }
    );
    assert_eq!(
        staff_events.iter().map(ServerEvent::name).collect::<Vec<_>>(),
        vec!["order_update_success", "order_updated"]
    );

    match diner.drain().as_slice() {
        [ServerEvent::OrderStatusUpdate {
            order_id, status, ..
        }] => {
            assert_eq!(order_id, &order.id);
            assert_eq!(*status, OrderStatus::Preparing);
        }
        other => panic!("expected order_status_update, got {other:?}"),
    }
    assert!(neighbour.drain().is_empty());
    assert!(other_staff.drain().is_empty());
}

#[tokio::test]
async fn test_delivery_status_update_routing() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut diner = h.diner("qr-1").await;
    let mut customer = h.connect();

    let order = h
        .create(
            &mut customer,
            delivery("r1", Some("+34 600 111 222"), vec![item("cola", 1)]),
        )
        .await;
    h.send(
        &customer,
        ClientIntent::JoinOrder {
            order_id: order.id.clone(),
            customer_phone: "+34600111222".into(),
        },
    )
    .await;
    assert_eq!(customer.names(), vec!["joined_order"]);
    staff.drain();

    h.update(&staff, &order.id, OrderStatus::Preparing).await;

    assert_eq!(
        staff.names(),
        vec!["order_update_success", "order_updated", "order_status_update"]
    );
    assert_eq!(customer.names(), vec!["order_status_update"]);
    assert!(diner.drain().is_empty());
}

#[tokio::test]
async fn test_delivery_restaurant_broadcast_can_be_disabled() {
    let h = Harness::with_routing(RoutingConfig {
        delivery_status_to_restaurant: false,
    });
    let mut staff = h.staff("r1").await;
    let mut customer = h.connect();
    let order = h
        .create(&mut customer, delivery("r1", Some("600"), vec![item("cola", 1)]))
        .await;
    staff.drain();

    h.update(&staff, &order.id, OrderStatus::Cancelled).await;
    assert_eq!(staff.names(), vec!["order_update_success", "order_updated"]);
}

#[tokio::test]
async fn test_join_order_requires_matching_phone() {
    let h = Harness::new();
    let mut customer = h.connect();
    let order = h
        .create(&mut customer, delivery("r1", Some("600111222"), vec![item("cola", 1)]))
        .await;

    for phone in ["600999999", "", "   "] {
        h.send(
            &customer,
            ClientIntent::JoinOrder {
                order_id: order.id.clone(),
                customer_phone: phone.into(),
            },
        )
        .await;
        assert_eq!(
            error_code(&customer.drain()),
            Some(ErrorCode::AudienceNotFound)
        );
    }

    // Dine-in orders have no per-order audience
    let mut diner = h.diner("qr-1").await;
    let dine = h
        .create(&mut diner, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;
    h.send(
        &diner,
        ClientIntent::JoinOrder {
            order_id: dine.id,
            customer_phone: "600111222".into(),
        },
    )
    .await;
    assert_eq!(
        error_code(&diner.drain()),
        Some(ErrorCode::AudienceNotFound)
    );
}

#[tokio::test]
async fn test_skipping_status_is_rejected_without_broadcast() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut diner = h.diner("qr-1").await;
    let order = h
        .create(&mut diner, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;
    staff.drain();

    h.update(&staff, &order.id, OrderStatus::Ready).await;

    assert_eq!(
        error_code(&staff.drain()),
        Some(ErrorCode::InvalidTransition)
    );
    assert!(diner.drain().is_empty());
    let stored = h.store.find_order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_terminal_order_rejects_updates() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut diner = h.diner("qr-1").await;
    let order = h
        .create(&mut diner, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;

    h.update(&staff, &order.id, OrderStatus::Cancelled).await;
    staff.drain();
    diner.drain();

    h.update(&staff, &order.id, OrderStatus::Preparing).await;
    assert_eq!(
        error_code(&staff.drain()),
        Some(ErrorCode::OrderAlreadyFinal)
    );
    assert!(diner.drain().is_empty());
}

#[tokio::test]
async fn test_status_broadcasts_follow_commit_order() {
    let h = Harness::new();
    let staff = h.staff("r1").await;
    let mut diner = h.diner("qr-1").await;
    let order = h
        .create(&mut diner, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;

    for next in [
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ] {
        h.update(&staff, &order.id, next).await;
    }

    let statuses: Vec<OrderStatus> = diner
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::OrderStatusUpdate { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed
        ]
    );
}

#[tokio::test]
async fn test_slow_requester_does_not_reorder_status_broadcasts() {
    let h = Harness::new();
    let mut diner = h.diner("qr-1").await;
    let order = h
        .create(&mut diner, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;
    let fast = h.staff("r1").await;

    // Capacity 1, already holding joined_restaurant
    let mut slow = h.connect_with_capacity(1);
    h.send(
        &slow,
        ClientIntent::JoinRestaurant {
            restaurant_id: "r1".into(),
        },
    )
    .await;

    let dispatcher = h.dispatcher.clone();
    let slow_conn = slow.conn;
    let order_id = order.id.clone();
    let first = tokio::spawn(async move {
        dispatcher
            .dispatch(
                slow_conn,
                ClientIntent::UpdateOrderStatus {
                    order_id,
                    status: OrderStatus::Preparing,
                    restaurant_id: "r1".into(),
                },
            )
            .await;
    });

    loop {
        let stored = h.store.find_order(&order.id).await.unwrap().unwrap();
        if stored.status == OrderStatus::Preparing {
            break;
        }
        tokio::task::yield_now().await;
    }

    h.update(&fast, &order.id, OrderStatus::Ready).await;

    assert_eq!(slow.names(), vec!["joined_restaurant"]);
    first.await.unwrap();
    assert_eq!(slow.names(), vec!["order_update_success"]);

    let statuses: Vec<OrderStatus> = diner
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::OrderStatusUpdate { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![OrderStatus::Preparing, OrderStatus::Ready]);
    assert_eq!(h.dispatcher.order_locks.len(), 0);
}

#[tokio::test]
async fn test_join_from_unregistered_connection_is_rejected() {
    let h = Harness::new();
    let c = h.connect();
    h.dispatcher.registry().disconnect(c.conn);

    let err = h
        .dispatcher
        .handle(
            c.conn,
            ClientIntent::JoinRestaurant {
                restaurant_id: "r1".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
    assert_eq!(
        h.dispatcher
            .registry()
            .audience_size(&AudienceKey::restaurant("r1")),
        0
    );
}

#[tokio::test]
async fn test_concurrent_table_joins_both_receive_updates() {
    let h = Harness::new();
    let staff = h.staff("r1").await;
    let mut a = h.connect();
    let mut b = h.connect();

    let join = |c: &Client| {
        h.dispatcher.dispatch(
            c.conn,
            ClientIntent::JoinTable {
                qr_code_id: "qr-1".into(),
            },
        )
    };
    tokio::join!(join(&a), join(&b));
    assert_eq!(a.names(), vec!["joined_table"]);
    assert_eq!(b.names(), vec!["joined_table"]);

    let order = h.create(&mut a, dine_in("r1", "1", vec![item("cola", 1)])).await;
    h.update(&staff, &order.id, OrderStatus::Preparing).await;

    assert_eq!(a.names(), vec!["order_status_update"]);
    assert_eq!(b.names(), vec!["order_status_update"]);
}

#[tokio::test]
async fn test_disconnected_client_receives_nothing() {
    let h = Harness::new();
    let staff = h.staff("r1").await;
    let mut diner = h.diner("qr-1").await;
    let order = h
        .create(&mut diner, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;

    let left = h.dispatcher.registry().disconnect(diner.conn);
    assert_eq!(left, vec![AudienceKey::table("qr-1")]);

    h.update(&staff, &order.id, OrderStatus::Preparing).await;
    assert!(diner.drain().is_empty());
}

// ========================================================================
// request_waiter + unread counts
// ========================================================================

#[tokio::test]
async fn test_request_waiter_flow() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut diner = h.diner("qr-2").await;

    h.send(
        &diner,
        ClientIntent::RequestWaiter {
            restaurant_id: "r1".into(),
            table_number: Some("2".into()),
            order_type: OrderType::DineIn,
        },
    )
    .await;

    assert_eq!(diner.drain(), vec![ServerEvent::WaiterRequestSent]);

    let events = staff.drain();
    assert_eq!(events.len(), 2);
    match &events[0] {
        ServerEvent::WaiterRequest {
            notification,
            table_number,
            order_type,
            message,
        } => {
            assert_eq!(notification.notification_type, NotificationType::WaiterRequest);
            assert_eq!(
                notification.target,
                NotificationTarget::Restaurant("r1".into())
            );
            assert_eq!(table_number.as_deref(), Some("2"));
            assert_eq!(*order_type, OrderType::DineIn);
            assert_eq!(message, "Table 2 is requesting a waiter");
        }
        other => panic!("expected waiter_request, got {other:?}"),
    }
    assert_eq!(
        events[1],
        ServerEvent::RestaurantUnreadCount { unread_count: 1 }
    );
    assert_eq!(h.store.notifications().len(), 1);
}

#[tokio::test]
async fn test_request_waiter_validation() {
    let h = Harness::new();
    let mut c = h.connect();

    h.send(
        &c,
        ClientIntent::RequestWaiter {
            restaurant_id: "nope".into(),
            table_number: None,
            order_type: OrderType::Delivery,
        },
    )
    .await;
    assert_eq!(error_code(&c.drain()), Some(ErrorCode::TenantNotFound));

    h.send(
        &c,
        ClientIntent::RequestWaiter {
            restaurant_id: "r1".into(),
            table_number: Some("9".into()),
            order_type: OrderType::DineIn,
        },
    )
    .await;
    assert_eq!(error_code(&c.drain()), Some(ErrorCode::InvalidTable));
    assert!(h.store.notifications().is_empty());
}

#[tokio::test]
async fn test_unread_count_replies_only_to_requester() {
    let h = Harness::new();
    let mut staff = h.staff("r1").await;
    let mut asker = h.connect();
    let diner = h.connect();

    h.send(
        &diner,
        ClientIntent::RequestWaiter {
            restaurant_id: "r1".into(),
            table_number: None,
            order_type: OrderType::Delivery,
        },
    )
    .await;
    staff.drain();

    h.send(
        &asker,
        ClientIntent::GetRestaurantUnreadCount {
            restaurant_id: "r1".into(),
        },
    )
    .await;
    assert_eq!(
        asker.drain(),
        vec![ServerEvent::RestaurantUnreadCount { unread_count: 1 }]
    );
    assert!(staff.drain().is_empty());

    h.send(
        &asker,
        ClientIntent::GetAdminUnreadCount {
            admin_id: "a1".into(),
        },
    )
    .await;
    assert_eq!(
        asker.drain(),
        vec![ServerEvent::AdminUnreadCount { unread_count: 0 }]
    );
}

// ========================================================================
// Pure routing
// ========================================================================

#[tokio::test]
async fn test_status_broadcasts_table() {
    let h = Harness::new();
    let mut c = h.connect();
    let dine = h
        .create(&mut c, dine_in("r1", "1", vec![item("cola", 1)]))
        .await;
    let keys: Vec<String> = status_broadcasts(&dine, RoutingConfig::default())
        .into_iter()
        .map(|(k, e)| format!("{k}/{}", e.name()))
        .collect();
    assert_eq!(
        keys,
        vec!["restaurant:r1/order_updated", "table:qr-1/order_status_update"]
    );

    let deliv = h
        .create(&mut c, delivery("r1", Some("600"), vec![item("cola", 1)]))
        .await;
    let keys: Vec<String> = status_broadcasts(&deliv, RoutingConfig::default())
        .into_iter()
        .map(|(k, e)| format!("{k}/{}", e.name()))
        .collect();
    assert_eq!(
        keys,
        vec![
            "restaurant:r1/order_updated".to_string(),
            "restaurant:r1/order_status_update".to_string(),
            format!("order:{}/order_status_update", deliv.id),
        ]
    );
}

#[test]
fn test_normalize_phone() {
    assert_eq!(normalize_phone(" +34 600-111-222 "), "+34600111222");
    assert_eq!(normalize_phone("600+1"), "6001");
    assert_eq!(normalize_phone("   "), "");
}
