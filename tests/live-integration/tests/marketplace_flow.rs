#![cfg(feature = "live-tests")]

//! Cumulative end-to-end test against a running marketplace service.
//!
//! All steps run sequentially inside a single `#[tokio::test]`. Each
//! step assumes every previous step succeeded — if any step panics the
//! entire run stops immediately. Point `COURIER_API_URL` at the service
//! before running.

use std::time::Duration;

use courier_client::api::Api;
use courier_client::config::ClientConfig;
use courier_client::session;
use courier_common::order::OrderStatus;
use courier_common::user::Role;
use courier_common::wire::OrderDraft;

use courier_live_integration::{start_engine, unique, wait_for};

const TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cumulative_marketplace_flow() {
    tracing_subscriber::fmt::try_init().ok();

    let store_dir = tempfile::tempdir().unwrap();
    let rider_dir = tempfile::tempdir().unwrap();

    // ═══════════════════════════════════════════════════════════════════
    // Step 1: register one store and one rider
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 1: register participants ──");
    let store = start_engine(store_dir.path()).await;
    let rider = start_engine(rider_dir.path()).await;

    let store_email = format!("{}@example.com", unique("store"));
    let rider_email = format!("{}@example.com", unique("rider"));
    let store_user = store
        .register(&store_email, "Corner Store", "pw", Role::Store)
        .await
        .expect("store registration");
    let rider_user = rider
        .register(&rider_email, "Sam Rider", "pw", Role::Delivery)
        .await
        .expect("rider registration");
    assert_eq!(store_user.role, Role::Store);
    assert_eq!(rider_user.role, Role::Delivery);

    // Seed both wallets through the REST surface so escrow can be funded.
    let config = ClientConfig::from_env().unwrap();
    let raw = Api::new(&config).unwrap();
    let store_session = session::load(Some(store_dir.path())).expect("persisted store session");
    raw.set_token(Some(store_session.token)).await;
    raw.update_wallet(&store_user.id, 100.0, 0.0)
        .await
        .expect("seed store wallet");
    let rider_session = session::load(Some(rider_dir.path())).expect("persisted rider session");
    raw.set_token(Some(rider_session.token)).await;
    raw.update_wallet(&rider_user.id, 100.0, 0.0)
        .await
        .expect("seed rider wallet");

    store.refresh_wallet().await.expect("store wallet refresh");
    rider.refresh_wallet().await.expect("rider wallet refresh");
    assert_eq!(store.current_user().await.unwrap().wallet.balance, 100.0);
    assert_eq!(rider.current_user().await.unwrap().wallet.balance, 100.0);

    // ═══════════════════════════════════════════════════════════════════
    // Step 2: store publishes an order, rider sees it
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 2: create order ──");
    let product = unique("sourdough");
    store
        .create_order(OrderDraft {
            store_id: String::new(),
            store_name: String::new(),
            product_name: product.clone(),
            product_price: 40.0,
            suggested_delivery_fee: 10.0,
            destination: "12 Main St".to_string(),
            client_name: "Avery".to_string(),
            client_phone: "555-0100".to_string(),
            status: OrderStatus::Bidding,
        })
        .await
        .expect("create order");

    let order_id = wait_for(&rider, TIMEOUT, || async {
        rider
            .snapshot()
            .await
            .orders
            .values()
            .find(|o| o.product_name == product)
            .map(|o| o.id.clone())
    })
    .await;
    let order = rider.order(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Bidding);
    assert_eq!(order.store_id, store_user.id);

    // ═══════════════════════════════════════════════════════════════════
    // Step 3: rider bids, then re-bids (upsert, no duplicate)
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 3: bid upsert ──");
    rider.place_bid(&order_id, 9.0).await.expect("first bid");
    wait_for(&rider, TIMEOUT, || async {
        rider
            .order(&order_id)
            .await
            .and_then(|o| o.bid_by(&rider_user.id).cloned())
    })
    .await;

    rider.place_bid(&order_id, 8.0).await.expect("re-bid");
    let bid = wait_for(&rider, TIMEOUT, || async {
        rider
            .order(&order_id)
            .await
            .and_then(|o| o.bid_by(&rider_user.id).cloned())
            .filter(|b| b.amount == 8.0)
    })
    .await;
    let rider_bids = rider
        .order(&order_id)
        .await
        .unwrap()
        .bids
        .iter()
        .filter(|b| b.rider_id == rider_user.id)
        .count();
    assert_eq!(rider_bids, 1, "re-bid must update, not duplicate");

    // ═══════════════════════════════════════════════════════════════════
    // Step 4: store accepts the bid
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 4: select bidder ──");
    wait_for(&store, TIMEOUT, || async {
        store
            .order(&order_id)
            .await
            .filter(|o| o.bids.iter().any(|b| b.id == bid.id))
    })
    .await;
    store
        .select_bidder(&order_id, &bid.id)
        .await
        .expect("select bidder");
    wait_for(&store, TIMEOUT, || async {
        store
            .order(&order_id)
            .await
            .filter(|o| o.status == OrderStatus::AwaitingEscrow)
    })
    .await;

    // ═══════════════════════════════════════════════════════════════════
    // Step 5: both parties fund escrow
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 5: fund escrow ──");
    store.fund_store_escrow(&order_id).await.expect("store escrow");
    store.refresh_wallet().await.expect("wallet after funding");

    // Rider funds once the store's deposit is visible, exercising the
    // eager promotion to READY_FOR_PICKUP.
    wait_for(&rider, TIMEOUT, || async {
        rider
            .order(&order_id)
            .await
            .filter(|o| o.store_escrow_paid)
    })
    .await;
    rider.fund_rider_escrow(&order_id).await.expect("rider escrow");

    wait_for(&rider, TIMEOUT, || async {
        rider
            .order(&order_id)
            .await
            .filter(|o| o.status == OrderStatus::ReadyForPickup)
    })
    .await;

    rider.refresh_wallet().await.expect("rider wallet refresh");
    let rider_wallet = rider.current_user().await.unwrap().wallet;
    assert_eq!(rider_wallet.balance, 60.0);
    assert_eq!(rider_wallet.escrow_held, 40.0);

    // Funding twice must not charge twice.
    rider
        .fund_rider_escrow(&order_id)
        .await
        .expect("repeat funding is a no-op");
    rider.refresh_wallet().await.unwrap();
    assert_eq!(rider.current_user().await.unwrap().wallet.balance, 60.0);

    // ═══════════════════════════════════════════════════════════════════
    // Step 6: chat on the order
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 6: messages ──");
    rider
        .send_message(&order_id, "On my way to the store")
        .await
        .expect("send message");
    wait_for(&store, TIMEOUT, || async {
        store.order(&order_id).await.filter(|o| {
            o.messages
                .iter()
                .any(|m| m.sender_id == rider_user.id && m.text == "On my way to the store")
        })
    })
    .await;

    // ═══════════════════════════════════════════════════════════════════
    // Step 7: fulfillment walk to DELIVERED
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 7: fulfillment ──");
    for status in [
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ] {
        rider
            .update_order_status(&order_id, status)
            .await
            .unwrap_or_else(|e| panic!("advance to {status}: {e}"));
        wait_for(&rider, TIMEOUT, || async {
            rider.order(&order_id).await.filter(|o| o.status == status)
        })
        .await;
    }

    // A delivered order refuses to move again.
    let err = rider
        .update_order_status(&order_id, OrderStatus::PickedUp)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("illegal"), "got: {err}");

    // ═══════════════════════════════════════════════════════════════════
    // Step 8: both sides review
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 8: reviews ──");
    store
        .submit_review(&order_id, &rider_user.id, 5.0, "Fast and careful")
        .await
        .expect("store review");
    rider
        .submit_review(&order_id, &store_user.id, 4.0, "Smooth handoff")
        .await
        .expect("rider review");

    wait_for(&store, TIMEOUT, || async {
        store
            .order(&order_id)
            .await
            .filter(|o| o.store_reviewed && o.rider_reviewed)
    })
    .await;
    let users = store.snapshot().await.users;
    assert_eq!(
        users.get(&rider_user.id).and_then(|u| u.average_rating()),
        Some(5.0)
    );

    // ═══════════════════════════════════════════════════════════════════
    // Step 9: session survives restart, logout clears it
    // ═══════════════════════════════════════════════════════════════════
    println!("── Step 9: session lifecycle ──");
    store.shutdown().await;
    let store = start_engine(store_dir.path()).await;
    assert_eq!(store.current_user().await.unwrap().id, store_user.id);

    store.logout().await.expect("logout");
    assert!(store.current_user().await.is_none());
    assert!(session::load(Some(store_dir.path())).is_none());

    store.shutdown().await;
    rider.shutdown().await;
}
