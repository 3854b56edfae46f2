//! Stock, history and membership effects of order status changes, checked
//! against a migrated database.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use solenne_admin::db::OrderRepository as AdminOrders;
use solenne_admin::db::orders::{StatusChange, StatusUpdate};
use solenne_core::{CurrencyCode, CustomerId, OrderId, OrderStatus, PaymentStatus, ProductId};
use solenne_integration_tests::database_pool;
use solenne_storefront::db::OrderRepository as StoreOrders;
use solenne_storefront::db::orders::{PaymentOutcome, PaymentUpdate, WEBHOOK_ACTOR};

const ADDRESS: &str = r#"{"street":"Rua Augusta","number":"1200","complement":null,"district":"Consolação","city":"São Paulo","state":"SP","postal_code":"01304-001"}"#;

struct Fixture {
    order_id: OrderId,
    order_number: String,
    product_id: ProductId,
    customer_id: CustomerId,
    total: Decimal,
}

fn unique() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

async fn customer(pool: &PgPool) -> CustomerId {
    sqlx::query_scalar("INSERT INTO shop.customers (email, name) VALUES ($1, 'Test Buyer') RETURNING id")
        .bind(format!("buyer-{}@solenne.test", unique()))
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A pending order for `quantity` units of a fresh product.
async fn pending_order(
    pool: &PgPool,
    customer_id: CustomerId,
    stock: i32,
    quantity: i32,
    membership_days: Option<i32>,
) -> Fixture {
    let suffix = unique();
    let unit_price = Decimal::new(4990, 2);
    let total = unit_price * Decimal::from(quantity);

    let product_id: ProductId = sqlx::query_scalar(
        r"
        INSERT INTO shop.products (name, slug, price, stock, membership_days)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(format!("Product {suffix}"))
    .bind(format!("product-{suffix}"))
    .bind(unit_price)
    .bind(stock)
    .bind(membership_days)
    .fetch_one(pool)
    .await
    .unwrap();

    let order_number = format!("SOL-TEST-{suffix}");
    let sql = format!(
        r"
        INSERT INTO shop.orders
            (order_number, customer_id, status, currency, subtotal, shipping, total,
             contact_name, contact_email, contact_phone, shipping_address)
        VALUES ($1, $2, 'pending', 'BRL', $3, 0, $3,
                'Test Buyer', 'buyer@solenne.test', '11999990000', '{ADDRESS}'::jsonb)
        RETURNING id
        "
    );
    let order_id: OrderId = sqlx::query_scalar(&sql)
        .bind(&order_number)
        .bind(customer_id)
        .bind(total)
        .fetch_one(pool)
        .await
        .unwrap();

    sqlx::query(
        r"
        INSERT INTO shop.order_items
            (order_id, product_id, product_name, product_slug, unit_price, quantity, line_total)
        VALUES ($1, $2, 'Product', 'product', $3, $4, $5)
        ",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(unit_price)
    .bind(quantity)
    .bind(total)
    .execute(pool)
    .await
    .unwrap();

    Fixture {
        order_id,
        order_number,
        product_id,
        customer_id,
        total,
    }
}

fn payment(fixture: &Fixture, gateway_id: &str, status: PaymentStatus) -> PaymentUpdate {
    PaymentUpdate {
        gateway_payment_id: gateway_id.to_string(),
        order_number: fixture.order_number.clone(),
        status,
        status_detail: None,
        amount: fixture.total,
        currency: CurrencyCode::BRL,
        approved_at: None,
    }
}

async fn stock(pool: &PgPool, product_id: ProductId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM shop.products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn period_end(pool: &PgPool, customer_id: CustomerId) -> Option<DateTime<Utc>> {
    sqlx::query_scalar("SELECT current_period_end FROM shop.subscriptions WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn history(pool: &PgPool, order_id: OrderId) -> Vec<(Option<OrderStatus>, OrderStatus, String)> {
    sqlx::query_as(
        "SELECT from_status, to_status, actor FROM shop.order_status_history WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

fn assert_days_from_now(end: DateTime<Utc>, days: i64) {
    let expected = Utc::now() + Duration::days(days);
    assert!(
        (end - expected).num_minutes().abs() < 5,
        "period end {end} is not {days} days from now"
    );
}

#[tokio::test]
#[ignore = "Requires migrated database at DATABASE_URL"]
async fn test_approved_payment_floors_stock_and_grants_membership() {
    let pool = database_pool().await;
    let customer_id = customer(&pool).await;
    let fixture = pending_order(&pool, customer_id, 1, 2, Some(30)).await;
    let orders = StoreOrders::new(&pool);

    let outcome = orders
        .apply_payment(&payment(&fixture, &unique(), PaymentStatus::Approved))
        .await
        .unwrap();

    let (order, from, membership) = match outcome {
        PaymentOutcome::Transitioned {
            order,
            from,
            membership,
        } => (order, from, membership),
        other => panic!("expected a transition, got {other:?}"),
    };
    assert_eq!(from, OrderStatus::Pending);
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.paid_at.is_some());

    assert_eq!(stock(&pool, fixture.product_id).await, 0);

    let until = membership.flatten().unwrap();
    assert_days_from_now(until, 60);
    assert_days_from_now(period_end(&pool, fixture.customer_id).await.unwrap(), 60);

    assert_eq!(
        history(&pool, fixture.order_id).await,
        vec![(
            Some(OrderStatus::Pending),
            OrderStatus::Paid,
            WEBHOOK_ACTOR.to_string()
        )]
    );
}

#[tokio::test]
#[ignore = "Requires migrated database at DATABASE_URL"]
async fn test_repeated_notification_changes_nothing() {
    let pool = database_pool().await;
    let customer_id = customer(&pool).await;
    let fixture = pending_order(&pool, customer_id, 10, 3, Some(30)).await;
    let orders = StoreOrders::new(&pool);
    let update = payment(&fixture, &unique(), PaymentStatus::Approved);

    orders.apply_payment(&update).await.unwrap();
    let stock_after_first = stock(&pool, fixture.product_id).await;
    let end_after_first = period_end(&pool, fixture.customer_id).await;

    let outcome = orders.apply_payment(&update).await.unwrap();
    assert!(
        matches!(outcome, PaymentOutcome::Recorded { ref order } if order.status == OrderStatus::Paid),
        "{outcome:?}"
    );

    assert_eq!(stock_after_first, 7);
    assert_eq!(stock(&pool, fixture.product_id).await, 7);
    assert_eq!(period_end(&pool, fixture.customer_id).await, end_after_first);
    assert_eq!(history(&pool, fixture.order_id).await.len(), 1);

    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.payments WHERE order_id = $1")
        .bind(fixture.order_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(payments, 1);
}

#[tokio::test]
#[ignore = "Requires migrated database at DATABASE_URL"]
async fn test_second_membership_order_extends_period() {
    let pool = database_pool().await;
    let customer_id = customer(&pool).await;
    let first = pending_order(&pool, customer_id, 0, 1, Some(30)).await;
    let second = pending_order(&pool, customer_id, 0, 1, Some(30)).await;
    let orders = StoreOrders::new(&pool);

    orders
        .apply_payment(&payment(&first, &unique(), PaymentStatus::Approved))
        .await
        .unwrap();
    assert_days_from_now(period_end(&pool, customer_id).await.unwrap(), 30);

    orders
        .apply_payment(&payment(&second, &unique(), PaymentStatus::Approved))
        .await
        .unwrap();
    assert_days_from_now(period_end(&pool, customer_id).await.unwrap(), 60);
}

#[tokio::test]
#[ignore = "Requires migrated database at DATABASE_URL"]
async fn test_refund_returns_stock() {
    let pool = database_pool().await;
    let customer_id = customer(&pool).await;
    let fixture = pending_order(&pool, customer_id, 5, 2, None).await;
    let orders = StoreOrders::new(&pool);
    let gateway_id = unique();

    let outcome = orders
        .apply_payment(&payment(&fixture, &gateway_id, PaymentStatus::Approved))
        .await
        .unwrap();
    assert!(
        matches!(outcome, PaymentOutcome::Transitioned { membership: None, .. }),
        "{outcome:?}"
    );
    assert_eq!(stock(&pool, fixture.product_id).await, 3);

    let outcome = orders
        .apply_payment(&payment(&fixture, &gateway_id, PaymentStatus::Refunded))
        .await
        .unwrap();
    assert!(
        matches!(
            outcome,
            PaymentOutcome::Transitioned { ref order, from: OrderStatus::Paid, .. }
                if order.status == OrderStatus::Refunded
        ),
        "{outcome:?}"
    );
    assert_eq!(stock(&pool, fixture.product_id).await, 5);
    assert_eq!(history(&pool, fixture.order_id).await.len(), 2);
}

#[tokio::test]
#[ignore = "Requires migrated database at DATABASE_URL"]
async fn test_rejected_payment_cancels_without_touching_stock() {
    let pool = database_pool().await;
    let customer_id = customer(&pool).await;
    let fixture = pending_order(&pool, customer_id, 4, 1, None).await;
    let orders = StoreOrders::new(&pool);

    orders
        .apply_payment(&payment(&fixture, &unique(), PaymentStatus::Rejected))
        .await
        .unwrap();
    assert_eq!(stock(&pool, fixture.product_id).await, 4);

    // A late approval cannot revive the order.
    let outcome = orders
        .apply_payment(&payment(&fixture, &unique(), PaymentStatus::Approved))
        .await
        .unwrap();
    assert!(
        matches!(outcome, PaymentOutcome::Recorded { ref order } if order.status == OrderStatus::Cancelled),
        "{outcome:?}"
    );
    assert_eq!(stock(&pool, fixture.product_id).await, 4);
}

#[tokio::test]
#[ignore = "Requires migrated database at DATABASE_URL"]
async fn test_admin_cancel_restocks_paid_order() {
    let pool = database_pool().await;
    let customer_id = customer(&pool).await;
    let fixture = pending_order(&pool, customer_id, 6, 2, Some(7)).await;
    let orders = AdminOrders::new(&pool);
    let change = |target| StatusChange {
        target,
        tracking_code: None,
        note: Some("checked by phone"),
        actor: "ops@solenne.test",
    };

    let update = orders
        .update_status(fixture.order_id, &change(OrderStatus::Paid))
        .await
        .unwrap();
    assert!(matches!(update, StatusUpdate::Applied { from: OrderStatus::Pending, .. }));
    assert_eq!(stock(&pool, fixture.product_id).await, 4);
    assert_days_from_now(period_end(&pool, customer_id).await.unwrap(), 14);

    let update = orders
        .update_status(fixture.order_id, &change(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert!(matches!(update, StatusUpdate::Applied { from: OrderStatus::Paid, .. }));
    assert_eq!(stock(&pool, fixture.product_id).await, 6);

    let update = orders
        .update_status(fixture.order_id, &change(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert!(matches!(
        update,
        StatusUpdate::Rejected {
            current: OrderStatus::Cancelled
        }
    ));
    assert_eq!(stock(&pool, fixture.product_id).await, 6);

    let actors: Vec<String> = history(&pool, fixture.order_id)
        .await
        .into_iter()
        .map(|(_, _, actor)| actor)
        .collect();
    assert_eq!(actors, vec!["ops@solenne.test", "ops@solenne.test"]);
}
