//! PostgreSQL repository tests.
//!
//! Each test gets a fresh database with migrations applied. `DATABASE_URL`
//! must point at a server the test user can create databases on.

use chrono::{Duration, Utc};
use imangor::domain::crud::PageRequest;
use imangor::domain::entities::{
    NewItem, NewUser, OrderFilter, OrderStatus, PricedLine, Role, UserFilter,
};
use imangor::error::AppError;
use imangor::infrastructure::persistence::Repositories;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        hashed_password: "$argon2id$stub".to_string(),
        full_name: None,
        is_active: true,
        roles: vec![Role::User],
    }
}

fn new_item(owner_id: i64, title: &str, cents: i64) -> NewItem {
    NewItem {
        title: title.to_string(),
        description: None,
        price: Decimal::new(cents, 2),
        owner_id,
    }
}

#[sqlx::test]
async fn test_user_email_is_unique(pool: PgPool) {
    let repos = Repositories::postgres(Arc::new(pool));

    let created = repos.users.create(new_user("ada@example.com")).await.unwrap();
    assert_eq!(created.roles, vec![Role::User]);

    let err = repos
        .users
        .create(new_user("ada@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let found = repos.users.get_by_email("ada@example.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(created.id));
}

#[sqlx::test]
async fn test_bulk_create_preserves_order_and_rolls_back(pool: PgPool) {
    let repos = Repositories::postgres(Arc::new(pool));

    let users = repos
        .users
        .bulk_create(vec![new_user("a@example.com"), new_user("b@example.com")])
        .await
        .unwrap();
    assert_eq!(users[0].email, "a@example.com");
    assert_eq!(users[1].email, "b@example.com");

    let err = repos
        .users
        .bulk_create(vec![new_user("c@example.com"), new_user("a@example.com")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let total = repos.users.count(UserFilter::default()).await.unwrap();
    assert_eq!(total, 2);
}

#[sqlx::test]
async fn test_item_pagination(pool: PgPool) {
    let repos = Repositories::postgres(Arc::new(pool));
    let owner = repos.users.create(new_user("owner@example.com")).await.unwrap();

    let items = (1..=15)
        .map(|n| new_item(owner.id, &format!("Item {}", n), 100 * n))
        .collect();
    repos.items.bulk_create(items).await.unwrap();

    let first = repos
        .items
        .list(PageRequest::new(0, 10), Default::default())
        .await
        .unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.total, 15);

    let rest = repos
        .items
        .list(PageRequest::new(10, 10), Default::default())
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 5);
    assert_eq!(rest.items[0].title, "Item 11");
    assert_eq!(rest.items[0].price, Decimal::new(1100, 2));
}

#[sqlx::test]
async fn test_order_lifecycle(pool: PgPool) {
    let repos = Repositories::postgres(Arc::new(pool));
    let owner = repos.users.create(new_user("buyer@example.com")).await.unwrap();
    let item = repos
        .items
        .create(new_item(owner.id, "Lamp", 1999))
        .await
        .unwrap();

    let line = PricedLine {
        item_id: item.id,
        quantity: 2,
        unit_price: item.price,
    };
    let placed = repos
        .orders
        .create_with_items(owner.id, Decimal::new(3998, 2), vec![line])
        .await
        .unwrap();
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].unit_price, Decimal::new(1999, 2));

    let id = placed.order.id;
    let cancelled = repos
        .orders
        .transition(id, OrderStatus::Pending, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.map(|o| o.status), Some(OrderStatus::Cancelled));

    // The second compare-and-set sees a non-pending order.
    let again = repos
        .orders
        .transition(id, OrderStatus::Pending, OrderStatus::Processed)
        .await
        .unwrap();
    assert!(again.is_none());

    let pending = OrderFilter {
        status: Some(OrderStatus::Pending),
        ..Default::default()
    };
    assert_eq!(repos.orders.count(pending).await.unwrap(), 0);
}

#[sqlx::test]
async fn test_order_with_missing_item_writes_nothing(pool: PgPool) {
    let repos = Repositories::postgres(Arc::new(pool));
    let owner = repos.users.create(new_user("buyer@example.com")).await.unwrap();

    let line = PricedLine {
        item_id: 4242,
        quantity: 1,
        unit_price: Decimal::ONE,
    };
    let err = repos
        .orders
        .create_with_items(owner.id, Decimal::ONE, vec![line])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert_eq!(repos.orders.count(OrderFilter::default()).await.unwrap(), 0);
}

#[sqlx::test]
async fn test_duplicate_order_lines_roll_back_the_order(pool: PgPool) {
    let repos = Repositories::postgres(Arc::new(pool));
    let owner = repos.users.create(new_user("buyer@example.com")).await.unwrap();
    let item = repos
        .items
        .create(new_item(owner.id, "Lamp", 500))
        .await
        .unwrap();
    let line = PricedLine {
        item_id: item.id,
        quantity: 1,
        unit_price: item.price,
    };

    let err = repos
        .orders
        .create_with_items(owner.id, item.price, vec![line.clone(), line])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    assert_eq!(repos.orders.count(OrderFilter::default()).await.unwrap(), 0);
}

#[sqlx::test]
async fn test_expire_stale_only_touches_old_pending_orders(pool: PgPool) {
    let repos = Repositories::postgres(Arc::new(pool));
    let owner = repos.users.create(new_user("buyer@example.com")).await.unwrap();
    let item = repos
        .items
        .create(new_item(owner.id, "Lamp", 500))
        .await
        .unwrap();
    let line = PricedLine {
        item_id: item.id,
        quantity: 1,
        unit_price: item.price,
    };
    repos
        .orders
        .create_with_items(owner.id, item.price, vec![line])
        .await
        .unwrap();

    let nothing = repos
        .orders
        .expire_stale(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(nothing, 0);

    let expired = repos
        .orders
        .expire_stale(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(expired, 1);
}
