//! `PgStore` against a real database.
//!
//! Runs only when `DATABASE_URL` points at a PostgreSQL instance; the schema
//! is brought up with the crate's migrations. Every test works on its own
//! freshly created user.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use jwt_auth_service::auth::Role;
use jwt_auth_service::error::StoreError;
use jwt_auth_service::store::{PgStore, RefreshTokenStore, UserRepository};

async fn connect() -> Option<PgStore> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL is not set, skipping Postgres store test");
            return None;
        }
    };

    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate the database.");

    Some(PgStore::new(pool))
}

fn unique_email() -> String {
    format!("{}@example.com", Uuid::new_v4())
}

async fn create_user(store: &PgStore) -> i64 {
    store
        .create(&unique_email(), "$2b$12$not-a-real-hash", Role::User)
        .await
        .expect("Failed to create user")
}

#[tokio::test]
async fn users_are_found_by_email_and_id_and_emails_are_unique() {
    let Some(store) = connect().await else { return };
    let email = unique_email();

    let id = store.create(&email, "hash", Role::Admin).await.unwrap();

    let by_email = store.find_by_email(&email).await.unwrap();
    assert_eq!(by_email.id, id);
    assert_eq!(by_email.role, Role::Admin);
    assert_eq!(store.find_by_id(id).await.unwrap().email, email);

    assert_eq!(
        store.create(&email, "hash", Role::User).await,
        Err(StoreError::Conflict)
    );
    assert_eq!(
        store.find_by_email(&unique_email()).await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn duplicate_put_is_a_conflict() {
    let Some(store) = connect().await else { return };
    let user_id = create_user(&store).await;
    let token = Uuid::new_v4().to_string();

    store.put(user_id, &token).await.unwrap();

    assert_eq!(store.put(user_id, &token).await, Err(StoreError::Conflict));
}

#[tokio::test]
async fn rotate_replaces_the_token_in_place() {
    let Some(store) = connect().await else { return };
    let user_id = create_user(&store).await;
    let old = Uuid::new_v4().to_string();
    let new = Uuid::new_v4().to_string();
    store.put(user_id, &old).await.unwrap();

    store.rotate(user_id, &new, &old).await.unwrap();

    assert_eq!(store.get(&old).await, Err(StoreError::NotFound));
    let record = store.get(&new).await.unwrap();
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.role, Role::User);
    assert_eq!(store.delete_all_for_user(user_id).await.unwrap(), 1);
}

#[tokio::test]
async fn rotate_after_delete_is_a_conflict() {
    let Some(store) = connect().await else { return };
    let user_id = create_user(&store).await;
    let old = Uuid::new_v4().to_string();
    store.put(user_id, &old).await.unwrap();

    store.delete(&old).await.unwrap();
    // Deleting twice is fine
    store.delete(&old).await.unwrap();

    assert_eq!(
        store.rotate(user_id, "replacement", &old).await,
        Err(StoreError::Conflict)
    );
}

#[tokio::test]
async fn rotate_with_another_users_id_is_a_conflict() {
    let Some(store) = connect().await else { return };
    let owner = create_user(&store).await;
    let other = create_user(&store).await;
    let token = Uuid::new_v4().to_string();
    store.put(owner, &token).await.unwrap();

    assert_eq!(
        store.rotate(other, "replacement", &token).await,
        Err(StoreError::Conflict)
    );
    assert_eq!(store.get(&token).await.unwrap().user_id, owner);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotations_have_exactly_one_winner() {
    let Some(store) = connect().await else { return };
    let store = Arc::new(store);
    let user_id = create_user(&store).await;
    let old = Uuid::new_v4().to_string();
    store.put(user_id, &old).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let old = old.clone();
            tokio::spawn(async move {
                store
                    .rotate(user_id, &format!("{}-{}", old, i), &old)
                    .await
            })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => wins += 1,
            Err(e) => assert_eq!(e, StoreError::Conflict),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(store.delete_all_for_user(user_id).await.unwrap(), 1);
}
