//! Integration tests for notifications and the role fan-out query.

use sqlx::PgPool;

use mdc_db::models::notification::{CreateNotification, KIND_ESCALATION, KIND_STAGE_CHANGED};
use mdc_db::models::user::{CreateUser, User};
use mdc_db::repositories::{NotificationRepo, RoleRepo, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, username: &str, role: &str) -> User {
    let role = RoleRepo::find_by_name(pool, role)
        .await
        .unwrap()
        .expect("role is seeded by migration");
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@mdc.test"),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$dGVzdA$dGVzdA".to_string(),
            role_id: role.id,
        },
    )
    .await
    .unwrap()
}

fn notification(user_id: i64, title: &str) -> CreateNotification {
    CreateNotification {
        user_id,
        kind: KIND_STAGE_CHANGED.to_string(),
        title: title.to_string(),
        body: String::new(),
        subject_table: "workflow_instance".to_string(),
        subject_id: Some(1),
    }
}

// ---------------------------------------------------------------------------
// Test: unread listing and counts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unread_listing_and_counts(pool: PgPool) {
    let user = seed_user(&pool, "recipient", "editor").await;

    let first = NotificationRepo::create(&pool, &notification(user.id, "first"))
        .await
        .unwrap();
    NotificationRepo::create(&pool, &notification(user.id, "second"))
        .await
        .unwrap();

    assert_eq!(NotificationRepo::unread_count(&pool, user.id).await.unwrap(), 2);

    assert!(NotificationRepo::mark_read(&pool, first.id, user.id).await.unwrap());
    assert_eq!(NotificationRepo::unread_count(&pool, user.id).await.unwrap(), 1);

    let unread = NotificationRepo::list_for_user(&pool, user.id, true, 50, 0)
        .await
        .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].title, "second");

    let all = NotificationRepo::list_for_user(&pool, user.id, false, 50, 0)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    let read_row = all.iter().find(|n| n.id == first.id).unwrap();
    assert!(read_row.is_read);
    assert!(read_row.read_at.is_some());
}

// ---------------------------------------------------------------------------
// Test: users cannot acknowledge each other's notifications
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mark_read_is_owner_scoped(pool: PgPool) {
    let owner = seed_user(&pool, "owner", "editor").await;
    let intruder = seed_user(&pool, "intruder", "editor").await;

    let row = NotificationRepo::create(&pool, &notification(owner.id, "private"))
        .await
        .unwrap();

    assert!(
        !NotificationRepo::mark_read(&pool, row.id, intruder.id).await.unwrap(),
        "foreign user must not flip the read flag"
    );
    assert_eq!(NotificationRepo::unread_count(&pool, owner.id).await.unwrap(), 1);

    // Marking twice is a no-op the second time.
    assert!(NotificationRepo::mark_read(&pool, row.id, owner.id).await.unwrap());
    assert!(!NotificationRepo::mark_read(&pool, row.id, owner.id).await.unwrap());
}

// ---------------------------------------------------------------------------
// Test: mark_all_read clears only the target user
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mark_all_read_scoped(pool: PgPool) {
    let a = seed_user(&pool, "user-a", "editor").await;
    let b = seed_user(&pool, "user-b", "editor").await;

    for title in ["one", "two", "three"] {
        NotificationRepo::create(&pool, &notification(a.id, title)).await.unwrap();
    }
    NotificationRepo::create(&pool, &notification(b.id, "other")).await.unwrap();

    let cleared = NotificationRepo::mark_all_read(&pool, a.id).await.unwrap();
    assert_eq!(cleared, 3);
    assert_eq!(NotificationRepo::unread_count(&pool, a.id).await.unwrap(), 0);
    assert_eq!(NotificationRepo::unread_count(&pool, b.id).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Test: notifications written in a rolled-back transaction vanish
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_in_tx_follows_transaction(pool: PgPool) {
    let user = seed_user(&pool, "txn-user", "editor").await;

    let mut tx = pool.begin().await.unwrap();
    NotificationRepo::create_in_tx(
        &mut tx,
        &CreateNotification {
            kind: KIND_ESCALATION.to_string(),
            ..notification(user.id, "doomed")
        },
    )
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(
        NotificationRepo::unread_count(&pool, user.id).await.unwrap(),
        0,
        "rollback must take the notification with it"
    );
}

// ---------------------------------------------------------------------------
// Test: role fan-out lists only active holders of the role
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_role_fanout_excludes_inactive(pool: PgPool) {
    let active = seed_user(&pool, "active-editor", "editor").await;
    let benched = seed_user(&pool, "benched-editor", "editor").await;
    seed_user(&pool, "some-admin", "admin").await;

    UserRepo::deactivate(&pool, benched.id).await.unwrap();

    let contacts = UserRepo::list_active_by_role(&pool, "editor").await.unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].id, active.id);
    assert_eq!(contacts[0].email, "active-editor@mdc.test");
}
