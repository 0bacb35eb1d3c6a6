use vidtube_api::auth::AuthError;
use vidtube_api::auth::store::{IdentityStore, PgIdentityStore};
use vidtube_api::models::NewIdentity;
use vidtube_api::test_support::{TestDatabase, TestDatabaseError};

fn new_identity(username: &str, email: &str) -> NewIdentity {
    NewIdentity {
        username: username.into(),
        email: email.into(),
        full_name: "Test User".into(),
        password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".into(),
    }
}

async fn provision(test_name: &str) -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping {test_name}: TEST_DATABASE_URL not set");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

#[tokio::test]
async fn insert_and_lookup_identities() {
    let Some(test_db) = provision("insert_and_lookup_identities").await else {
        return;
    };
    let store = PgIdentityStore::new(test_db.pool_clone());

    let created = store
        .insert(new_identity("alice", "alice@example.com"))
        .await
        .expect("insert");

    let by_id = store.find_by_id(created.id).await.expect("find by id");
    assert_eq!(by_id.map(|i| i.username), Some("alice".to_string()));

    let by_name = store
        .find_by_username_or_email(Some("ALICE"), None)
        .await
        .expect("find by username");
    assert_eq!(by_name.map(|i| i.id), Some(created.id));

    let by_email = store
        .find_by_username_or_email(None, Some("Alice@Example.com"))
        .await
        .expect("find by email");
    assert_eq!(by_email.map(|i| i.id), Some(created.id));

    let duplicate = store
        .insert(new_identity("alice", "second@example.com"))
        .await;
    assert!(matches!(duplicate, Err(AuthError::Conflict(_))));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn refresh_token_primitives_are_conditional() {
    let Some(test_db) = provision("refresh_token_primitives_are_conditional").await else {
        return;
    };
    let store = PgIdentityStore::new(test_db.pool_clone());
    let id = store
        .insert(new_identity("bob", "bob@example.com"))
        .await
        .expect("insert")
        .id;

    assert_eq!(store.get_stored_refresh_token(id).await.expect("get"), None);
    assert!(!store.compare_and_replace(id, "r0", "r1").await.expect("cas"));

    store.set_refresh_token(id, "r1").await.expect("set");
    assert!(!store.compare_and_replace(id, "stale", "r2").await.expect("cas"));
    assert!(store.compare_and_replace(id, "r1", "r2").await.expect("cas"));
    assert_eq!(
        store.get_stored_refresh_token(id).await.expect("get").as_deref(),
        Some("r2")
    );

    store.clear_refresh_token(id).await.expect("clear");
    assert_eq!(store.get_stored_refresh_token(id).await.expect("get"), None);
    assert!(!store.compare_and_replace(id, "r2", "r3").await.expect("cas"));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn concurrent_compare_and_replace_has_one_winner() {
    let Some(test_db) = provision("concurrent_compare_and_replace_has_one_winner").await else {
        return;
    };
    let store = PgIdentityStore::new(test_db.pool_clone());
    let id = store
        .insert(new_identity("carol", "carol@example.com"))
        .await
        .expect("insert")
        .id;
    store.set_refresh_token(id, "shared").await.expect("set");

    let mut handles = Vec::new();
    for n in 0..6 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .compare_and_replace(id, "shared", &format!("winner-{n}"))
                .await
                .expect("cas")
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.expect("task completes") {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);

    let stored = store
        .get_stored_refresh_token(id)
        .await
        .expect("get")
        .expect("token present");
    assert!(stored.starts_with("winner-"));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn account_updates_respect_uniqueness() {
    let Some(test_db) = provision("account_updates_respect_uniqueness").await else {
        return;
    };
    let store = PgIdentityStore::new(test_db.pool_clone());
    let dave = store
        .insert(new_identity("dave", "dave@example.com"))
        .await
        .expect("insert");
    store
        .insert(new_identity("erin", "erin@example.com"))
        .await
        .expect("insert");

    let clash = store
        .update_account(dave.id, "Dave", "erin@example.com")
        .await;
    assert!(matches!(clash, Err(AuthError::Conflict(_))));

    let updated = store
        .update_account(dave.id, "David", "david@example.com")
        .await
        .expect("update");
    assert_eq!(updated.full_name, "David");

    store
        .update_password(dave.id, "new-hash")
        .await
        .expect("update password");
    let reloaded = store
        .find_by_id(dave.id)
        .await
        .expect("find")
        .expect("present");
    assert_eq!(reloaded.password_hash, "new-hash");

    test_db.close().await.expect("failed to drop test database");
}
