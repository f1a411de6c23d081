use super::*;
use chrono::{Duration, Utc};

fn account(id: &str, email: &str, card: &str) -> StoredAccount {
    let now = Utc::now();
    StoredAccount::new(
        Account {
            id: id.to_string(),
            name: format!("user {id}"),
            email: email.to_string(),
            card_number: card.to_string(),
            phone: String::new(),
            profile_image: String::new(),
            created_at: now,
            updated_at: now,
        },
        "$argon2id$fake".to_string(),
    )
}

fn document(id: &str, owner: &str, minutes_ago: i64) -> Document {
    Document {
        id: id.to_string(),
        owner_id: owner.to_string(),
        document_name: format!("doc {id}"),
        document_type: DocumentType::Passport,
        file_type: "application/pdf".to_string(),
        file_size: 10,
        storage_ref: format!("{owner}/{id}.pdf"),
        upload_date: Utc::now() - Duration::minutes(minutes_ago),
        is_verified: false,
        verified_at: None,
        is_encrypted: false,
        expiry_date: None,
    }
}

#[test]
fn unique_email_and_card() {
    let store = Store::in_memory();
    store.insert_account(account("a", "alice@example.com", "IAR/11111")).unwrap();
    assert!(matches!(
        store.insert_account(account("b", "alice@example.com", "IAR/22222")),
        Err(StoreError::EmailTaken)
    ));
    assert!(matches!(
        store.insert_account(account("c", "carol@example.com", "IAR/11111")),
        Err(StoreError::CardNumberTaken)
    ));
    assert_eq!(store.account_count(), 1);
    assert_eq!(store.account_by_email("  ALICE@example.com").unwrap().id(), "a");
}

#[test]
fn update_keeps_identity_fields() {
    let store = Store::in_memory();
    store.insert_account(account("a", "alice@example.com", "IAR/11111")).unwrap();
    let before = store.account("a").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let after = store
        .update_account("a", |acc| {
            acc.account.name = "Alice B".into();
            acc.account.email = "mallory@example.com".into();
            acc.account.card_number = "IAR/99999".into();
        })
        .unwrap()
        .unwrap();
    assert_eq!(after.account.name, "Alice B");
    assert_eq!(after.account.email, "alice@example.com");
    assert_eq!(after.account.card_number, "IAR/11111");
    assert!(after.account.updated_at > before.account.updated_at);
    assert!(store.update_account("missing", |_| {}).unwrap().is_none());
}

#[test]
fn documents_are_owner_scoped_and_sorted() {
    let store = Store::in_memory();
    store.insert_document(document("d1", "alice", 30)).unwrap();
    store.insert_document(document("d2", "alice", 5)).unwrap();
    store.insert_document(document("d3", "bob", 1)).unwrap();

    let ids: Vec<String> = store.documents_for("alice").into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["d2", "d1"]);
    assert!(store.document("bob", "d1").is_none());
    assert!(store.document("alice", "d1").is_some());

    // bob cannot delete alice's document
    assert!(store.delete_document("bob", "d1").unwrap().is_none());
    assert_eq!(store.document_count(), 3);
    assert!(store.delete_document("alice", "d1").unwrap().is_some());
    assert!(store.delete_document("alice", "d1").unwrap().is_none());
}

#[test]
fn snapshot_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let store = Store::open(tmp.path()).unwrap();
        store.insert_account(account("a", "alice@example.com", "IAR/11111")).unwrap();
        store.insert_document(document("d1", "a", 0)).unwrap();
    }
    let store = Store::open(tmp.path()).unwrap();
    let acc = store.account_by_email("alice@example.com").unwrap();
    assert_eq!(acc.password_hash, "$argon2id$fake");
    assert_eq!(store.documents_for("a").len(), 1);
    // indices are rebuilt on load
    assert!(matches!(
        store.insert_account(account("b", "alice@example.com", "IAR/22222")),
        Err(StoreError::EmailTaken)
    ));
}

#[test]
fn snapshot_never_leaks_into_public_account_json() {
    let acc = account("a", "alice@example.com", "IAR/11111");
    let public = serde_json::to_value(&acc.account).unwrap();
    assert!(public.get("passwordHash").is_none());
    assert_eq!(public["cardNumber"], "IAR/11111");
    let stored = serde_json::to_value(&acc).unwrap();
    assert_eq!(stored["passwordHash"], "$argon2id$fake");
}
