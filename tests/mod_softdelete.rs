use bson::{Bson, doc};
use tomblite::softdelete::{Schema, SchemaOptions};
use tomblite::{
    Database, DeleteOptions, DeleteOutcome, FindOptions, QueryOptions, RestoreOptions,
    SoftDeletable,
};

fn users_model(db: &Database) -> tomblite::softdelete::Model {
    let schema = Schema::new("users", SchemaOptions { soft_delete: true });
    db.register(&schema).unwrap()
}

#[test]
fn default_reads_exclude_deleted_documents() {
    let db = Database::new();
    let users = users_model(&db);
    for name in ["ada", "brin", "cleo"] {
        users.create(doc! {"name": name}, None).unwrap();
    }
    users.soft_delete(&doc! {"name": "brin"}, &DeleteOptions::default()).unwrap();

    let found = users.find(&doc! {}, &FindOptions::default(), &QueryOptions::default());
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|d| matches!(d.data.get_bool("isDeleted"), Ok(false))));
    assert_eq!(users.count(&doc! {}, &QueryOptions::default()), 2);
    assert!(users.find_one(&doc! {"name": "brin"}, &QueryOptions::default()).is_none());
}

#[test]
fn skip_hook_bypasses_the_exclusion() {
    let db = Database::new();
    let users = users_model(&db);
    let created = users.create(doc! {"name": "ada"}, None).unwrap();
    users.soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default()).unwrap();

    assert!(users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).is_none());
    let raw = users.find_one(&doc! {"name": "ada"}, &QueryOptions::raw()).unwrap();
    assert_eq!(raw.id, created.id);
    assert!(raw.data.get_bool("isDeleted").unwrap());

    // Lookups by id behave the same: hidden by default, visible raw.
    let id = created.data.get_str("_id").unwrap().to_string();
    assert!(users.find_one(&doc! {"_id": &id}, &QueryOptions::default()).is_none());
    assert!(users.find_one(&doc! {"_id": &id}, &QueryOptions::raw()).is_some());
}

#[test]
fn soft_delete_then_find_deleted_round_trip() {
    let db = Database::new();
    let users = users_model(&db);
    users.create(doc! {"name": "ada", "team": "core"}, None).unwrap();
    users.create(doc! {"name": "brin", "team": "core"}, None).unwrap();
    users.create(doc! {"name": "cleo", "team": "infra"}, None).unwrap();

    let outcome =
        users.soft_delete(&doc! {"team": "core"}, &DeleteOptions::default()).unwrap();
    assert_eq!(outcome, DeleteOutcome::Count(2));

    assert_eq!(users.count(&doc! {"team": "core"}, &QueryOptions::default()), 0);
    let deleted = users.find_deleted(&doc! {"team": "core"}).unwrap();
    assert_eq!(deleted.len(), 2);
    assert!(deleted.iter().all(|d| d.data.get_bool("isDeleted").unwrap()));
    assert!(deleted.iter().all(|d| d.data.get_datetime("deletedAt").is_ok()));
}

#[test]
fn repeated_soft_delete_does_not_rematch_deleted_documents() {
    let db = Database::new();
    let users = users_model(&db);
    users.create(doc! {"name": "ada"}, None).unwrap();
    assert_eq!(
        users.soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default()).unwrap(),
        DeleteOutcome::Count(1)
    );
    assert_eq!(
        users.soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default()).unwrap(),
        DeleteOutcome::Count(0)
    );
}

#[test]
fn new_doc_returns_the_freshly_deleted_documents() {
    let db = Database::new();
    let users = users_model(&db);
    users.create(doc! {"name": "ada", "team": "core"}, None).unwrap();
    users.create(doc! {"name": "brin", "team": "core"}, None).unwrap();

    let outcome = users
        .soft_delete(
            &doc! {"team": "core"},
            &DeleteOptions { new_doc: true, ..DeleteOptions::default() },
        )
        .unwrap();
    let DeleteOutcome::Documents(docs) = outcome else {
        panic!("expected the document-result shape");
    };
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.data.get_bool("isDeleted").unwrap()));
}

#[test]
fn find_one_and_soft_delete_images() {
    let db = Database::new();
    let users = users_model(&db);
    users.create(doc! {"name": "ada"}, None).unwrap();

    let before = users
        .find_one_and_soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default())
        .unwrap()
        .unwrap();
    assert!(matches!(before.data.get_bool("isDeleted"), Ok(false)));

    users.restore(&doc! {"name": "ada"}, &RestoreOptions::default()).unwrap();
    let after = users
        .find_one_and_soft_delete(
            &doc! {"name": "ada"},
            &DeleteOptions { new_doc: true, ..DeleteOptions::default() },
        )
        .unwrap()
        .unwrap();
    assert!(after.data.get_bool("isDeleted").unwrap());
    assert!(after.data.get_datetime("deletedAt").is_ok());

    // Nothing matches once the only candidate is deleted.
    assert!(users
        .find_one_and_soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default())
        .unwrap()
        .is_none());
}

#[test]
fn restore_clears_deletion_state_and_refreshes_created_at() {
    let db = Database::new();
    let users = users_model(&db);
    let created = users.create(doc! {"name": "ada"}, None).unwrap();
    let created_at = *created.data.get_datetime("createdAt").unwrap();

    users.soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let outcome = users.restore(&doc! {"name": "ada"}, &RestoreOptions::default()).unwrap();
    assert_eq!(outcome.restored, 1);

    let restored = users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).unwrap();
    assert!(matches!(restored.data.get_bool("isDeleted"), Ok(false)));
    assert_eq!(restored.data.get("deletedAt"), Some(&Bson::Null));
    assert!(*restored.data.get_datetime("createdAt").unwrap() > created_at);

    // Restoring again finds no deleted target.
    let again = users.restore(&doc! {"name": "ada"}, &RestoreOptions::default()).unwrap();
    assert_eq!(again.restored, 0);
}

#[test]
fn soft_delete_statics_require_an_enabled_collection() {
    let db = Database::new();
    let schema = Schema::new("audit_log", SchemaOptions::default());
    let hard = db.register(&schema).unwrap();
    hard.create(doc! {"event": "login"}, None).unwrap();

    let err = hard.soft_delete(&doc! {}, &DeleteOptions::default()).unwrap_err();
    assert_eq!(err.category(), "ConfigurationError");
    assert!(hard.find_deleted(&doc! {}).is_err());
    assert!(hard.restore(&doc! {}, &RestoreOptions::default()).is_err());
    assert!(hard.find_one_and_soft_delete(&doc! {}, &DeleteOptions::default()).is_err());

    // And reads on a hard-delete collection are never rewritten.
    assert_eq!(hard.count(&doc! {}, &QueryOptions::default()), 1);
}

#[test]
fn explicit_deleted_filter_passes_through_unrewritten() {
    let db = Database::new();
    let users = users_model(&db);
    users.create(doc! {"name": "ada"}, None).unwrap();
    users.create(doc! {"name": "brin"}, None).unwrap();
    users.soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default()).unwrap();

    let deleted =
        users.find(&doc! {"isDeleted": true}, &FindOptions::default(), &QueryOptions::default());
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].data.get_str("name").unwrap(), "ada");

    // The carve-out is the literal true only: a $ne-false condition is
    // overwritten by the exclusion overlay and finds the live document.
    let truthy = users.find(
        &doc! {"isDeleted": {"$ne": false}},
        &FindOptions::default(),
        &QueryOptions::default(),
    );
    assert_eq!(truthy.len(), 1);
    assert_eq!(truthy[0].data.get_str("name").unwrap(), "brin");
}
