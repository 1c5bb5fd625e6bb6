use bson::doc;
use tomblite::softdelete::{Schema, SchemaOptions};
use tomblite::{Database, DeleteOptions, QueryOptions, RestoreOptions, SoftDeletable};

fn setup() -> (Database, tomblite::softdelete::Model) {
    let db = Database::new();
    let users = db.register(&Schema::new("users", SchemaOptions { soft_delete: true })).unwrap();
    users.create(doc! {"name": "ada"}, None).unwrap();
    (db, users)
}

#[test]
fn aborted_soft_delete_rolls_back_to_live() {
    let (db, users) = setup();
    let session = db.start_session();
    users
        .soft_delete(
            &doc! {"name": "ada"},
            &DeleteOptions { session: Some(&session), new_doc: false },
        )
        .unwrap();
    assert!(users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).is_none());

    session.abort_transaction().unwrap();
    let d = users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).unwrap();
    assert!(matches!(d.data.get_bool("isDeleted"), Ok(false)));
}

#[test]
fn committed_soft_delete_stands() {
    let (db, users) = setup();
    let session = db.start_session();
    users
        .soft_delete(
            &doc! {"name": "ada"},
            &DeleteOptions { session: Some(&session), new_doc: false },
        )
        .unwrap();
    session.commit_transaction().unwrap();
    assert!(users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).is_none());
    assert_eq!(users.find_deleted(&doc! {}).unwrap().len(), 1);
}

#[test]
fn aborted_restore_leaves_the_document_deleted() {
    let (db, users) = setup();
    users.soft_delete(&doc! {"name": "ada"}, &DeleteOptions::default()).unwrap();

    let session = db.start_session();
    users
        .restore(&doc! {"name": "ada"}, &RestoreOptions { session: Some(&session) })
        .unwrap();
    assert!(users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).is_some());

    session.abort_transaction().unwrap();
    assert!(users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).is_none());
    let deleted = users.find_deleted(&doc! {"name": "ada"}).unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].data.get_datetime("deletedAt").is_ok());
}

#[test]
fn multi_step_sequences_roll_back_together() {
    let (db, users) = setup();
    users.create(doc! {"name": "brin"}, None).unwrap();

    let session = db.start_session();
    let opts = QueryOptions::in_session(&session);
    users.update_many(&doc! {}, &doc! {"$set": {"team": "core"}}, &opts).unwrap();
    users
        .soft_delete(&doc! {"name": "brin"}, &DeleteOptions { session: Some(&session), new_doc: false })
        .unwrap();
    session.abort_transaction().unwrap();

    assert_eq!(users.count(&doc! {}, &QueryOptions::default()), 2);
    assert_eq!(users.count(&doc! {"team": "core"}, &QueryOptions::default()), 0);
}

#[test]
fn dropping_an_active_session_with_writes_aborts_it() {
    let (db, users) = setup();
    {
        let session = db.start_session();
        users
            .soft_delete(
                &doc! {"name": "ada"},
                &DeleteOptions { session: Some(&session), new_doc: false },
            )
            .unwrap();
    }
    assert!(users.find_one(&doc! {"name": "ada"}, &QueryOptions::default()).is_some());
}

#[test]
fn writes_against_a_finished_session_are_rejected() {
    let (db, users) = setup();
    let session = db.start_session();
    session.commit_transaction().unwrap();
    let err = users
        .soft_delete(
            &doc! {"name": "ada"},
            &DeleteOptions { session: Some(&session), new_doc: false },
        )
        .unwrap_err();
    // The store failure is re-raised across the soft-delete boundary with
    // its category label.
    assert_eq!(err.category(), "StoreOperationError");
    assert!(err.to_string().contains("SessionError"));
}
