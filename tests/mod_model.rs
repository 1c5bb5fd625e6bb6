use bson::{Bson, doc};
use std::sync::Arc;
use tomblite::softdelete::{Schema, SchemaOptions};
use tomblite::{
    Database, DeleteOptions, FindOptions, QueryOptions, ReturnDocument, SoftDeletable,
};

fn seeded() -> (Database, tomblite::softdelete::Model) {
    let db = Database::new();
    let schema = Schema::new("tasks", SchemaOptions { soft_delete: true });
    let tasks = db.register(&schema).unwrap();
    for (title, done) in [("write", false), ("review", false), ("ship", true)] {
        tasks.create(doc! {"title": title, "done": done}, None).unwrap();
    }
    (db, tasks)
}

#[test]
fn create_materializes_soft_delete_defaults() {
    let (_db, tasks) = seeded();
    let d = tasks.find_one(&doc! {"title": "write"}, &QueryOptions::default()).unwrap();
    assert!(matches!(d.data.get_bool("isDeleted"), Ok(false)));
    assert_eq!(d.data.get("deletedAt"), Some(&Bson::Null));
    assert!(d.data.get_datetime("createdAt").is_ok());
    assert_eq!(d.data.get_str("_id").unwrap(), d.id.0.to_string());
}

#[test]
fn hard_delete_collections_get_no_defaults() {
    let db = Database::new();
    let schema = Schema::new("notes", SchemaOptions::default());
    let notes = db.register(&schema).unwrap();
    let d = notes.create(doc! {"text": "hi"}, None).unwrap();
    assert!(d.data.get("isDeleted").is_none());
    assert!(d.data.get("deletedAt").is_none());
    assert!(d.data.get_datetime("createdAt").is_ok());
}

#[test]
fn update_many_only_touches_undeleted_documents() {
    let (_db, tasks) = seeded();
    tasks.soft_delete(&doc! {"title": "ship"}, &DeleteOptions::default()).unwrap();

    let report = tasks
        .update_many(&doc! {}, &doc! {"$set": {"sprint": 7}}, &QueryOptions::default())
        .unwrap();
    assert_eq!(report.modified, 2);

    let ship = tasks.find_one(&doc! {"title": "ship"}, &QueryOptions::raw()).unwrap();
    assert!(ship.data.get("sprint").is_none());
}

#[test]
fn update_one_and_find_one_and_update_respect_the_guard() {
    let (_db, tasks) = seeded();
    tasks.soft_delete(&doc! {"title": "write"}, &DeleteOptions::default()).unwrap();

    let report = tasks
        .update_one(&doc! {"title": "write"}, &doc! {"$set": {"x": 1}}, &QueryOptions::default())
        .unwrap();
    assert_eq!(report.matched, 0);

    let after = tasks
        .find_one_and_update(
            &doc! {"title": "review"},
            &doc! {"$inc": {"attempts": 1}},
            ReturnDocument::After,
            &QueryOptions::default(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(after.data.get_f64("attempts").unwrap(), 1.0);
}

#[test]
fn distinct_skips_deleted_documents() {
    let (_db, tasks) = seeded();
    let all = tasks.distinct("done", &doc! {}, &QueryOptions::default());
    assert_eq!(all.len(), 2);
    tasks.soft_delete(&doc! {"done": true}, &DeleteOptions::default()).unwrap();
    let live = tasks.distinct("done", &doc! {}, &QueryOptions::default());
    assert_eq!(live, vec![Bson::Boolean(false)]);
}

#[test]
fn find_supports_sort_projection_and_paging_through_the_guard() {
    let (_db, tasks) = seeded();
    tasks.soft_delete(&doc! {"title": "review"}, &DeleteOptions::default()).unwrap();
    let opts = FindOptions {
        projection: Some(vec!["title".into()]),
        sort: Some(vec![tomblite::query::SortSpec {
            field: "title".into(),
            order: tomblite::query::Order::Asc,
        }]),
        ..FindOptions::default()
    };
    let docs = tasks.find(&doc! {}, &opts, &QueryOptions::default());
    let titles: Vec<&str> = docs.iter().map(|d| d.data.get_str("title").unwrap()).collect();
    assert_eq!(titles, vec!["ship", "write"]);
    assert!(docs[0].data.get("done").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deletes_and_reads_settle_consistently() {
    let db = Arc::new(Database::new());
    let schema = Schema::new("jobs", SchemaOptions { soft_delete: true });
    let jobs = Arc::new(db.register(&schema).unwrap());
    for i in 0..64 {
        jobs.create(doc! {"n": i}, None).unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..32 {
        let jobs = jobs.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            jobs.soft_delete(&doc! {"n": i}, &DeleteOptions::default()).unwrap();
        }));
    }
    for _ in 0..8 {
        let jobs = jobs.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            // Live count only ever shrinks while deletes are in flight.
            let n = jobs.count(&doc! {}, &QueryOptions::default());
            assert!(n <= 64);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(jobs.count(&doc! {}, &QueryOptions::default()), 32);
    assert_eq!(jobs.find_deleted(&doc! {}).unwrap().len(), 32);
}
