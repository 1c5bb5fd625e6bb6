use tomblite::logger;

#[test]
fn configure_logging_creates_rolling_files() {
    let dir = tempfile::tempdir().unwrap();
    logger::configure_logging(Some(dir.path()), Some("debug"), Some(2)).unwrap();
    log::info!("logger smoke test");
    log::info!(target: "tomblite::audit", "audit smoke test");
    assert!(dir.path().join("app.log").exists());
    assert!(dir.path().join("audit.log").exists());

    // Re-initialization keeps the first config and does not error.
    let other = tempfile::tempdir().unwrap();
    logger::configure_logging(Some(other.path()), None, None).unwrap();
}
