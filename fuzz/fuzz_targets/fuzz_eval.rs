#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(s) {
            if let Ok(bson::Bson::Document(filter)) = bson::Bson::try_from(json) {
                // A few docs covering scalar, nested and flagged shapes
                let docs = [
                    bson::doc!{"a": 1, "b": 2, "name": "x"},
                    bson::doc!{"a": 10, "b": -5, "name": "y", "nested": {"z": 3}},
                    bson::doc!{"isDeleted": true, "deletedAt": bson::DateTime::now()},
                ];
                for d in &docs {
                    let _ = tomblite::query::matches_filter(d, &filter);
                }
            }
        }
    }
});
