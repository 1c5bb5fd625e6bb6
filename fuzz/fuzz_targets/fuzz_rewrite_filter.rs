#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(s) {
            if let Ok(bson::Bson::Document(filter)) = bson::Bson::try_from(json) {
                let rewritten = tomblite::softdelete::rewrite_filter(&filter);
                // The rewrite must never panic and always leaves the filter
                // either pinned to deleted or carrying the exclusion overlay.
                let pinned = tomblite::softdelete::pins_deleted(&filter);
                if pinned {
                    assert_eq!(rewritten, filter);
                } else {
                    assert_eq!(
                        rewritten.get_document("isDeleted").ok(),
                        Some(&bson::doc!{"$ne": true})
                    );
                }
            }
        }
    }
});
