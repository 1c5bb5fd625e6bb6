#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(s) {
            if let Ok(bson::Bson::Array(stages)) = bson::Bson::try_from(json) {
                let pipeline: Vec<bson::Document> = stages
                    .into_iter()
                    .filter_map(|s| match s {
                        bson::Bson::Document(d) => Some(d),
                        _ => None,
                    })
                    .collect();
                let rewritten = tomblite::softdelete::rewrite_pipeline(&pipeline);
                // Insertions only: the rewrite never drops a stage.
                assert!(rewritten.len() >= pipeline.len());
            }
        }
    }
});
