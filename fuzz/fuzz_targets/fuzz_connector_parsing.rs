#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::json;

use tapline::connectors::json_path::JsonPath;
use tapline::connectors::rss::{looks_like_feed, parse_feed};
use tapline::plugins::blocklist::{block_reason, BlocklistConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let doc = json!({
        "a": {"b": [{"c": 1}, {"c": [true, null]}]},
        "list": [1, 2, 3],
        "": "empty-key",
    });
    if let Ok(path) = JsonPath::parse(input) {
        let _ = path.evaluate(&doc);
        // Display output must parse back to an equivalent path
        let reparsed = JsonPath::parse(&path.to_string());
        assert!(reparsed.is_ok(), "display of {:?} did not reparse", input);
    }

    if looks_like_feed(input) {
        let feed = parse_feed(input);
        for item in &feed.items {
            let _ = item.fields();
        }
    }

    let _ = block_reason(input, &BlocklistConfig::strict());
});
