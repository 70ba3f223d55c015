//! Unit tests for response handling

use gen_negotiator::response::{base64, ImageEntry, RAW_BASE64_MIN_LEN};
use serde_json::json;

#[test]
fn test_base64_encode_decode() {
    let original = b"Hello, World!";
    let encoded = base64::encode(original);
    let decoded = base64::decode(&encoded).unwrap();

    assert_eq!(original.as_slice(), decoded.as_slice());
}

#[test]
fn test_data_url_round_trip_is_exact() {
    let bytes: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
    let data_url = base64::create_data_url(&bytes, "png");

    assert!(data_url.starts_with("data:image/png;base64,"));
    assert_eq!(base64::decode_data_url(&data_url).unwrap(), bytes);
}

#[test]
fn test_data_url_splits_at_first_comma() {
    // Anything after the first comma is payload
    let decoded = base64::decode_data_url("data:image/png;base64,SGVsbG8s").unwrap();
    assert_eq!(decoded, b"Hello,");
}

#[test]
fn test_classification_order() {
    let long = "Q".repeat(RAW_BASE64_MIN_LEN + 1);

    assert_eq!(
        ImageEntry::classify(&json!("data:image/png;base64,AAAA")),
        ImageEntry::DataUrl("data:image/png;base64,AAAA".into())
    );
    assert_eq!(ImageEntry::classify(&json!(long)), ImageEntry::RawBase64(long.clone()));
    assert_eq!(
        ImageEntry::classify(&json!("View/local/raw/a.png")),
        ImageEntry::ServerPath("View/local/raw/a.png".into())
    );
    assert_eq!(
        ImageEntry::classify(&json!("/Output/a.png")),
        ImageEntry::ServerPath("/Output/a.png".into())
    );
}

#[test]
fn test_long_path_is_not_raw_base64() {
    let path = format!("View/local/raw/{}.png", "x".repeat(RAW_BASE64_MIN_LEN));
    assert_eq!(ImageEntry::classify(&json!(path)), ImageEntry::ServerPath(path.clone()));
}

#[test]
fn test_unrecognized_entry_keeps_short_preview() {
    let entry = ImageEntry::classify(&json!(format!("relative/{}", "z".repeat(300))));
    match entry {
        ImageEntry::Unrecognized(preview) => assert_eq!(preview.chars().count(), 100),
        other => panic!("expected unrecognized entry, got {:?}", other),
    }
    assert!(matches!(ImageEntry::classify(&json!(42)), ImageEntry::Unrecognized(_)));
}
