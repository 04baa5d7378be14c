//! Random request bodies. Sizes are spread over several orders of magnitude
//! so the resulting flows differ in packet counts and byte totals.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};

use crate::web_interface::types::{RegisterRequest, UploadMetadata};

const WORDS: [&str; 16] = [
    "alpha", "bravo", "network", "flow", "packet", "latency", "rust", "server", "client",
    "message", "report", "invoice", "photo", "backup", "sensor", "metrics",
];
const CATEGORIES: [&str; 5] = ["all", "articles", "products", "users", "documents"];
const CONTENT_TYPES: [&str; 5] = [
    "application/pdf",
    "image/png",
    "text/csv",
    "application/zip",
    "application/json",
];
const EXTENSIONS: [&str; 5] = ["pdf", "png", "csv", "zip", "json"];

fn word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or("flow")
}

fn sentence<R: Rng + ?Sized>(rng: &mut R, min_len: usize) -> String {
    let mut text = String::with_capacity(min_len + 16);
    while text.len() < min_len {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(word(rng));
    }
    text
}

pub fn registration<R: Rng + ?Sized>(rng: &mut R) -> RegisterRequest {
    let username = format!("user_{}_{:06}", word(rng), rng.gen_range(0..1_000_000));
    RegisterRequest {
        email: format!("{}@example.com", username),
        password: format!("pw-{:08x}", rng.gen::<u32>()),
        username,
    }
}

/// Message text in one of three size classes: chat line, paragraph, document.
pub fn message_content<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = match rng.gen_range(0..10) {
        0..=5 => rng.gen_range(8..64),
        6..=8 => rng.gen_range(200..800),
        _ => rng.gen_range(2_000..6_000),
    };
    sentence(rng, len)
}

pub fn search_term<R: Rng + ?Sized>(rng: &mut R) -> String {
    let words = rng.gen_range(1..=3);
    (0..words).map(|_| word(rng)).collect::<Vec<_>>().join(" ")
}

pub fn search_category<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    CATEGORIES.choose(rng).copied().unwrap_or("all")
}

pub fn upload_metadata<R: Rng + ?Sized>(rng: &mut R) -> UploadMetadata {
    let kind = rng.gen_range(0..CONTENT_TYPES.len());
    UploadMetadata {
        filename: format!("{}_{}.{}", word(rng), rng.gen_range(1..10_000), EXTENSIONS[kind]),
        size: rng.gen_range(1_024..50 * 1024 * 1024),
        content_type: Some(CONTENT_TYPES[kind].to_string()),
    }
}

/// A JSON object with a random number of fields and optional padding.
pub fn echo_payload<R: Rng + ?Sized>(rng: &mut R) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("name".into(), json!(word(rng)));
    body.insert("value".into(), json!(rng.gen_range(0..1000)));
    for i in 0..rng.gen_range(0..8) {
        body.insert(format!("field_{}", i), json!(rng.gen::<f64>()));
    }
    if rng.gen_bool(0.2) {
        let padding = rng.gen_range(500..4_000);
        body.insert("padding".into(), json!(sentence(rng, padding)));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_registration_username_is_acceptable() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let req = registration(&mut rng);
            assert!(req.username.len() <= 64);
            assert!(req
                .username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_'));
            assert!(!req.password.is_empty());
        }
    }

    #[test]
    fn test_message_sizes_vary() {
        let mut rng = StdRng::seed_from_u64(11);
        let lengths: Vec<usize> = (0..200).map(|_| message_content(&mut rng).len()).collect();
        assert!(lengths.iter().any(|&l| l < 100));
        assert!(lengths.iter().any(|&l| l >= 2_000));
    }

    #[test]
    fn test_echo_payload_has_base_fields() {
        let mut rng = StdRng::seed_from_u64(5);
        let body = echo_payload(&mut rng);
        assert!(body.contains_key("name"));
        assert!(body.contains_key("value"));
    }
}
