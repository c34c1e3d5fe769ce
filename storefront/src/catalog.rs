use serde::{Deserialize, Serialize};

/// One product variant the drawer may offer as an upsell. The candidate pool
/// ships as embedded JSON inside the rendered drawer section.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct UpsellCandidate {
    pub variant_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub compare_at_price: Option<String>,
}

/// Parses an embedded pool payload. Malformed JSON yields an empty pool
/// rather than failing the render cycle.
pub fn parse_pool(raw: &str) -> Vec<UpsellCandidate> {
    match serde_json::from_str(raw.trim()) {
        Ok(pool) => pool,
        Err(err) => {
            tracing::debug!(error = %err, "upsell pool payload is not valid JSON");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_candidate() {
        let raw = r#"[{
            "variant_id": 111,
            "title": "Wool socks",
            "url": "/products/wool-socks",
            "image": "//cdn.example.com/socks.jpg",
            "image_alt": "Grey wool socks",
            "price": "19,99 zł",
            "compare_at_price": "29,99 zł"
        }]"#;
        let pool = parse_pool(raw);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].variant_id, 111);
        assert_eq!(pool[0].compare_at_price.as_deref(), Some("29,99 zł"));
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let pool = parse_pool(r#"[{"variant_id": 5}]"#);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].title, "");
        assert_eq!(pool[0].image_alt, None);
        assert_eq!(pool[0].compare_at_price, None);
    }

    #[test]
    fn test_malformed_payload_is_empty_pool() {
        assert!(parse_pool("not json").is_empty());
        assert!(parse_pool(r#"{"variant_id": 5}"#).is_empty());
        assert!(parse_pool("").is_empty());
    }

    #[test]
    fn test_surrounding_whitespace_is_tolerated() {
        let pool = parse_pool("\n  [{\"variant_id\": 7, \"price\": \"9,99 zł\"}]\n  ");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].price, "9,99 zł");
    }
}
