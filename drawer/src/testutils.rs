//! Shared fixtures for drawer tests.

use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use crate::alert::AlertSink;
use crate::config::{
    DrawerConfig, ElementIds, ObservabilityConfig, RetryConfig, SectionIds, StorefrontConfig,
    TimingConfig,
};
use storefront::catalog::UpsellCandidate;
use storefront::routes::RoutePaths;

/// Alert sink that records messages for assertions.
#[derive(Default)]
pub struct RecordingAlertSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlertSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl AlertSink for RecordingAlertSink {
    fn alert(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Config pointing at a mock storefront, defaults everywhere else.
pub fn test_config(base_url: &str) -> DrawerConfig {
    DrawerConfig {
        storefront: StorefrontConfig {
            base_url: Url::parse(base_url).expect("mock server uri parses"),
            routes: RoutePaths::default(),
            retry: RetryConfig::default(),
        },
        sections: SectionIds::default(),
        elements: ElementIds::default(),
        timing: TimingConfig::default(),
        observability: ObservabilityConfig::default(),
    }
}

/// One cart row for fragment building.
pub struct LineFixture {
    pub line: u32,
    pub key: Option<&'static str>,
    pub quantity: u32,
    pub min: u32,
    pub max: Option<u32>,
    pub step: u32,
}

impl LineFixture {
    pub fn new(line: u32, key: Option<&'static str>, quantity: u32) -> Self {
        LineFixture {
            line,
            key,
            quantity,
            min: 1,
            max: None,
            step: 1,
        }
    }
}

pub fn candidate(variant_id: u64, title: &str) -> UpsellCandidate {
    UpsellCandidate {
        variant_id,
        title: title.to_string(),
        url: format!("/products/{title}"),
        image: format!("//cdn.example.com/{variant_id}.jpg"),
        image_alt: None,
        price: "19,99 zł".to_string(),
        compare_at_price: None,
    }
}

/// Renders a drawer section fragment the way the storefront would.
pub fn drawer_fragment(lines: &[LineFixture], pool: &[UpsellCandidate]) -> String {
    let mut rows = String::new();
    for fixture in lines {
        let key_attr = fixture
            .key
            .map(|k| format!(" data-key=\"{k}\""))
            .unwrap_or_default();
        let max_attr = fixture
            .max
            .map(|m| format!(" max=\"{m}\""))
            .unwrap_or_default();
        rows.push_str(&format!(
            concat!(
                "<tr class=\"cart-item\" data-line=\"{line}\"{key}>",
                "<td><input class=\"quantity__input\" data-line=\"{line}\"",
                " value=\"{value}\" min=\"{min}\"{max} step=\"{step}\"></td>",
                "<td><button class=\"remove\" data-line=\"{line}\"{key}>x</button></td>",
                "</tr>"
            ),
            line = fixture.line,
            key = key_attr,
            value = fixture.quantity,
            min = fixture.min,
            max = max_attr,
            step = fixture.step,
        ));
    }
    let pool_json = serde_json::to_string(pool).expect("pool serializes");
    format!(
        concat!(
            "<div class=\"drawer-section\">",
            "<div id=\"CartDrawer\" class=\"drawer\" aria-hidden=\"true\">",
            "<div id=\"CartDrawer-Overlay\"></div>",
            "<table class=\"cart-items\">{rows}</table>",
            "<div id=\"CartDrawer-Upsell\"></div>",
            "<script type=\"application/json\" id=\"sc-upsell-pool\">{pool}</script>",
            "</div>",
            "</div>"
        ),
        rows = rows,
        pool = pool_json,
    )
}

/// Renders a bubble section fragment.
pub fn bubble_fragment(count: u32) -> String {
    format!(
        "<div id=\"cart-icon-bubble\"><span class=\"cart-count\">{count}</span></div>"
    )
}
