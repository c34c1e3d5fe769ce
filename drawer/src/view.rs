use std::collections::BTreeMap;

use crate::config::ElementIds;
use shared::html;
use storefront::catalog::{self, UpsellCandidate};

/// One cart row, rebuilt from the drawer markup's data attributes after
/// every refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct CartLine {
    /// 1-based row index, the positional address
    pub line: u32,
    /// Stable line key, when the storefront renders one
    pub key: Option<String>,
    pub quantity: u32,
    pub min: u32,
    /// `None` means unbounded
    pub max: Option<u32>,
    pub step: u32,
}

impl CartLine {
    /// Quantity after one step up, capped at `max`.
    pub fn incremented(&self) -> u32 {
        self.cap(self.quantity.saturating_add(self.step))
    }

    /// Quantity after one step down, floored at `min` and capped at `max`.
    pub fn decremented(&self) -> u32 {
        self.cap(self.quantity.saturating_sub(self.step).max(self.min))
    }

    /// A directly requested quantity, clamped into the row's bounds.
    pub fn clamped(&self, requested: u32) -> u32 {
        self.cap(requested.max(self.min))
    }

    fn cap(&self, quantity: u32) -> u32 {
        match self.max {
            Some(max) => quantity.min(max),
            None => quantity,
        }
    }
}

/// Contents of the upsell slot as currently rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct UpsellSlot {
    pub url: String,
    pub image: String,
    pub image_alt: String,
    pub title: String,
    pub price: String,
    /// Struck-through price next to the final one; `None` hides it.
    pub compare_at_price: Option<String>,
    /// Variant the add control submits.
    pub add_variant_id: u64,
}

/// Declarative model of everything the drawer shows. Server-rendered
/// fragments stay the source of truth for markup; the view holds the latest
/// fragment per slot plus the state toggles a host renders from, so nothing
/// has to be re-bound after a refresh.
#[derive(Clone, Debug)]
pub struct DrawerView {
    ids: ElementIds,
    drawer: Option<String>,
    bubble: Option<String>,
    lines: Vec<CartLine>,
    upsell: Option<UpsellSlot>,
    open: bool,
    scroll_locked: bool,
    focused: bool,
    submit_busy: bool,
    upsell_busy: bool,
}

impl DrawerView {
    pub fn new(ids: ElementIds) -> Self {
        DrawerView {
            ids,
            drawer: None,
            bubble: None,
            lines: Vec::new(),
            upsell: None,
            open: false,
            scroll_locked: false,
            focused: false,
            submit_busy: false,
            upsell_busy: false,
        }
    }

    /// Swaps the drawer container for the one in `fragment` and rebuilds the
    /// cart lines. Returns false, changing nothing, when the fragment holds
    /// no drawer container.
    pub fn patch_drawer(&mut self, fragment: &str) -> bool {
        let Some(el) = html::find_by_id(fragment, &self.ids.drawer) else {
            return false;
        };
        self.drawer = Some(el.outer_html().to_string());
        self.reconcile_lines();
        true
    }

    /// Swaps the bubble's inner markup for the one in `fragment`.
    pub fn patch_bubble(&mut self, fragment: &str) -> bool {
        let Some(el) = html::find_by_id(fragment, &self.ids.bubble) else {
            return false;
        };
        self.bubble = Some(el.inner_html().to_string());
        true
    }

    fn reconcile_lines(&mut self) {
        let Some(drawer) = self.drawer.as_deref() else {
            self.lines.clear();
            return;
        };
        let mut lines: BTreeMap<u32, CartLine> = BTreeMap::new();
        for el in html::elements_with_attr(drawer, "data-line") {
            let Some(line) = el.attr("data-line").and_then(|v| v.trim().parse().ok()) else {
                continue;
            };
            let entry = lines.entry(line).or_insert_with(|| CartLine {
                line,
                key: None,
                quantity: 1,
                min: 1,
                max: None,
                step: 1,
            });
            if el.name() == "input" {
                entry.quantity = parse_or(el.attr("value"), 1);
                entry.min = parse_or(el.attr("min"), 1);
                entry.step = parse_or(el.attr("step"), 1);
                entry.max = el.attr("max").and_then(|v| v.trim().parse().ok());
            }
            if let Some(key) = el.attr("data-key").filter(|k| !k.is_empty()) {
                // The quantity input's key wins over the row's.
                if el.name() == "input" || entry.key.is_none() {
                    entry.key = Some(key.to_string());
                }
            }
        }
        self.lines = lines.into_values().collect();
    }

    /// Pool payload embedded in the current drawer markup, re-read on every
    /// render cycle so a fresh fragment supplies fresh candidates.
    pub fn upsell_pool(&self) -> Vec<UpsellCandidate> {
        let Some(drawer) = self.drawer.as_deref() else {
            return Vec::new();
        };
        match html::find_by_id(drawer, &self.ids.upsell_pool) {
            Some(el) => catalog::parse_pool(el.inner_html()),
            None => Vec::new(),
        }
    }

    /// Writes a candidate into the upsell slot. The compare-at price is
    /// kept only when it exists and differs from the final price.
    pub fn render_upsell(&mut self, pick: &UpsellCandidate) {
        let compare_at = pick
            .compare_at_price
            .clone()
            .filter(|compare| compare != &pick.price);
        self.upsell = Some(UpsellSlot {
            url: pick.url.clone(),
            image: pick.image.clone(),
            image_alt: pick.image_alt.clone().unwrap_or_else(|| pick.title.clone()),
            title: pick.title.clone(),
            price: pick.price.clone(),
            compare_at_price: compare_at,
            add_variant_id: pick.variant_id,
        });
    }

    /// Applies the open state. Opening focuses the drawer and locks page
    /// scroll; closing releases both. Idempotent either way. A view that has
    /// never seen a drawer fragment stays inert and reports false.
    pub fn set_open(&mut self, open: bool) -> bool {
        if self.drawer.is_none() {
            return false;
        }
        self.open = open;
        self.scroll_locked = open;
        self.focused = open;
        true
    }

    pub fn set_submit_busy(&mut self, busy: bool) {
        self.submit_busy = busy;
    }

    pub fn set_upsell_busy(&mut self, busy: bool) {
        self.upsell_busy = busy;
    }

    pub fn has_drawer(&self) -> bool {
        self.drawer.is_some()
    }

    pub fn has_bubble(&self) -> bool {
        self.bubble.is_some()
    }

    /// Latest drawer container markup, outer HTML.
    pub fn drawer_html(&self) -> Option<&str> {
        self.drawer.as_deref()
    }

    /// Latest bubble markup, inner HTML.
    pub fn bubble_html(&self) -> Option<&str> {
        self.bubble.as_deref()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, line: u32) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line == line)
    }

    pub fn upsell(&self) -> Option<&UpsellSlot> {
        self.upsell.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// ARIA mirror of the open state.
    pub fn aria_hidden(&self) -> bool {
        !self.open
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_submit_busy(&self) -> bool {
        self.submit_busy
    }

    pub fn is_upsell_busy(&self) -> bool {
        self.upsell_busy
    }
}

fn parse_or(value: Option<&str>, fallback: u32) -> u32 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}
