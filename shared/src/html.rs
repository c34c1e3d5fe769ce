//! Tag-level scanning of server-rendered HTML fragments.
//!
//! Section fragments are patched by element id: the drawer swaps its outer
//! markup, the bubble swaps inner markup, and cart lines are rebuilt from
//! data attributes. That only needs tag boundaries, not a DOM, so this walks
//! the markup directly. Comments and raw-text bodies (script, style,
//! textarea, title) are skipped, attribute values are entity-decoded, and an
//! element left unterminated runs to the end of the input.

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// One element located in a fragment, with its markup boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct Element<'a> {
    name: String,
    attrs: Vec<(String, String)>,
    outer: &'a str,
    inner: &'a str,
}

impl<'a> Element<'a> {
    /// Lowercased tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name (names compare case-insensitively), decoded.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Full markup of the element, open tag through close tag.
    pub fn outer_html(&self) -> &'a str {
        self.outer
    }

    /// Markup between the open and close tags. Empty for void elements.
    pub fn inner_html(&self) -> &'a str {
        self.inner
    }
}

/// Finds the first element whose `id` attribute equals `id` exactly.
pub fn find_by_id<'a>(fragment: &'a str, id: &str) -> Option<Element<'a>> {
    let mut scanner = Scanner::new(fragment);
    while let Some(tag) = scanner.next_tag() {
        let Tag::Open(open) = tag else { continue };
        if open.attrs.iter().any(|(n, v)| n == "id" && v == id) {
            return Some(complete(fragment, &mut scanner, open));
        }
    }
    None
}

/// Collects every element carrying the given attribute, nested ones included,
/// in document order.
pub fn elements_with_attr<'a>(fragment: &'a str, attr: &str) -> Vec<Element<'a>> {
    let mut scanner = Scanner::new(fragment);
    let mut found = Vec::new();
    while let Some(tag) = scanner.next_tag() {
        let Tag::Open(open) = tag else { continue };
        if open.attrs.iter().any(|(n, _)| n.eq_ignore_ascii_case(attr)) {
            // Fork so the outer walk resumes right after this open tag and
            // still sees carriers nested inside the element.
            let mut fork = scanner.clone();
            found.push(complete(fragment, &mut fork, open));
        }
    }
    found
}

struct OpenTag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    start: usize,
    end: usize,
}

enum Tag {
    Open(OpenTag),
    Close { name: String, start: usize, end: usize },
}

/// Scans forward from an open tag to the matching close, honoring nesting of
/// the same tag name.
fn complete<'a>(src: &'a str, scanner: &mut Scanner<'a>, open: OpenTag) -> Element<'a> {
    if open.self_closing || VOID_ELEMENTS.contains(&open.name.as_str()) {
        return Element {
            name: open.name,
            attrs: open.attrs,
            outer: &src[open.start..open.end],
            inner: &src[open.end..open.end],
        };
    }

    let mut depth = 1u32;
    let mut inner_end = src.len();
    let mut outer_end = src.len();
    while let Some(tag) = scanner.next_tag() {
        match tag {
            Tag::Open(nested) => {
                if nested.name == open.name
                    && !nested.self_closing
                    && !VOID_ELEMENTS.contains(&nested.name.as_str())
                {
                    depth += 1;
                }
            }
            Tag::Close { name, start, end } => {
                if name == open.name {
                    depth -= 1;
                    if depth == 0 {
                        inner_end = start;
                        outer_end = end;
                        break;
                    }
                }
            }
        }
    }

    Element {
        name: open.name,
        attrs: open.attrs,
        outer: &src[open.start..outer_end],
        inner: &src[open.end..inner_end],
    }
}

#[derive(Clone)]
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    /// Set after an open raw-text tag; the next step jumps to its close tag.
    raw_until: Option<String>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Scanner {
            src,
            pos: 0,
            raw_until: None,
        }
    }

    fn next_tag(&mut self) -> Option<Tag> {
        let bytes = self.src.as_bytes();
        if let Some(name) = self.raw_until.take() {
            self.pos = find_close_tag(self.src, self.pos, &name);
        }
        while self.pos < bytes.len() {
            let Some(lt) = find_byte(bytes, self.pos, b'<') else {
                self.pos = bytes.len();
                return None;
            };
            let rest = &self.src[lt..];
            if rest.starts_with("<!--") {
                self.pos = match self.src[lt + 4..].find("-->") {
                    Some(i) => lt + 4 + i + 3,
                    None => bytes.len(),
                };
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos = match find_byte(bytes, lt + 2, b'>') {
                    Some(i) => i + 1,
                    None => bytes.len(),
                };
                continue;
            }
            if rest.starts_with("</") {
                let name_start = lt + 2;
                let name_end = scan_name(bytes, name_start);
                if name_end == name_start {
                    // Bogus close like "</ >", treated as markup noise.
                    self.pos = match find_byte(bytes, lt + 2, b'>') {
                        Some(i) => i + 1,
                        None => bytes.len(),
                    };
                    continue;
                }
                let name = self.src[name_start..name_end].to_ascii_lowercase();
                let end = match find_byte(bytes, name_end, b'>') {
                    Some(i) => i + 1,
                    None => bytes.len(),
                };
                self.pos = end;
                return Some(Tag::Close {
                    name,
                    start: lt,
                    end,
                });
            }
            if bytes[lt + 1..].first().is_some_and(|b| b.is_ascii_alphabetic()) {
                return Some(Tag::Open(self.scan_open(lt)));
            }
            // Literal '<' in text.
            self.pos = lt + 1;
        }
        None
    }

    fn scan_open(&mut self, start: usize) -> OpenTag {
        let bytes = self.src.as_bytes();
        let name_end = scan_name(bytes, start + 1);
        let name = self.src[start + 1..name_end].to_ascii_lowercase();
        let mut pos = name_end;
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos >= bytes.len() {
                break;
            }
            match bytes[pos] {
                b'>' => {
                    pos += 1;
                    break;
                }
                b'/' if bytes.get(pos + 1) == Some(&b'>') => {
                    self_closing = true;
                    pos += 2;
                    break;
                }
                b'/' => {
                    pos += 1;
                }
                _ => {
                    let attr_start = pos;
                    while pos < bytes.len()
                        && !bytes[pos].is_ascii_whitespace()
                        && !matches!(bytes[pos], b'=' | b'>' | b'/')
                    {
                        pos += 1;
                    }
                    let attr_name = self.src[attr_start..pos].to_ascii_lowercase();
                    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                        pos += 1;
                    }
                    let mut value = String::new();
                    if bytes.get(pos) == Some(&b'=') {
                        pos += 1;
                        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                            pos += 1;
                        }
                        match bytes.get(pos) {
                            Some(&q @ (b'"' | b'\'')) => {
                                pos += 1;
                                let value_start = pos;
                                while pos < bytes.len() && bytes[pos] != q {
                                    pos += 1;
                                }
                                value = decode_entities(&self.src[value_start..pos]);
                                if pos < bytes.len() {
                                    pos += 1;
                                }
                            }
                            _ => {
                                let value_start = pos;
                                while pos < bytes.len()
                                    && !bytes[pos].is_ascii_whitespace()
                                    && bytes[pos] != b'>'
                                {
                                    pos += 1;
                                }
                                value = decode_entities(&self.src[value_start..pos]);
                            }
                        }
                    }
                    if !attr_name.is_empty() {
                        attrs.push((attr_name, value));
                    }
                }
            }
        }

        self.pos = pos;
        if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_until = Some(name.clone());
        }
        OpenTag {
            name,
            attrs,
            self_closing,
            start,
            end: pos,
        }
    }
}

/// Position of the `</name` closing a raw-text element, or end of input.
fn find_close_tag(src: &str, mut from: usize, name: &str) -> usize {
    let bytes = src.as_bytes();
    while from < bytes.len() {
        let Some(lt) = find_byte(bytes, from, b'<') else {
            return bytes.len();
        };
        if bytes.get(lt + 1) == Some(&b'/') {
            let tail = &bytes[lt + 2..];
            if tail.len() >= name.len() && tail[..name.len()].eq_ignore_ascii_case(name.as_bytes())
            {
                match tail.get(name.len()) {
                    None => return lt,
                    Some(&b) if b == b'>' || b == b'/' || b.is_ascii_whitespace() => return lt,
                    _ => {}
                }
            }
        }
        from = lt + 1;
    }
    bytes.len()
}

fn scan_name(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len()
        && (bytes[pos].is_ascii_alphanumeric() || matches!(bytes[pos], b'-' | b':'))
    {
        pos += 1;
    }
    pos
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..].iter().position(|&b| b == needle).map(|i| from + i)
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let mut matched = None;
        for (entity, ch) in [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&#34;", '"'),
            ("&#39;", '\''),
        ] {
            if tail.starts_with(entity) {
                matched = Some((entity.len(), ch));
                break;
            }
        }
        match matched {
            Some((len, ch)) => {
                out.push(ch);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_element_by_id() {
        let html = r#"<div class="page"><p id="greet" class="x">hi</p></div>"#;
        let el = find_by_id(html, "greet").unwrap();
        assert_eq!(el.name(), "p");
        assert_eq!(el.attr("class"), Some("x"));
        assert_eq!(el.inner_html(), "hi");
        assert_eq!(el.outer_html(), r#"<p id="greet" class="x">hi</p>"#);
    }

    #[test]
    fn test_missing_id_is_none() {
        assert!(find_by_id("<div id=\"a\"></div>", "b").is_none());
    }

    #[test]
    fn test_nested_same_tag_tracks_depth() {
        let html = r#"<div id="outer"><div><div>deep</div></div>tail</div><div>after</div>"#;
        let el = find_by_id(html, "outer").unwrap();
        assert_eq!(el.inner_html(), "<div><div>deep</div></div>tail");
    }

    #[test]
    fn test_void_elements_do_not_open_scope() {
        let html = r#"<div id="a"><img src="x.png"><br><input value="3"></div>"#;
        let el = find_by_id(html, "a").unwrap();
        assert_eq!(el.inner_html(), r#"<img src="x.png"><br><input value="3">"#);
    }

    #[test]
    fn test_void_element_has_empty_inner() {
        let html = r#"<p><input id="q" value="2"></p>"#;
        let el = find_by_id(html, "q").unwrap();
        assert_eq!(el.inner_html(), "");
        assert_eq!(el.outer_html(), r#"<input id="q" value="2">"#);
    }

    #[test]
    fn test_comments_and_raw_text_are_skipped() {
        let html = concat!(
            r#"<div id="a">"#,
            "<!-- </div> not a real close -->",
            r#"<script type="text/javascript">var s = "</div>";</script>"#,
            "done</div>"
        );
        let el = find_by_id(html, "a").unwrap();
        assert!(el.inner_html().ends_with("done"));
        assert!(el.inner_html().contains("<script"));
    }

    #[test]
    fn test_json_script_body_is_opaque() {
        let html = r#"<script type="application/json" id="data">[{"a":"<div>"}]</script>"#;
        let el = find_by_id(html, "data").unwrap();
        assert_eq!(el.inner_html(), r#"[{"a":"<div>"}]"#);
    }

    #[test]
    fn test_attribute_forms() {
        let html = r#"<div id=plain data-a='single' data-b="x &amp; y" disabled data-c="&#39;q&#39;">t</div>"#;
        let el = find_by_id(html, "plain").unwrap();
        assert_eq!(el.attr("data-a"), Some("single"));
        assert_eq!(el.attr("data-b"), Some("x & y"));
        assert_eq!(el.attr("disabled"), Some(""));
        assert_eq!(el.attr("data-c"), Some("'q'"));
        assert_eq!(el.attr("nope"), None);
    }

    #[test]
    fn test_tag_and_attr_names_fold_case() {
        let html = r#"<DIV ID="mixed" Data-Line="2">t</DIV>"#;
        let el = find_by_id(html, "mixed").unwrap();
        assert_eq!(el.name(), "div");
        assert_eq!(el.attr("data-line"), Some("2"));
    }

    #[test]
    fn test_unterminated_element_runs_to_end() {
        let html = r#"<div id="a"><span>open"#;
        let el = find_by_id(html, "a").unwrap();
        assert_eq!(el.inner_html(), "<span>open");
        assert_eq!(el.outer_html(), html);
    }

    #[test]
    fn test_elements_with_attr_includes_nested_carriers() {
        let html = concat!(
            r#"<tr data-line="1" data-key="k1"><td>"#,
            r#"<input data-line="1" value="4"></td></tr>"#,
            r#"<tr data-line="2"><td>no input</td></tr>"#
        );
        let found = elements_with_attr(html, "data-line");
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].name(), "tr");
        assert_eq!(found[0].attr("data-key"), Some("k1"));
        assert_eq!(found[1].name(), "input");
        assert_eq!(found[1].attr("value"), Some("4"));
        assert_eq!(found[2].attr("data-line"), Some("2"));
    }

    #[test]
    fn test_self_closing_tag_has_empty_inner() {
        let html = r#"<x-slot id="s"/><p>after</p>"#;
        let el = find_by_id(html, "s").unwrap();
        assert_eq!(el.inner_html(), "");
        assert_eq!(el.outer_html(), r#"<x-slot id="s"/>"#);
    }

    #[test]
    fn test_literal_angle_bracket_in_text() {
        let html = r#"<p id="m">1 < 2 and 3 > 2</p>"#;
        let el = find_by_id(html, "m").unwrap();
        assert_eq!(el.inner_html(), "1 < 2 and 3 > 2");
    }

    #[test]
    fn test_decode_entities_passthrough_unknown() {
        assert_eq!(decode_entities("a &copy; b"), "a &copy; b");
        assert_eq!(decode_entities("no entities"), "no entities");
        assert_eq!(decode_entities("&amp;&lt;&gt;"), "&<>");
    }
}
