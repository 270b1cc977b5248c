//! Pulling a single-line HTML document out of model output, and rendering
//! one natively when the model produced none.
//!
//! Models answer the HTML step in many shapes: `{"html": …}`, the object
//! nested under `structured_html` or `final_html`, a JSON-quoted string, a
//! fenced block, or a document embedded in prose with escaped newlines.
//! [`extract_html`] accepts all of them and [`clean_html_content`] turns
//! the result into one clean line.

use crate::agent::output::strip_code_fences;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

// ── Extraction ─────────────────────────────────────────────────────

/// Extract one HTML document from raw model output. `None` when the output
/// holds no document.
pub fn extract_html(raw: &str) -> Option<String> {
    let unfenced = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced)
        && let Some(html) = extract_html_value(&value)
    {
        return Some(html);
    }
    find_document(unfenced).map(clean_html_content)
}

/// [`extract_html`] over an already-parsed value.
pub fn extract_html_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => extract_html(s),
        Value::Object(obj) => ["html", "structured_html", "final_html"]
            .iter()
            .filter_map(|key| obj.get(*key))
            .find_map(extract_html_value),
        _ => None,
    }
}

/// The span from `<!DOCTYPE html` (or `<html`) through the last `</html>`.
fn find_document(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("<!doctype html").or_else(|| lower.find("<html"))?;
    let end = lower.rfind("</html>")? + "</html>".len();
    (end > start).then(|| &text[start..end])
}

/// Whether `html` is a complete document: it has a doctype and a closing
/// `</html>`.
pub fn is_complete_document(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    lower.contains("<!doctype html") && lower.contains("</html>")
}

// ── Cleaning ───────────────────────────────────────────────────────

/// Normalize model-produced HTML to a single clean line.
///
/// Strips fences, unquotes a JSON string, turns escaped `\n` `\r` `\t` into
/// spaces, unescapes quotes, backslashes and `\uXXXX`, decodes the basic
/// entities, and collapses whitespace.
pub fn clean_html_content(raw: &str) -> String {
    let mut text = strip_code_fences(raw).to_string();

    if text.starts_with('"')
        && text.ends_with('"')
        && let Ok(unquoted) = serde_json::from_str::<String>(&text)
    {
        text = unquoted;
    }

    let text = unescape(&text);
    let text = decode_entities(&text);
    collapse_whitespace(&text)
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n' | 'r' | 't') => {
                chars.next();
                out.push(' ');
            }
            Some(q @ ('"' | '\'' | '/' | '\\')) => {
                chars.next();
                out.push(q);
            }
            Some('u') => {
                let hex: String = chars.clone().skip(1).take(4).collect();
                let decoded = (hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        for _ in 0..5 {
                            chars.next();
                        }
                        out.push(decoded);
                    }
                    None => out.push('\\'),
                }
            }
            _ => out.push('\\'),
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Sanitizing ─────────────────────────────────────────────────────

struct Sanitizer {
    blocks: Vec<Regex>,
    singles: Vec<Regex>,
    handlers: Regex,
    /// Handlers glued to the closing quote of the previous attribute.
    quoted_handlers: Regex,
    js_urls: Regex,
}

const DANGEROUS_TAGS: [&str; 4] = ["script", "iframe", "object", "embed"];

impl Sanitizer {
    fn build() -> Result<Self, regex::Error> {
        let blocks = DANGEROUS_TAGS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</\s*{tag}\s*>")))
            .collect::<Result<Vec<_>, _>>()?;
        let singles = DANGEROUS_TAGS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?i)</?\s*{tag}\b[^>]*>")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            blocks,
            singles,
            handlers: Regex::new(r#"(?i)[\s/]+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#)?,
            quoted_handlers: Regex::new(r#"(?i)(["'])on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#)?,
            js_urls: Regex::new(
                r#"(?i)\b(href|src|action|formaction)\s*=\s*(?:"\s*javascript:[^"]*"|'\s*javascript:[^']*'|javascript:[^\s>]*)"#,
            )?,
        })
    }

    fn pass(&self, html: &str) -> String {
        let mut out = html.to_string();
        for re in self.blocks.iter().chain(&self.singles) {
            out = re.replace_all(&out, "").into_owned();
        }
        out = self.handlers.replace_all(&out, "").into_owned();
        out = self.quoted_handlers.replace_all(&out, "$1").into_owned();
        self.js_urls.replace_all(&out, "$1=\"#\"").into_owned()
    }
}

static SANITIZER: LazyLock<Option<Sanitizer>> = LazyLock::new(|| Sanitizer::build().ok());

/// Remove `script`/`iframe`/`object`/`embed` elements, `on*` handler
/// attributes and `javascript:` URLs.
pub fn sanitize_html(html: &str) -> String {
    let Some(s) = SANITIZER.as_ref() else {
        return html.to_string();
    };
    let mut out = html.to_string();
    // Removing one tag can splice its neighbours into a new one, so repeat
    // until nothing changes. Every pass that changes the text shortens it
    // or removes a `javascript:` URL.
    loop {
        let next = s.pass(&out);
        if next == out {
            return out;
        }
        out = next;
    }
}

// ── Native rendering ───────────────────────────────────────────────

/// One venue card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Card {
    pub title: String,
    /// Short line under the title, e.g. `"渋谷 / フレンチ"`.
    pub subtitle: String,
    pub description: String,
    pub reason: Option<String>,
    pub tags: Vec<String>,
    pub url: Option<String>,
}

const HEAD_STYLE: &str = "@media (max-width: 768px) { .venue-container { grid-template-columns: 1fr !important; gap: 16px !important; padding: 16px !important; } .venue-card { padding: 16px !important; } }";
const BODY_STYLE: &str = "font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #f8fafc; margin: 0; padding: 20px;";
const HEADING_STYLE: &str = "max-width: 1200px; margin: 0 auto 24px; font-size: 28px; font-weight: bold; color: #1f2937;";
const CONTAINER_STYLE: &str = "display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 24px; max-width: 1200px; margin: 0 auto;";
const CARD_STYLE: &str = "background: white; border-radius: 12px; box-shadow: 0 4px 6px -1px rgba(0, 0, 0, 0.1); padding: 20px; border: 1px solid #e5e7eb;";
const TITLE_STYLE: &str = "font-size: 20px; font-weight: bold; color: #1f2937; margin: 0 0 8px; line-height: 1.3;";
const SUBTITLE_STYLE: &str = "color: #9ca3af; font-size: 13px; margin: 0 0 12px;";
const TEXT_STYLE: &str = "color: #6b7280; margin: 0 0 16px; line-height: 1.6; font-size: 14px;";
const REASON_STYLE: &str = "color: #2563eb; margin: 0 0 12px; font-size: 13px;";
const TAG_STYLE: &str = "display: inline-block; background: #eff6ff; color: #1d4ed8; border-radius: 9999px; padding: 2px 10px; margin: 0 6px 6px 0; font-size: 12px;";
const BUTTON_STYLE: &str = "background-color: #3b82f6; color: white; padding: 8px 16px; border-radius: 6px; font-weight: 500; text-decoration: none; display: inline-block;";

/// Escape text for use in element content and single-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render_card(card: &Card) -> String {
    let mut html = format!(
        "<article class='venue-card' style='{CARD_STYLE}'><h2 style='{TITLE_STYLE}'>{}</h2>",
        escape_html(&card.title)
    );
    if !card.subtitle.is_empty() {
        html.push_str(&format!(
            "<p style='{SUBTITLE_STYLE}'>{}</p>",
            escape_html(&card.subtitle)
        ));
    }
    html.push_str(&format!(
        "<p style='{TEXT_STYLE}'>{}</p>",
        escape_html(&card.description)
    ));
    if let Some(reason) = card.reason.as_deref().filter(|r| !r.is_empty()) {
        html.push_str(&format!(
            "<p style='{REASON_STYLE}'>おすすめ理由: {}</p>",
            escape_html(reason)
        ));
    }
    if !card.tags.is_empty() {
        html.push_str("<div>");
        for tag in &card.tags {
            html.push_str(&format!("<span style='{TAG_STYLE}'>{}</span>", escape_html(tag)));
        }
        html.push_str("</div>");
    }
    if let Some(url) = card
        .url
        .as_deref()
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
    {
        html.push_str(&format!(
            "<a href='{}' target='_blank' rel='noopener' style='{BUTTON_STYLE}'>詳細を見る</a>",
            escape_html(url)
        ));
    }
    html.push_str("</article>");
    html
}

/// A self-contained single-line page with one card per venue.
pub fn render_cards_page(title: &str, cards: &[Card]) -> String {
    let title = escape_html(title);
    let cards: String = cards.iter().map(render_card).collect();
    format!(
        "<!DOCTYPE html><html lang='ja'><head><meta charset='UTF-8'><meta name='viewport' content='width=device-width, initial-scale=1.0'><title>{title}</title><style>{HEAD_STYLE}</style></head><body style=\"{BODY_STYLE}\"><h1 style='{HEADING_STYLE}'>{title}</h1><div class='venue-container' style='{CONTAINER_STYLE}'>{cards}</div></body></html>"
    )
}

/// The static page returned when a search workflow fails.
pub fn fallback_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang='ja'><head><meta charset='UTF-8'><meta name='viewport' content='width=device-width, initial-scale=1.0'><title>検索エラー</title></head><body style=\"{BODY_STYLE}\"><div style='{CARD_STYLE} max-width: 600px; margin: 40px auto; text-align: center;'><h1 style='{TITLE_STYLE}'>申し訳ありません</h1><p style='{TEXT_STYLE}'>{}</p><p style='{SUBTITLE_STYLE}'>しばらくしてからもう一度お試しください。</p></div></body></html>",
        escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = "<!DOCTYPE html><html><body><p>hi</p></body></html>";

    #[test]
    fn extracts_from_every_shape() {
        let shapes = [
            json!({"html": DOC}).to_string(),
            json!({"structured_html": {"html": DOC}}).to_string(),
            json!({"final_html": {"html": DOC}}).to_string(),
            json!(DOC).to_string(),
            format!("```html\n{DOC}\n```"),
            format!("Here is the page:\n{DOC}\nEnjoy!"),
            DOC.to_string(),
        ];
        for shape in &shapes {
            assert_eq!(extract_html(shape).as_deref(), Some(DOC), "shape: {shape}");
        }
    }

    #[test]
    fn extracts_bare_html_tag_without_doctype() {
        let out = extract_html("text <html lang='ja'><body>x</body></html> trailing").unwrap();
        assert_eq!(out, "<html lang='ja'><body>x</body></html>");
    }

    #[test]
    fn no_document_is_none() {
        assert_eq!(extract_html("no html here"), None);
        assert_eq!(extract_html(r#"{"message": "hello"}"#), None);
        assert_eq!(extract_html("</html> before <html>"), None);
    }

    #[test]
    fn cleans_escapes_entities_and_whitespace() {
        let raw = r#"<!DOCTYPE html>\n<html>\t<body class=\"a\">&lt;b&gt; café \\ ok</body>\r\n</html>"#;
        assert_eq!(
            clean_html_content(raw),
            "<!DOCTYPE html> <html> <body class=\"a\"><b> café \\ ok</body> </html>"
        );
    }

    #[test]
    fn cleans_quoted_json_string() {
        let raw = json!("<html>\n  <body>x</body>\n</html>").to_string();
        assert_eq!(clean_html_content(&raw), "<html> <body>x</body> </html>");
    }

    #[test]
    fn invalid_unicode_escape_kept() {
        assert_eq!(clean_html_content(r"a\uZZZZ"), r"a\uZZZZ");
    }

    #[test]
    fn completeness_check() {
        assert!(is_complete_document(DOC));
        assert!(!is_complete_document("<html><body></body></html>"));
        assert!(!is_complete_document("<!DOCTYPE html><html><body>"));
    }

    #[test]
    fn sanitize_removes_active_content() {
        let dirty = "<div onclick=\"steal()\" class='x'><script>alert(1)</script><IFRAME src='x'></IFRAME><embed src='y'><a href=\"javascript:alert(1)\" onmouseover='x()'>link</a></div>";
        let clean = sanitize_html(dirty);
        assert_eq!(clean, "<div class='x'><a href=\"#\">link</a></div>");
    }

    #[test]
    fn sanitize_removes_tags_spliced_by_removal() {
        let dirty = "<p>x</p><scr<embed>ipt>alert(1)</scr<embed>ipt>";
        assert_eq!(sanitize_html(dirty), "<p>x</p>");

        let deep = "<scr<scr<iframe>ipt>ipt>alert(1)</script>";
        assert!(!sanitize_html(deep).to_lowercase().contains("<script"));
    }

    #[test]
    fn sanitize_removes_handlers_after_slash_or_quote() {
        assert_eq!(sanitize_html("<svg/onload=alert(1)>"), "<svg>");
        assert_eq!(
            sanitize_html("<img src=\"x.png\"onerror=\"alert(1)\">"),
            "<img src=\"x.png\">"
        );
    }

    #[test]
    fn sanitize_keeps_safe_markup() {
        let safe = "<p style='color: red'>one</p><a href='https://example.com'>two</a>";
        assert_eq!(sanitize_html(safe), safe);
    }

    #[test]
    fn cards_page_is_single_line_and_escaped() {
        let cards = vec![Card {
            title: "ビストロ <ルミエール>".into(),
            subtitle: "渋谷 / フレンチ".into(),
            description: "落ち着いた雰囲気".into(),
            reason: Some("デートに最適".into()),
            tags: vec!["個室あり".into()],
            url: Some("https://example.com/lumiere".into()),
        }];
        let page = render_cards_page("渋谷のおすすめ", &cards);
        assert!(!page.contains('\n'));
        assert!(is_complete_document(&page));
        assert!(page.contains("ビストロ &lt;ルミエール&gt;"));
        assert!(page.contains("おすすめ理由: デートに最適"));
        assert!(page.contains("href='https://example.com/lumiere'"));
        assert_eq!(sanitize_html(&page), page);
    }

    #[test]
    fn cards_skip_non_http_links() {
        let cards = vec![Card {
            title: "x".into(),
            url: Some("javascript:alert(1)".into()),
            ..Default::default()
        }];
        assert!(!render_cards_page("t", &cards).contains("<a "));
    }

    #[test]
    fn fallback_page_escapes_message() {
        let page = fallback_page("<error>");
        assert!(is_complete_document(&page));
        assert!(page.contains("&lt;error&gt;"));
    }
}
