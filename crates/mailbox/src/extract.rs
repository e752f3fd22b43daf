use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use tracing::debug;

/// Context-aware code patterns, most specific first. The sender wraps the
/// code in one of a few known phrasings; a bare six-digit fallback runs last.
const CODE_PATTERNS: [&str; 5] = [
    r"(?i)(?:verification\s+code\s*(?:is)?|code\s*(?:is)?)\s*:?\s*(\d{6})\b",
    r"(?i)enter\s+(?:this\s+|the\s+)?code\s*:?\s*(\d{6})\b",
    r"(?i)one-time\s+(?:password|code)\s*(?:is)?\s*:?\s*(\d{6})\b",
    r">(\d{6})<",
    r"(?m)^\s*(\d{6})\s*$",
];

/// Extract a six-digit verification code from raw message content.
///
/// The content may be full RFC 822 text: headers are skipped, a
/// `text/plain` MIME part is preferred over `text/html`, and Base64 or
/// Quoted-Printable transfer encodings are undone before matching. A
/// caller-supplied pattern takes precedence over the built-ins.
pub fn extract_code(raw: &str, pattern: Option<&Regex>) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let body = recover_body(raw);

    if let Some(custom) = pattern {
        if let Some(caps) = custom.captures(&body) {
            let code = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string());
            if let Some(code) = code {
                return Some(code);
            }
        }
    }

    for source in CODE_PATTERNS {
        let re = match Regex::new(source) {
            Ok(re) => re,
            Err(_) => continue,
        };
        for caps in re.captures_iter(&body) {
            if let Some(code) = caps.get(1).map(|m| m.as_str()) {
                if !is_degenerate(code) {
                    debug!(code, pattern = source, "matched verification code");
                    return Some(code.to_string());
                }
            }
        }
    }

    // Last resort: any six-digit token in the body.
    if let Ok(re) = Regex::new(r"\b\d{6}\b") {
        for m in re.find_iter(&body) {
            if !is_degenerate(m.as_str()) {
                debug!(code = m.as_str(), "fallback-matched verification code");
                return Some(m.as_str().to_string());
            }
        }
    }

    None
}

/// Strip message headers, pick the best MIME part, undo transfer encodings.
fn recover_body(raw: &str) -> String {
    let mut body = raw.to_string();

    // Everything after the first blank line is the message body.
    if let Ok(re) = Regex::new(r"(?s)\r?\n\r?\n(.*)") {
        if let Some(caps) = re.captures(raw) {
            let after_headers = caps.get(1).map(|m| m.as_str()).unwrap_or(raw);

            let plain = part_body(after_headers, "text/plain");
            let html = part_body(after_headers, "text/html");

            body = plain
                .or(html)
                .unwrap_or_else(|| after_headers.to_string());
        }
    }

    if let Some(decoded) = try_base64_decode(&body) {
        body = decoded;
    }

    decode_quoted_printable(&body)
}

/// Body of the first MIME part with the given content type, bounded by the
/// next `--` boundary marker.
fn part_body(content: &str, content_type: &str) -> Option<String> {
    let source = format!(
        r"(?is)content-type:\s*{}.*?\r?\n\r?\n(.*?)--",
        regex::escape(content_type)
    );
    let re = Regex::new(&source).ok()?;
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Decode the body if it is entirely Base64 alphabet (a common transfer
/// encoding for these messages). Anything else passes through untouched.
fn try_base64_decode(body: &str) -> Option<String> {
    let re = Regex::new(r"^[A-Za-z0-9+/=\r\n]+$").ok()?;
    if body.is_empty() || !re.is_match(body) {
        return None;
    }

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

/// Undo Quoted-Printable: drop soft line breaks, decode `=XX` escapes.
/// A no-op on bodies that never used the encoding; an `=` followed by
/// anything but two ASCII hex digits is copied through literally.
fn decode_quoted_printable(body: &str) -> String {
    let unfolded = body.replace("=\r\n", "").replace("=\n", "");

    let bytes = unfolded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if let Some(hex) = bytes.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok())
            {
                if hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    if let Ok(byte) = u8::from_str_radix(hex, 16) {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Six identical digits never come from a real code generator.
fn is_degenerate(code: &str) -> bool {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let first = code.chars().next().unwrap();
    code.chars().all(|c| c == first)
}
