//! Block-style YAML dump of a [`SafeValue`].
//!
//! Layout: 4-space indent, sequences inside mappings are not indented further
//! (`-   ` items sit at the key's column), mapping keys keep insertion order,
//! non-ASCII text is written as-is, long plain strings fold at 80 columns and
//! multi-line strings use literal blocks.

use super::SafeValue;

const INDENT: usize = 4;
const WIDTH: usize = 80;
const ITEM: &str = "-   ";

/// Dump `value` as a block-style YAML document.
pub fn to_block_yaml(value: &SafeValue) -> String {
    let mut emitter = Emitter { out: String::new() };
    match value {
        SafeValue::Object(map) if !map.is_empty() => emitter.mapping(map, 0, false),
        SafeValue::Array(items) if !items.is_empty() => emitter.sequence(items, 0, false),
        scalar => {
            emitter.scalar(scalar, 0, 0);
            // An open-ended plain scalar document needs an explicit end marker.
            if matches!(scalar, SafeValue::String(s) if is_plain(s)) {
                emitter.out.push_str("...\n");
            }
        }
    }
    emitter.out
}

struct Emitter {
    out: String,
}

impl Emitter {
    fn pad(&mut self, col: usize) {
        self.out.extend(std::iter::repeat(' ').take(col));
    }

    fn mapping(&mut self, map: &serde_json::Map<String, SafeValue>, col: usize, inline_first: bool) {
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 || !inline_first {
                self.pad(col);
            }
            let key = render_key(key);
            self.out.push_str(&key);
            self.out.push(':');
            match value {
                SafeValue::Object(inner) if !inner.is_empty() => {
                    self.out.push('\n');
                    self.mapping(inner, col + INDENT, false);
                }
                SafeValue::Array(items) if !items.is_empty() => {
                    self.out.push('\n');
                    self.sequence(items, col, false);
                }
                scalar => {
                    self.out.push(' ');
                    let start = col + key.chars().count() + 2;
                    self.scalar(scalar, col, start);
                }
            }
        }
    }

    fn sequence(&mut self, items: &[SafeValue], col: usize, inline_first: bool) {
        let inner = col + INDENT;
        for (i, item) in items.iter().enumerate() {
            if i > 0 || !inline_first {
                self.pad(col);
            }
            self.out.push_str(ITEM);
            match item {
                SafeValue::Object(map) if !map.is_empty() => self.mapping(map, inner, true),
                SafeValue::Array(nested) if !nested.is_empty() => {
                    self.sequence(nested, inner, true)
                }
                scalar => self.scalar(scalar, col, inner),
            }
        }
    }

    /// Writes a scalar starting at column `start`, including the trailing newline.
    /// Continuation lines and block bodies go one indent step past `parent`.
    fn scalar(&mut self, value: &SafeValue, parent: usize, start: usize) {
        let body_col = parent + INDENT;
        match value {
            SafeValue::Null => self.out.push_str("null"),
            SafeValue::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            SafeValue::Number(n) => self.out.push_str(&n.to_string()),
            SafeValue::Object(_) => self.out.push_str("{}"),
            SafeValue::Array(_) => self.out.push_str("[]"),
            SafeValue::String(s) if is_plain(s) => self.folded_plain(s, start, body_col),
            SafeValue::String(s) if is_literal_block(s) => {
                self.literal_block(s, body_col);
                return;
            }
            SafeValue::String(s) => self.out.push_str(&quoted(s)),
        }
        self.out.push('\n');
    }

    fn folded_plain(&mut self, s: &str, start: usize, cont_col: usize) {
        let mut col = start;
        let mut prev_empty = true;
        for (i, word) in s.split(' ').enumerate() {
            let len = word.chars().count();
            if i == 0 {
                self.out.push_str(word);
                col += len;
            } else if col + 1 + len > WIDTH && can_break_before(word) && !prev_empty {
                self.out.push('\n');
                self.pad(cont_col);
                self.out.push_str(word);
                col = cont_col + len;
            } else {
                self.out.push(' ');
                self.out.push_str(word);
                col += 1 + len;
            }
            prev_empty = word.is_empty();
        }
    }

    fn literal_block(&mut self, s: &str, body_col: usize) {
        let trailing = s.len() - s.trim_end_matches('\n').len();
        let (indicator, body) = match trailing {
            0 => ("|-", s),
            1 => ("|", &s[..s.len() - 1]),
            _ => ("|+", &s[..s.len() - 1]),
        };
        self.out.push_str(indicator);
        self.out.push('\n');
        for line in body.split('\n') {
            if !line.is_empty() {
                self.pad(body_col);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }
}

fn render_key(key: &str) -> String {
    if is_plain(key) {
        key.to_string()
    } else {
        quoted(key)
    }
}

fn quoted(s: &str) -> String {
    if s.chars().any(needs_escape) {
        double_quoted(s)
    } else {
        format!("'{}'", s.replace('\'', "''"))
    }
}

/// Characters a YAML reader rejects or reads as a line break when written raw.
fn needs_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}')
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if needs_escape(c) => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn can_break_before(word: &str) -> bool {
    match word.chars().next() {
        None => false,
        Some(c) => !"#-?:,[]{}&*!|>'\"%@`".contains(c),
    }
}

fn is_literal_block(s: &str) -> bool {
    if !s.contains('\n') || s.chars().any(|c| needs_escape(c) && c != '\n') {
        return false;
    }
    // Indentation of a literal block is taken from its first non-empty line.
    match s.split('\n').find(|l| !l.is_empty()) {
        Some(first) => !first.starts_with(' '),
        None => false,
    }
}

/// True when `s` can be written without quotes and still read back as the same string.
fn is_plain(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };
    if "-?:,[]{}#&*!|>'\"%@` ".contains(first) {
        return false;
    }
    if s.ends_with(' ') || s.ends_with(':') {
        return false;
    }
    if s.contains(": ") || s.contains(" #") || s.chars().any(needs_escape) {
        return false;
    }
    !resolves_to_non_string(s)
}

/// Scalars a YAML reader would turn into null, bool, number or timestamp.
fn resolves_to_non_string(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "~" | "null" | "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n"
    ) {
        return true;
    }
    if matches!(lower.as_str(), ".inf" | "-.inf" | "+.inf" | ".nan") {
        return true;
    }
    let digits = s.replace('_', "");
    if digits.parse::<f64>().is_ok() {
        return true;
    }
    if lower.starts_with("0x") || lower.starts_with("0o") || lower.starts_with("0b") {
        return true;
    }
    // ISO dates and datetimes: YYYY-MM-DD...
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5].is_ascii_digit()
}
