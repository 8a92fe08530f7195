#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Reads Python literal constants off a syntax tree and renders them the way
//! `str()` would, without evaluating anything.

use tree_sitter::Node;

use super::parser::Parser;

/// A decoded string-like literal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Text {
    /// A `str` literal.
    Str(String),
    /// A `bytes` literal.
    Bytes(Vec<u8>),
}

impl Text {
    /// `str()` of the value.
    fn render(self) -> String {
        match self {
            Text::Str(s) => s,
            Text::Bytes(b) => bytes_repr(&b),
        }
    }
}

/// Named children of `node`, comments excluded.
fn children<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Strips any number of redundant parentheses.
fn unparenthesize(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match children(node).as_slice() {
            [inner] => node = *inner,
            _ => break,
        }
    }
    node
}

/// `str()` of `node` when it is a literal constant; `None` for anything that
/// would need evaluating (names, calls, f-strings, unary minus, ...).
pub fn constant(parser: &Parser, node: Node<'_>) -> Option<String> {
    let node = unparenthesize(node);
    match node.kind() {
        "string" => string_literal(parser.text(node).ok()?).map(Text::render),
        "concatenated_string" => concatenated(parser, node).map(Text::render),
        "integer" | "float" => number(parser.text(node).ok()?),
        "true" => Some("True".to_string()),
        "false" => Some("False".to_string()),
        "none" => Some("None".to_string()),
        "ellipsis" => Some("Ellipsis".to_string()),
        _ => None,
    }
}

/// Elements of a list or tuple display, when `node` is one.
pub fn sequence_items(node: Node<'_>) -> Option<Vec<Node<'_>>> {
    let node = unparenthesize(node);
    match node.kind() {
        "list" | "tuple" | "expression_list" => Some(children(node)),
        _ => None,
    }
}

/// Implicitly concatenated string literals; mixing `str` and `bytes` is not a
/// constant.
fn concatenated(parser: &Parser, node: Node<'_>) -> Option<Text> {
    let mut parts = children(node)
        .into_iter()
        .map(|part| string_literal(parser.text(part).ok()?));

    let mut joined = parts.next()??;
    for part in parts {
        match (&mut joined, part?) {
            (Text::Str(acc), Text::Str(s)) => acc.push_str(&s),
            (Text::Bytes(acc), Text::Bytes(b)) => acc.extend(b),
            _ => return None,
        }
    }
    Some(joined)
}

/// Decodes one string literal including its prefix and quotes.
fn string_literal(text: &str) -> Option<Text> {
    let quote_at = text.find(['\'', '"'])?;
    let prefix = text[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('t') {
        return None;
    }
    let raw = prefix.contains('r');
    let bytes = prefix.contains('b');

    let quoted = &text[quote_at..];
    let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        3
    } else {
        1
    };
    if quoted.len() < 2 * quote_len {
        return None;
    }
    let body = &quoted[quote_len..quoted.len() - quote_len];

    Some(match (raw, bytes) {
        (true, false) => Text::Str(body.to_string()),
        (true, true) => Text::Bytes(body.as_bytes().to_vec()),
        (false, false) => Text::Str(
            unescape(body, true)
                .into_iter()
                .filter_map(|unit| match unit {
                    Unit::Char(c) => Some(c),
                    Unit::Byte(_) => None,
                })
                .collect(),
        ),
        (false, true) => {
            let mut out = Vec::with_capacity(body.len());
            for unit in unescape(body, false) {
                match unit {
                    Unit::Char(c) => {
                        out.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes())
                    }
                    Unit::Byte(b) => out.push(b),
                }
            }
            Text::Bytes(out)
        }
    })
}

/// One decoded element of a literal body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    /// A character, from source text or a `str` escape.
    Char(char),
    /// A raw byte from a `bytes` escape.
    Byte(u8),
}

/// Processes backslash escapes. For `str` literals (`unicode`), numeric
/// escapes name code points and `\u`/`\U` apply; for `bytes` they name bytes.
fn unescape(body: &str, unicode: bool) -> Vec<Unit> {
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(Unit::Char(c));
            continue;
        }
        let Some(next) = chars.next() else {
            out.push(Unit::Char('\\'));
            break;
        };

        match next {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(Unit::Char(next)),
            'a' => out.push(Unit::Char('\u{07}')),
            'b' => out.push(Unit::Char('\u{08}')),
            'f' => out.push(Unit::Char('\u{0c}')),
            'n' => out.push(Unit::Char('\n')),
            'r' => out.push(Unit::Char('\r')),
            't' => out.push(Unit::Char('\t')),
            'v' => out.push(Unit::Char('\u{0b}')),
            '0'..='7' => {
                let mut digits = String::from(next);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                push_code(&mut out, &digits, 8, unicode);
            }
            'x' => push_hex(&mut out, &mut chars, 'x', 2, unicode),
            'u' if unicode => push_hex(&mut out, &mut chars, 'u', 4, unicode),
            'U' if unicode => push_hex(&mut out, &mut chars, 'U', 8, unicode),
            other => {
                out.push(Unit::Char('\\'));
                out.push(Unit::Char(other));
            }
        }
    }
    out
}

/// Consumes exactly `width` hex digits and pushes what they name. Malformed
/// escapes are kept verbatim.
fn push_hex(
    out: &mut Vec<Unit>,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    marker: char,
    width: usize,
    unicode: bool,
) {
    let mut digits = String::new();
    while digits.len() < width {
        match chars.peek() {
            Some(d) if d.is_ascii_hexdigit() => {
                digits.push(*d);
                chars.next();
            }
            _ => break,
        }
    }

    if digits.len() == width {
        push_code(out, &digits, 16, unicode);
    } else {
        out.push(Unit::Char('\\'));
        out.push(Unit::Char(marker));
        out.extend(digits.chars().map(Unit::Char));
    }
}

/// Pushes the code point (or byte) spelled by `digits` in `radix`.
fn push_code(out: &mut Vec<Unit>, digits: &str, radix: u32, unicode: bool) {
    let code = u32::from_str_radix(digits, radix).ok();
    let unit = if unicode {
        code.and_then(char::from_u32).map(Unit::Char)
    } else {
        code.map(|c| Unit::Byte((c & 0xff) as u8))
    };

    match unit {
        Some(unit) => out.push(unit),
        None => {
            out.push(Unit::Char('\\'));
            out.extend(digits.chars().map(Unit::Char));
        }
    }
}

/// `repr()` of a bytes value, which is also its `str()`.
fn bytes_repr(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::from("b");
    out.push(quote);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            _ if b as char == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(quote);
    out
}

/// `str()` of an integer, float or imaginary literal.
fn number(text: &str) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();

    if let Some(imaginary) = cleaned.strip_suffix(['j', 'J']) {
        let value: f64 = imaginary.parse().ok()?;
        let repr = float_repr(value);
        return Some(format!("{}j", repr.strip_suffix(".0").unwrap_or(&repr)));
    }

    let cleaned = cleaned.trim_end_matches(['l', 'L']);
    let lower = cleaned.to_ascii_lowercase();
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };

    if let Some(radix) = radix {
        return u128::from_str_radix(&lower[2..], radix)
            .ok()
            .map(|v| v.to_string());
    }

    if lower.contains(['.', 'e']) {
        return lower.parse::<f64>().ok().map(float_repr);
    }

    // Leading zeros only appear in `0`, `00`, ...; keep arbitrarily large
    // decimals as written.
    match lower.parse::<u128>() {
        Ok(v) => Some(v.to_string()),
        Err(_) => lower
            .chars()
            .all(|c| c.is_ascii_digit())
            .then(|| lower.trim_start_matches('0').to_string())
            .filter(|s| !s.is_empty()),
    }
}

/// `repr()` of a float: shortest round-tripping digits, scientific notation
/// outside `1e-4 <= |x| < 1e16`.
fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .and_then(|(m, e)| e.parse::<i32>().ok().map(|e| (m.to_string(), e)))
        .unwrap_or_else(|| (scientific.clone(), 0));

    if (-4..16).contains(&exponent) {
        let plain = format!("{value}");
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}
