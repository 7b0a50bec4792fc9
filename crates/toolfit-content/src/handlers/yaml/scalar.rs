//! YAML scalar typing and quoting (core schema)

use std::sync::LazyLock;

use regex::Regex;

use crate::value::Scalar;

static INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+$").expect("valid regex"));
static OCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0o[0-7]+$").expect("valid regex"));
static HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").expect("valid regex"));
static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$").expect("valid regex")
});
static INF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\.(inf|Inf|INF)$").expect("valid regex"));
static NAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.(nan|NaN|NAN)$").expect("valid regex"));

/// Resolve an unquoted scalar token to its typed value.
pub(crate) fn resolve_plain(token: &str) -> Scalar {
    match token {
        "" | "~" | "null" | "Null" | "NULL" => return Scalar::Null,
        "true" | "True" | "TRUE" => return Scalar::Bool(true),
        "false" | "False" | "FALSE" => return Scalar::Bool(false),
        _ => {}
    }

    if INT.is_match(token) {
        if let Ok(i) = token.parse::<i64>() {
            return Scalar::Integer(i);
        }
        if let Ok(f) = token.parse::<f64>() {
            return Scalar::Float(f);
        }
    }
    if OCT.is_match(token)
        && let Ok(i) = i64::from_str_radix(&token[2..], 8)
    {
        return Scalar::Integer(i);
    }
    if HEX.is_match(token)
        && let Ok(i) = i64::from_str_radix(&token[2..], 16)
    {
        return Scalar::Integer(i);
    }
    if FLOAT.is_match(token)
        && let Ok(f) = token.parse::<f64>()
    {
        return Scalar::Float(f);
    }
    if INF.is_match(token) {
        return Scalar::Float(if token.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    if NAN.is_match(token) {
        return Scalar::Float(f64::NAN);
    }

    Scalar::String(token.to_string())
}

/// Parse a quoted scalar starting at `at` (on the opening quote) and ending
/// before `limit`. Returns the value and the offset after the closing quote.
pub(crate) fn parse_quoted(src: &str, at: usize, limit: usize) -> Result<(String, usize), String> {
    let text = &src[at..limit];
    let mut chars = text.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"'))) => q,
        _ => return Err("expected a quoted scalar".to_string()),
    };
    let mut value = String::new();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            ('\'', '\'') => {
                if text[i + 1..].starts_with('\'') {
                    value.push('\'');
                    chars.next();
                } else {
                    return Ok((value, at + i + 1));
                }
            }
            ('"', '"') => return Ok((value, at + i + 1)),
            ('"', '\\') => {
                let Some((_, escape)) = chars.next() else {
                    break;
                };
                match escape {
                    'n' => value.push('\n'),
                    't' | '\t' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    'a' => value.push('\u{07}'),
                    'b' => value.push('\u{08}'),
                    'e' => value.push('\u{1b}'),
                    'f' => value.push('\u{0c}'),
                    'v' => value.push('\u{0b}'),
                    'N' => value.push('\u{85}'),
                    '_' => value.push('\u{a0}'),
                    'L' => value.push('\u{2028}'),
                    'P' => value.push('\u{2029}'),
                    ' ' | '"' | '\\' | '/' => value.push(escape),
                    'x' | 'u' | 'U' => {
                        let width = match escape {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let mut hex = String::new();
                        for _ in 0..width {
                            match chars.next() {
                                Some((_, h)) => hex.push(h),
                                None => return Err("truncated escape sequence".to_string()),
                            }
                        }
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| format!("invalid escape \\{escape}{hex}"))?;
                        value.push(code);
                    }
                    other => return Err(format!("invalid escape \\{other}")),
                }
            }
            _ => value.push(c),
        }
    }

    Err("unterminated quoted scalar (multi-line quoted scalars are not supported)".to_string())
}

const INDICATORS: &str = "!&*|>'\"%@`#,[]{}?:-";

/// Whether a string can be written unquoted and still read back as the same string.
pub(crate) fn plain_safe(s: &str, flow: bool) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };
    if s.trim() != s || s.chars().any(|c| c.is_control()) {
        return false;
    }
    if INDICATORS.contains(first) {
        // `--fix` style values are fine; a lone `-` or `- x` is a sequence entry.
        let dash_ok = first == '-' && s.chars().nth(1).is_some_and(|c| c != ' ');
        if !dash_ok {
            return false;
        }
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') {
        return false;
    }
    if flow && s.chars().any(|c| ",[]{}".contains(c)) {
        return false;
    }
    matches!(resolve_plain(s), Scalar::String(_))
}

fn double_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a string, quoting only when needed. Single quotes are preferred.
pub(crate) fn render_string(s: &str, flow: bool) -> String {
    if plain_safe(s, flow) {
        s.to_string()
    } else if !s.chars().any(|c| c.is_control()) {
        format!("'{}'", s.replace('\'', "''"))
    } else {
        double_quote(s)
    }
}

pub(crate) fn render_scalar(scalar: &Scalar, flow: bool) -> String {
    match scalar {
        Scalar::Null => "null".to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) if f.is_nan() => ".nan".to_string(),
        Scalar::Float(f) if f.is_infinite() => {
            if *f > 0.0 { ".inf" } else { "-.inf" }.to_string()
        }
        Scalar::Float(f) => format!("{f:?}"),
        Scalar::String(s) => render_string(s, flow),
    }
}
