//! Decoding of literal lexemes.
//!
//! The scanner keeps the raw source text of every literal as its lexeme so
//! that re-rendering a token reproduces the source. These helpers turn a
//! lexeme into its value.

/// Value of an integer literal lexeme (`0x1F`, `0b1010`, `0o17`, `1_000`).
pub fn int_value(lexeme: &str) -> Option<i64> {
    let digits: String = lexeme.chars().filter(|&c| c != '_').collect();
    let (radix, body) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        _ => (10, digits.as_str()),
    };
    if body.is_empty() {
        return None;
    }
    // Literals wider than a cell wrap the same way the runtime stores them.
    u64::from_str_radix(body, radix).ok().map(|v| v as i64)
}

/// Value of a float literal lexeme (`3.14`, `3.14e2`, `1_0.5`).
pub fn float_value(lexeme: &str) -> Option<f64> {
    let digits: String = lexeme.chars().filter(|&c| c != '_').collect();
    digits.parse::<f64>().ok()
}

/// Decodes a quoted char or string lexeme, including the quotes.
///
/// Triple-quoted strings are raw: their body is returned untouched.
pub fn unescape(lexeme: &str) -> Result<String, String> {
    if let Some(body) = lexeme
        .strip_prefix("\"\"\"")
        .and_then(|rest| rest.strip_suffix("\"\"\""))
    {
        return Ok(body.to_string());
    }

    let mut chars = lexeme.chars();
    let quote = chars
        .next()
        .ok_or_else(|| "empty literal".to_string())?;
    let inner: Vec<char> = chars.collect();
    let inner = match inner.split_last() {
        Some((last, rest)) if *last == quote => rest,
        _ => return Err("unterminated literal".to_string()),
    };

    let mut out = String::new();
    let mut i = 0;
    while i < inner.len() {
        let ch = inner[i];
        i += 1;
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let esc = *inner
            .get(i)
            .ok_or_else(|| "dangling escape at end of literal".to_string())?;
        i += 1;
        let decoded = match esc {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\u{7}',
            'b' => '\u{8}',
            'e' => '\u{1b}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '%' => '%',
            'x' => {
                let (value, used) = take_digits(&inner[i..], 16, 2);
                if used == 0 {
                    return Err("\\x escape needs hex digits".to_string());
                }
                i += used;
                // Optional terminator
                if inner.get(i) == Some(&';') {
                    i += 1;
                }
                char::from_u32(value).ok_or_else(|| format!("invalid \\x escape value {value}"))?
            }
            'u' => {
                let (value, used) = take_digits(&inner[i..], 16, 4);
                if used != 4 {
                    return Err("\\u escape needs four hex digits".to_string());
                }
                i += used;
                char::from_u32(value).ok_or_else(|| format!("invalid \\u escape value {value:04x}"))?
            }
            '0' => {
                let (value, used) = take_digits(&inner[i..], 8, 3);
                i += used;
                char::from_u32(value).ok_or_else(|| format!("invalid octal escape value {value:o}"))?
            }
            other => return Err(format!("unknown escape sequence '\\{other}'")),
        };
        out.push(decoded);
    }
    Ok(out)
}

/// Value of a char literal: its single decoded character.
pub fn char_value(lexeme: &str) -> Result<char, String> {
    let decoded = unescape(lexeme)?;
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        (None, _) => Err("empty character literal".to_string()),
        _ => Err("character literal holds more than one character".to_string()),
    }
}

fn take_digits(chars: &[char], radix: u32, max: usize) -> (u32, usize) {
    let mut value = 0u32;
    let mut used = 0;
    for ch in chars.iter().take(max) {
        match ch.to_digit(radix) {
            Some(d) => {
                value = value * radix + d;
                used += 1;
            }
            None => break,
        }
    }
    (value, used)
}
