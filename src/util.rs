//! Text, path and clock-value helpers shared by the parsers and the engine.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in DAISY 2.02 books)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Pull the `encoding="..."` value out of an XML declaration, if any.
pub fn xml_declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let decl_end = head.find("?>")?;
    let decl = &head[..decl_end];
    let start = decl.find("encoding=")? + "encoding=".len();
    let rest = &decl[start..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(value[..end].to_string())
}

/// Decode a markup file, honouring its XML declaration.
pub fn decode_markup(bytes: &[u8]) -> Cow<'_, str> {
    let hint = xml_declared_encoding(bytes);
    decode_text(bytes, hint.as_deref())
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

// ============================================================================
// Paths
// ============================================================================

/// Split `file.smil#id` into `("file.smil", Some("id"))`.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, frag)) => (path, Some(frag).filter(|f| !f.is_empty())),
        None => (href, None),
    }
}

/// Join `href` onto the directory `base`.
pub fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), href)
    }
}

/// Canonical form of a document identifier for comparisons.
///
/// Percent-decodes, drops any fragment, unifies separators, resolves `.` and
/// `..` segments and lower-cases the result, so `./Smil/A%201.smil#x` and
/// `smil\a 1.SMIL` compare equal.
pub fn normalize_path(path: &str) -> String {
    let (path, _) = split_fragment(path);
    let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
    let unified = decoded.replace('\\', "/");

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/").to_lowercase()
}

// ============================================================================
// Clock values
// ============================================================================

/// Parse a SMIL or metadata clock value into milliseconds.
///
/// Accepts full and partial clock values (`1:02:03.5`, `02:03.5`), timecounts
/// with an optional metric (`12.5s`, `250ms`, `1.5min`, `2h`, bare `12.5`),
/// and the DAISY 2.02 `npt=` prefix.
pub fn parse_clock_ms(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_prefix("npt=").unwrap_or(value).trim();
    if value.is_empty() {
        return None;
    }

    if value.contains(':') {
        let parts: Vec<&str> = value.split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [h, m, s] => (parse_whole(h)?, parse_whole(m)?, *s),
            [m, s] => (0, parse_whole(m)?, *s),
            _ => return None,
        };
        let seconds = parse_decimal(seconds, 1000)?;
        return hours
            .checked_mul(3_600_000)?
            .checked_add(minutes.checked_mul(60_000)?)?
            .checked_add(seconds);
    }

    let (number, unit_ms) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = value.strip_suffix("min") {
        (n, 60_000)
    } else if let Some(n) = value.strip_suffix('h') {
        (n, 3_600_000)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1000)
    } else {
        (value, 1000)
    };
    parse_decimal(number.trim(), unit_ms)
}

/// Parse a clock value and round it to whole seconds.
pub fn parse_clock_secs(value: &str) -> Option<u64> {
    parse_clock_ms(value).map(|ms| (ms + 500) / 1000)
}

fn parse_whole(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse `int[.frac]` scaled by `unit` without going through floats.
fn parse_decimal(s: &str, unit: u64) -> Option<u64> {
    let (int, frac) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    let int = if int.is_empty() { 0 } else { parse_whole(int)? };
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let frac = &frac[..frac.len().min(9)];
    let mut scaled_frac = 0u64;
    if !frac.is_empty() {
        let digits: u64 = frac.parse().ok()?;
        let denom = 10u64.pow(frac.len() as u32);
        scaled_frac = digits * unit / denom;
    }

    int.checked_mul(unit)?.checked_add(scaled_frac)
}
