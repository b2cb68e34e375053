// Canonical decimal rounding for numeric text.
//
// Rounding happens on the decimal digits of each literal, not on its binary
// float value, so "1.005" at two decimals is "1.01" and re-running the pass on
// its own output changes nothing. Everything that is not a number literal is
// copied through byte for byte.

pub const MAX_DECIMALS: u8 = 8;

// Exponents beyond this are left as written instead of being expanded.
const MAX_EXPONENT: i64 = 4000;

pub fn clamp_decimals(decimals: i64) -> u8 {
    decimals.clamp(0, MAX_DECIMALS as i64) as u8
}

/// Rounds every number literal in `text` to `decimals` places (clamped to 0..=8),
/// half away from zero. Trailing fractional zeros, a trailing decimal point and
/// the sign of a zero result are dropped.
pub fn canonicalize(text: &str, decimals: u8) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut literal_start = 0;

    while i < bytes.len() {
        let Some(lit) = scan_number(bytes, i) else {
            i += 1;
            continue;
        };
        out.push_str(&text[literal_start..i]);
        let rendered = match round_literal(&lit, decimals) {
            Some(s) => s,
            None => text[i..lit.end].to_string(),
        };
        if needs_separator(&out, &rendered) {
            out.push(' ');
        }
        out.push_str(&rendered);
        i = lit.end;
        literal_start = i;
    }
    out.push_str(&text[literal_start..]);
    out
}

/// Canonical text for a standalone numeric value; `None` for NaN or infinity.
pub fn canonicalize_number(value: f64, decimals: u8) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    Some(canonicalize(&format!("{}", value), decimals))
}

pub fn round_to(value: f64, decimals: u8) -> f64 {
    canonicalize_number(value, decimals)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

struct Literal<'a> {
    negative: bool,
    int_digits: &'a [u8],
    frac_digits: &'a [u8],
    exponent: Option<i64>,
    end: usize,
}

fn scan_number(bytes: &[u8], start: usize) -> Option<Literal<'_>> {
    let mut i = start;
    let mut negative = false;
    if matches!(bytes.get(i), Some(b'+' | b'-')) {
        negative = bytes[i] == b'-';
        i += 1;
    }
    let int_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let int_end = i;
    let mut frac_start = i;
    let mut frac_end = i;
    // A dot only belongs to the literal when digits follow it.
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1;
        frac_start = i;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        frac_end = i;
    }
    if int_end == int_start && frac_end == frac_start {
        return None;
    }

    let mut exponent = None;
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        let mut exp_negative = false;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            exp_negative = bytes[j] == b'-';
            j += 1;
        }
        let digits_start = j;
        while bytes.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        if j > digits_start {
            let mut value: i64 = 0;
            for &b in &bytes[digits_start..j] {
                value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
            }
            exponent = Some(if exp_negative { -value } else { value });
            i = j;
        }
    }

    Some(Literal {
        negative,
        int_digits: &bytes[int_start..int_end],
        frac_digits: &bytes[frac_start..frac_end],
        exponent,
        end: i,
    })
}

fn round_literal(lit: &Literal<'_>, decimals: u8) -> Option<String> {
    let exponent = lit.exponent.unwrap_or(0);
    if exponent > MAX_EXPONENT {
        return None;
    }
    if exponent < -MAX_EXPONENT {
        return Some("0".to_string());
    }

    let digits: Vec<u8> = lit
        .int_digits
        .iter()
        .chain(lit.frac_digits.iter())
        .map(|b| b - b'0')
        .collect();
    // Position of the decimal point, counted in digits from the left.
    let mut point = lit.int_digits.len() as i64 + exponent;
    let cut = point + decimals as i64;

    let mut kept: Vec<u8> = if cut < 0 {
        Vec::new()
    } else if cut as usize >= digits.len() {
        digits.clone()
    } else {
        let cut = cut as usize;
        let mut kept = digits[..cut].to_vec();
        if digits[cut] >= 5 && round_up(&mut kept) {
            kept.insert(0, 1);
            point += 1;
        }
        kept
    };

    if kept.is_empty() && cut >= 0 && (cut as usize) < digits.len() && digits[cut as usize] >= 5 {
        // Everything was cut and the first dropped digit rounds up.
        kept.push(1);
        point += 1;
    }

    let (int_part, frac_part) = split_at_point(&kept, point);
    let int_trimmed = int_part.trim_start_matches('0');
    let frac_trimmed = frac_part.trim_end_matches('0');
    let int_text = if int_trimmed.is_empty() { "0" } else { int_trimmed };

    if int_text == "0" && frac_trimmed.is_empty() {
        return Some("0".to_string());
    }
    let mut out = String::new();
    if lit.negative {
        out.push('-');
    }
    out.push_str(int_text);
    if !frac_trimmed.is_empty() {
        out.push('.');
        out.push_str(frac_trimmed);
    }
    Some(out)
}

// Adds one unit in the last place; returns true when the carry runs off the front.
fn round_up(kept: &mut [u8]) -> bool {
    for d in kept.iter_mut().rev() {
        if *d == 9 {
            *d = 0;
        } else {
            *d += 1;
            return false;
        }
    }
    !kept.is_empty()
}

fn split_at_point(kept: &[u8], point: i64) -> (String, String) {
    let to_char = |d: &u8| (b'0' + d) as char;
    if point <= 0 {
        let mut frac: String = "0".repeat((-point) as usize);
        frac.extend(kept.iter().map(to_char));
        return (String::new(), frac);
    }
    let point = point as usize;
    if point >= kept.len() {
        let mut int: String = kept.iter().map(to_char).collect();
        int.push_str(&"0".repeat(point - kept.len()));
        return (int, String::new());
    }
    (
        kept[..point].iter().map(to_char).collect(),
        kept[point..].iter().map(to_char).collect(),
    )
}

// Keeps two adjacent literals from fusing once a sign or leading dot is gone.
fn needs_separator(out: &str, rendered: &str) -> bool {
    let starts_with_digit = rendered.as_bytes().first().is_some_and(u8::is_ascii_digit);
    let prev = out.as_bytes().last().copied();
    starts_with_digit
        && matches!(prev, Some(b'0'..=b'9' | b'.' | b'+' | b'-' | b'e' | b'E'))
}
