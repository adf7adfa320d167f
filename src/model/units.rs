use alloy_primitives::{I256, U256};

pub const ETHER_DECIMALS: u8 = 18;

/// Render a fixed-point integer with `decimals` fractional digits.
/// Trailing zeros are dropped but at least one fractional digit is kept.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let scale = decimals as usize;
    if scale == 0 {
        return format!("{}.0", digits);
    }

    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (whole, frac) = padded.split_at(padded.len() - scale);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, frac)
    }
}

pub fn format_signed_units(value: I256, decimals: u8) -> String {
    let magnitude = format_units(value.unsigned_abs(), decimals);
    if value.is_negative() {
        format!("-{}", magnitude)
    } else {
        magnitude
    }
}

pub fn format_ether(wei: U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Group the whole part of a decimal string in thousands.
pub fn commify(value: &str) -> String {
    let (sign, unsigned) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };
    let (whole, frac) = match unsigned.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Keep `start` leading and `end` trailing characters when `text` is longer than `max`.
pub fn truncate(text: &str, start: usize, end: usize, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    format!("{}...{}", &text[..start], &text[text.len() - end..])
}
