use super::types::finite_or_zero;

pub fn format_currency(value: f64) -> String {
    let value = finite_or_zero(value);
    let digits = format!("{:.2}", value.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
    let negative = value < 0.0 && digits.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    format!(
        "{}${}.{}",
        if negative { "-" } else { "" },
        group_thousands(whole),
        cents
    )
}

pub fn format_percent(fraction: f64) -> String {
    let scaled = finite_or_zero(fraction) * 100.0;
    format!("{}%", signed_fixed(finite_or_zero(scaled), 2))
}

pub fn format_ratio(value: f64) -> String {
    signed_fixed(finite_or_zero(value), 4)
}

pub fn format_count(value: u32) -> String {
    value.to_string()
}

fn signed_fixed(value: f64, decimals: usize) -> String {
    let text = format!("{value:.decimals$}");
    // -0.00 reads as a stray sign
    if text.starts_with('-') && text[1..].bytes().all(|b| b == b'0' || b == b'.') {
        text[1..].to_string()
    } else {
        text
    }
}

fn group_thousands(whole: &str) -> String {
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, ch) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
