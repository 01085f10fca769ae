use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FALLBACKS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Parses `s` with `preferred` first, then the common statement layouts.
/// Day-first wins over month-first when both would parse.
pub fn parse_date(s: &str, preferred: Option<&str>) -> Option<NaiveDate> {
    let s = s.trim();
    preferred
        .into_iter()
        .chain(DATE_FALLBACKS.iter().copied())
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Accepts currency symbols, thousands separators and accounting
/// parentheses for negatives: `"(1,234.50)"` → `-1234.50`.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let cleaned = s.replace("R$", "").replace([',', '$', ' '], "");
    let dec = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -dec } else { dec })
}
