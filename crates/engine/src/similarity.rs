use rust_decimal::Decimal;

/// `|a - b| / max(|a|, |b|)`, or zero when both amounts are zero.
pub fn relative_difference(a: Decimal, b: Decimal) -> Decimal {
    let largest = a.abs().max(b.abs());
    if largest.is_zero() {
        return Decimal::ZERO;
    }
    (a - b).abs() / largest
}

/// Word-overlap ratio between two descriptions, case-insensitive.
///
/// A word of `a` counts as matched when it contains, or is contained in, any
/// word of `b`. The count is divided by the longer word list. Substring
/// containment lets very short words ("a", "de") match almost anything; that
/// is accepted behaviour and changing it would shift which pairs clear the
/// fuzzy threshold.
pub fn word_overlap(a: &str, b: &str) -> Decimal {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();

    let longest = words_a.len().max(words_b.len());
    if longest == 0 {
        return Decimal::ZERO;
    }

    let matched = words_a
        .iter()
        .filter(|wa| words_b.iter().any(|wb| wa.contains(*wb) || wb.contains(*wa)))
        .count();

    Decimal::from(matched) / Decimal::from(longest)
}
