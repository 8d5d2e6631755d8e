//! Quantity normalization.
//!
//! Every quantity that enters the reservation protocol is a positive integer.
//! Zero, negative and unparseable requests are treated as a request for one
//! unit rather than rejected.

/// Normalize a requested quantity to an integer >= 1.
///
/// ```
/// use veloure_core::normalize_qty;
///
/// assert_eq!(normalize_qty(3), 3);
/// assert_eq!(normalize_qty(0), 1);
/// assert_eq!(normalize_qty(-7), 1);
/// ```
#[must_use]
pub fn normalize_qty(requested: i64) -> u32 {
    if requested < 1 {
        return 1;
    }
    u32::try_from(requested).unwrap_or(u32::MAX)
}

/// Parse a user-supplied quantity, normalizing it to an integer >= 1.
///
/// Leading digits are honoured the way form inputs usually are (`"4 units"`
/// is 4); anything without a leading integer becomes 1.
#[must_use]
pub fn parse_qty(input: &str) -> u32 {
    match leading_integer(input) {
        Some((false, value)) => u32::try_from(value).unwrap_or(u32::MAX).max(1),
        _ => 1,
    }
}

/// Sign and magnitude of the integer `input` starts with, after trimming.
///
/// Magnitudes beyond `u64` saturate. `None` if there is no leading digit.
pub(crate) fn leading_integer(input: &str) -> Option<(bool, u64)> {
    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let leading = digits.get(..end)?;
    if leading.is_empty() {
        return None;
    }
    Some((negative, leading.parse::<u64>().unwrap_or(u64::MAX)))
}
