//! Input normalization helpers.
//!
//! The ingress sanitizes every submission before it enters the pipeline;
//! the lead worker re-normalizes on consumption because it cannot assume
//! every publisher went through the ingress.

/// Normalizes a CPF by stripping all non-digit characters.
///
/// Returns `None` unless exactly 11 digits remain.
pub fn normalize_cpf(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 11).then_some(digits)
}

/// Normalizes an email address: trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalizes a ZIP code to the `NNNNN-NNN` form.
///
/// Accepts eight digits with an optional dash after the fifth; anything
/// else returns `None`.
pub fn normalize_zip(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() != 8 {
        return None;
    }
    // Only digits and the canonical dash position are allowed.
    let dashless_ok = trimmed.len() == 8 && trimmed.chars().all(|c| c.is_ascii_digit());
    let dashed_ok = trimmed.len() == 9 && trimmed.as_bytes()[5] == b'-';
    if !dashless_ok && !dashed_ok {
        return None;
    }

    Some(format!("{}-{}", &digits[..5], &digits[5..]))
}

/// Removes spaces from a card number.
pub fn normalize_card_number(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Zero-pads an expiry month to two digits.
pub fn normalize_expiry_month(month: u32) -> String {
    format!("{month:02}")
}

/// Trims and uppercases a state or country code.
pub fn normalize_region(raw: &str) -> String {
    raw.trim().to_uppercase()
}
