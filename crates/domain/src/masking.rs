//! Sensitive-field masking.
//!
//! Nothing that leaves the payment worker, and no log line anywhere, may
//! carry a full card number, a raw CVV, or an unmasked CPF.

/// Fixed sentinel stored in place of a CVV.
pub const CVV_SENTINEL: &str = "***";

/// Reduces a card number to its last four digits.
pub fn mask_card_number(card_number: &str) -> String {
    if card_number.len() < 4 {
        return "****".to_string();
    }
    format!("****-****-****-{}", &card_number[card_number.len() - 4..])
}

/// Masks a CPF, preserving only the last two digits.
pub fn mask_cpf(cpf: &str) -> String {
    let visible = cpf.len().min(2);
    let hidden = cpf.len() - visible;
    format!("{}{}", "*".repeat(hidden), &cpf[hidden..])
}

/// Masks the local part of an email address for log output.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}
