//! Phone number normalization and chat identifier construction.
//!
//! Numbers are assumed to be Brazilian: anything that still fits a national
//! number (area code + subscriber, at most 11 digits) gets the `55` country
//! code prepended.

use super::WhatsAppError;

/// Country code prepended to national numbers.
pub const COUNTRY_CODE: &str = "55";

/// Direct-message domain used by WhatsApp Web chat identifiers.
pub const CHAT_DOMAIN: &str = "c.us";

/// Longest digit string still treated as a national number.
const NATIONAL_MAX_DIGITS: usize = 11;

/// Strip every non-digit and add the country code to national numbers.
///
/// Returns `None` when the input contains no digits at all.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() <= NATIONAL_MAX_DIGITS {
        Some(format!("{COUNTRY_CODE}{digits}"))
    } else {
        Some(digits)
    }
}

/// Build the chat identifier (`<digits>@c.us`) for a raw phone string.
///
/// # Errors
///
/// Returns [`WhatsAppError::InvalidPhone`] when the input has no digits.
pub fn to_chat_id(raw: &str) -> Result<String, WhatsAppError> {
    normalize_phone(raw)
        .map(|digits| format!("{digits}@{CHAT_DOMAIN}"))
        .ok_or_else(|| WhatsAppError::InvalidPhone(raw.to_owned()))
}
