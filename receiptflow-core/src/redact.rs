//! Helpers for keeping secrets and oversized text out of logs and storage.

/// Default cap for stored error messages, in characters.
pub const DEFAULT_ERROR_MESSAGE_LIMIT: usize = 2000;

/// Masks a credential to its first 4 and last 4 characters.
///
/// Values too short to mask meaningfully are replaced entirely.
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Truncates a message to at most `limit` characters.
pub fn truncate_message(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((cut, _)) => message[..cut].to_string(),
        None => message.to_string(),
    }
}
