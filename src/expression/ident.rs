//! Operand identifier validation
//!
//! Identifiers follow `^[a-z][a-z0-9\-_.]{0,63}$` (case-insensitive, ASCII):
//! - Start with a letter
//! - At most 64 characters in total
//! - Dots split the token into a head and ordered modifier attributes;
//!   every segment must itself be a valid identifier

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::BindError;

/// Maximum identifier length (head + modifiers + dots)
pub const MAX_IDENT_LEN: usize = 64;

static IDENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i-u)^[a-z][a-z0-9\-_.]{0,63}$").unwrap());

/// Check a single token against the identifier grammar
pub fn is_identifier(token: &str) -> bool {
    IDENT_PATTERN.is_match(token)
}

/// Validate an operand token and split it into `(head, modifiers)`
///
/// `side` is only used for error reporting ("left" / "right").
pub fn split_operand(token: &str, side: &'static str) -> Result<(String, Vec<String>), BindError> {
    let invalid = || BindError::InvalidOperand {
        side,
        operand: token.to_string(),
    };

    if !is_identifier(token) {
        return Err(invalid());
    }

    let mut parts = token.split('.');
    let head = parts.next().ok_or_else(invalid)?.to_string();

    let mut modifiers = Vec::new();
    for part in parts {
        // Empty segments ("a..b", "a.") and segments starting with a digit/dash
        if !is_identifier(part) {
            return Err(invalid());
        }
        modifiers.push(part.to_string());
    }

    Ok((head, modifiers))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ═══════════════════════════════════════════════════════════════
    // Valid identifiers
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn valid_simple() {
        assert!(is_identifier("a"));
        assert!(is_identifier("value"));
        assert!(is_identifier("disableAll"));
        assert!(is_identifier("my-alias_2"));
    }

    #[test]
    fn valid_boundary_length() {
        let ident = format!("a{}", "b".repeat(63));
        assert_eq!(ident.len(), MAX_IDENT_LEN);
        assert!(is_identifier(&ident));
    }

    #[test]
    fn split_with_modifiers() {
        let (head, mods) = split_operand("click.prevent.stop", "right").unwrap();
        assert_eq!(head, "click");
        assert_eq!(mods, vec!["prevent", "stop"]);
    }

    #[test]
    fn split_without_modifiers() {
        let (head, mods) = split_operand("title", "left").unwrap();
        assert_eq!(head, "title");
        assert!(mods.is_empty());
    }

    // ═══════════════════════════════════════════════════════════════
    // Invalid identifiers
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn reject_too_long() {
        let ident = format!("a{}", "b".repeat(64));
        assert!(!is_identifier(&ident));
        assert!(split_operand(&ident, "right").is_err());
    }

    #[test]
    fn reject_bad_start() {
        assert!(!is_identifier("1tok"));
        assert!(!is_identifier("$tok"));
        assert!(!is_identifier("_tok"));
        assert!(!is_identifier("-tok"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn reject_non_ascii() {
        assert!(!is_identifier("tâche"));
        // Kelvin sign folds to 'k' under Unicode case folding
        assert!(!is_identifier("\u{212A}ey"));
    }

    #[test]
    fn reject_empty_segments() {
        let err = split_operand("a..b", "left").unwrap_err();
        assert!(err.to_string().contains("BIND-012"));
        assert!(err.to_string().contains("left"));
        assert!(split_operand("a.", "right").is_err());
    }

    #[test]
    fn reject_modifier_starting_with_digit() {
        assert!(split_operand("click.1x", "right").is_err());
        assert!(split_operand("click.-x", "right").is_err());
    }
}
