//! Error types with fix suggestions
//!
//! Every failure is fail-fast: a bind pass aborts on the first error.
//! Variants are grouped into four kinds (see [`ErrorKind`]).

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Coarse classification of a [`BindError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed expression syntax or identifiers
    Parse,
    /// Missing/invalid scope boundaries or configuration
    Structural,
    /// Expression does not satisfy a binder's descriptor
    Contract,
    /// Failure while reading/writing a live binding
    Runtime,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    // ─────────────────────────────────────────────────────────────
    // Parse errors (BIND-010 to BIND-013)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-010: An expression is required")]
    EmptyExpression,

    #[error("BIND-011: Invalid expression '{expression}' (expected 2 or 3 tokens, got {tokens})")]
    InvalidExpression { expression: String, tokens: usize },

    #[error("BIND-012: Invalid {side} operand '{operand}'")]
    InvalidOperand { side: &'static str, operand: String },

    #[error("BIND-013: Unknown operator '{operator}'")]
    UnknownOperator { operator: String },

    // ─────────────────────────────────────────────────────────────
    // Structural errors (BIND-020 to BIND-023)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-020: No binded scopes were found. Declare a scope with [{attribute}=\"as name\"]")]
    NoScopeFound { attribute: String },

    #[error("BIND-021: Invalid expression for {attribute}, \"{expression}\"")]
    InvalidScopeExpression { attribute: String, expression: String },

    #[error("BIND-022: Invalid attribute prefix '{prefix}' (expected ^[a-z]{{0,32}}$)")]
    InvalidPrefix { prefix: String },

    #[error("BIND-023: Duplicate scope alias '{alias}' in the same parent scope")]
    DuplicateScope { alias: String },

    // ─────────────────────────────────────────────────────────────
    // Contract errors (BIND-030 to BIND-033)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-030: Operator '{operator}' is not supported by binder '{binder}'")]
    UnsupportedOperator { binder: String, operator: String },

    #[error("BIND-031: Binder '{binder}' is missing a required context")]
    MissingContext { binder: String },

    #[error("BIND-032: The left operand is required for binder '{binder}'")]
    MissingLeftOperand { binder: String },

    #[error("BIND-033: Modifier '{modifier}' is not allowed for binder '{binder}'")]
    InvalidModifier { binder: String, modifier: String },

    // ─────────────────────────────────────────────────────────────
    // Runtime errors (BIND-040 to BIND-043)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-040: Property does not exist, '{alias}'")]
    UnknownProperty { alias: String },

    #[error("BIND-041: Cannot read collective value of '{alias}' when \"into\" is used")]
    CollectiveRead { alias: String },

    #[error(
        "BIND-042: No callback{} for event '{event_type}'",
        .name.as_ref().map(|n| format!(" named '{n}'")).unwrap_or_default()
    )]
    MissingCallback { name: Option<String>, event_type: String },

    #[error("BIND-043: Alias '{alias}' is read-only")]
    ReadOnlyAlias { alias: String },
}

impl BindError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyExpression
            | Self::InvalidExpression { .. }
            | Self::InvalidOperand { .. }
            | Self::UnknownOperator { .. } => ErrorKind::Parse,
            Self::NoScopeFound { .. }
            | Self::InvalidScopeExpression { .. }
            | Self::InvalidPrefix { .. }
            | Self::DuplicateScope { .. } => ErrorKind::Structural,
            Self::UnsupportedOperator { .. }
            | Self::MissingContext { .. }
            | Self::MissingLeftOperand { .. }
            | Self::InvalidModifier { .. } => ErrorKind::Contract,
            Self::UnknownProperty { .. }
            | Self::CollectiveRead { .. }
            | Self::MissingCallback { .. }
            | Self::ReadOnlyAlias { .. } => ErrorKind::Runtime,
        }
    }
}

impl FixSuggestion for BindError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BindError::EmptyExpression => Some("Provide an expression like \"as alias\""),
            BindError::InvalidExpression { .. } => {
                Some("Use [<left>] <operator> <right>, joined with \"and\"")
            }
            BindError::InvalidOperand { .. } => {
                Some("Operands start with a letter and contain letters, digits, '-', '_' or '.' (max 64)")
            }
            BindError::UnknownOperator { .. } => Some("Use one of: as, into, on"),
            BindError::NoScopeFound { .. } => {
                Some("Mark the root (or a descendant) with a scope attribute")
            }
            BindError::InvalidScopeExpression { .. } => {
                Some("A scope expression must be exactly \"as <alias>\"")
            }
            BindError::InvalidPrefix { .. } => Some("Use up to 32 lowercase ASCII letters"),
            BindError::DuplicateScope { .. } => {
                Some("Give sibling scopes unique aliases or use the warn policy")
            }
            BindError::UnsupportedOperator { .. } => {
                Some("Check which operators the binder supports (as/into/on)")
            }
            BindError::MissingContext { .. } => {
                Some("Pass a context table for this binder in the bind options")
            }
            BindError::MissingLeftOperand { .. } => {
                Some("Name the attribute/property/style on the left: \"<name> as <alias>\"")
            }
            BindError::InvalidModifier { .. } => Some("Remove the unsupported modifier"),
            BindError::UnknownProperty { .. } => {
                Some("Declare the alias with a binder before writing to it")
            }
            BindError::CollectiveRead { .. } => {
                Some("\"into\" aliases are write-only; use \"as\" to read a value")
            }
            BindError::MissingCallback { .. } => {
                Some("Register the handler in context.event or use \"on <event>\" for a no-op")
            }
            BindError::ReadOnlyAlias { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_codes() {
        let err = BindError::UnknownProperty { alias: "foo".into() };
        assert!(err.to_string().contains("BIND-040"));
        assert!(err.to_string().contains("foo"));

        let err = BindError::InvalidPrefix { prefix: "X".into() };
        assert!(err.to_string().contains("^[a-z]{0,32}$"));
    }

    #[test]
    fn kinds_group_variants() {
        assert_eq!(BindError::EmptyExpression.kind(), ErrorKind::Parse);
        assert_eq!(
            BindError::NoScopeFound { attribute: "binded-scope".into() }.kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            BindError::MissingLeftOperand { binder: "attr".into() }.kind(),
            ErrorKind::Contract
        );
        assert_eq!(
            BindError::CollectiveRead { alias: "a".into() }.kind(),
            ErrorKind::Runtime
        );
    }

    #[test]
    fn most_variants_have_suggestions() {
        assert!(BindError::EmptyExpression.fix_suggestion().is_some());
        assert!(BindError::ReadOnlyAlias { alias: "a".into() }.fix_suggestion().is_none());
    }
}
