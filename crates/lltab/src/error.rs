//! # Error Types
//!
//! One error enum per failure domain, each variant a kind tag with a
//! human-readable message:
//!
//! - [`GrammarError`]: malformed grammar source (BNF or embedded regex),
//!   reported with byte positions
//! - [`BuildError`]: table construction failures (LL(1) conflicts,
//!   non-converging transformation)
//! - [`ParseError`]: runtime parse failures; always fatal, no recovery
//! - [`ArtifactError`]: malformed binary artifacts
//!
//! All errors propagate to the top of the build or parse call; nothing is
//! recovered locally.
//!
//! With the `diagnostics` feature enabled the enums also derive
//! [`miette::Diagnostic`] for integration with miette-based reporters.

use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Errors in the grammar source: BNF syntax or embedded regex literals.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("regex syntax error at {pos}: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::regex_syntax)))]
    RegexSyntax { pos: usize, message: String },

    #[error("unexpected character {found:?} at {pos}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::unexpected_char)))]
    UnexpectedChar { pos: usize, found: char },

    #[error("unexpected {found} at {pos}, expected {expected}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::bnf_syntax)))]
    UnexpectedBnfToken {
        pos: usize,
        found: String,
        expected: String,
    },

    #[error("unterminated {what} starting at {pos}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::unterminated)))]
    Unterminated { pos: usize, what: &'static str },

    #[error("nonterminal {name:?} is referenced but never defined")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::undefined_nonterminal)))]
    UndefinedNonTerminal { name: String },

    #[error("start nonterminal {name:?} has no productions")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::missing_start)))]
    MissingStart { name: String },
}

/// Errors from the grammar transformer and table builder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum BuildError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// Two productions claimed the same `(nonterminal, lookahead)` entry.
    #[error("not a valid LL(1) grammar: conflict on nonterminal {non_terminal:?} with lookahead {lookahead}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::ll1_conflict)))]
    Conflict {
        non_terminal: String,
        lookahead: String,
    },

    /// The fixed-point pipeline exceeded its iteration cap.
    #[error("grammar is not LL(1)-reducible: transformation did not converge within {iterations} iterations")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::not_reducible)))]
    NotReducible { iterations: usize },

    /// The factoring pass found two converging paths without a shared prefix.
    /// Indicates an analysis invariant was violated by the input grammar.
    #[error("left factoring failed: no common factor between converging derivations of {non_terminal:?}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::no_common_factor)))]
    NoCommonFactor { non_terminal: String },
}

/// Runtime parse failures. All are fatal to the parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseError {
    /// The table had no prediction, a terminal mismatched, or tokens
    /// remained after the start symbol was fully derived.
    #[error("unexpected token {found:?}{}", expectation_suffix(.expected))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::unexpected_token)))]
    UnexpectedToken {
        found: String,
        expected: Vec<String>,
    },

    /// No terminal matcher accepted the input at the current position.
    #[error("incomplete token at byte {pos}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::incomplete_token)))]
    IncompleteToken { pos: usize },

    #[error("expected end of input but found {found:?}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::extra_token)))]
    ExtraToken { found: String },
}

fn expectation_suffix(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(", expected one of: {}", expected.join(", "))
    }
}

/// Errors while decoding (or refusing to encode) a binary artifact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ArtifactError {
    #[error("unknown type tag {tag} at byte {pos}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::unknown_tag)))]
    UnknownTag { tag: u8, pos: usize },

    #[error("missing end-of-segment sentinel at byte {pos}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::missing_sentinel)))]
    MissingSentinel { pos: usize },

    #[error("artifact truncated at byte {pos}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::truncated)))]
    Truncated { pos: usize },

    /// Strings embedded in an artifact may not contain the reserved
    /// sentinel bytes.
    #[error("string {text:?} contains a reserved sentinel byte")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::reserved_byte)))]
    ReservedByte { text: String },

    #[error("artifact references invalid regex: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lltab::bad_regex)))]
    InvalidRegex(#[from] GrammarError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_names_nonterminal_and_lookahead() {
        let err = BuildError::Conflict {
            non_terminal: "S".to_string(),
            lookahead: "\"a\"".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("S"));
        assert!(message.contains("\"a\""));
    }

    #[test]
    fn test_unexpected_token_lists_expectations() {
        let err = ParseError::UnexpectedToken {
            found: "+".to_string(),
            expected: vec!["\"a\"".to_string(), "identifier".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("expected one of"));
        assert!(message.contains("identifier"));
    }

    #[test]
    fn test_grammar_error_carries_position() {
        let err = GrammarError::RegexSyntax {
            pos: 7,
            message: "a group or char class is not closed".to_string(),
        };
        assert!(err.to_string().contains('7'));
    }
}
