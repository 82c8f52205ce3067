//! Error types for sqlplace.

use thiserror::Error;

/// The main error type for statement composition and rendering.
#[derive(Debug, Error)]
pub enum PlaceError {
    /// The template text could not be tokenized.
    #[error("Template error at position {position}: {message}")]
    Template { position: usize, message: String },

    /// A statement was placed into itself.
    #[error("Unable to place statement '{name}' into itself")]
    SelfReference { name: String },

    /// Placing the statement would close a cycle.
    #[error("Circular referencing detected while placing '{name}'")]
    CircularReference { name: String },

    /// A token matches neither a parameter nor a child statement.
    #[error("Parameter {token} has not been assigned")]
    UnresolvedToken { token: String },

    /// A named token expands a statement that is already being expanded.
    #[error("Statement '{name}' expands into itself")]
    RecursiveExpansion { name: String },

    /// A parameter position does not fit in the rendered command.
    #[error("Parameter index {index} is out of range")]
    IndexOverflow { index: usize },

    /// No builder for the syntax in the requested or default dialect.
    #[error("There is no syntax '{syntax}' registered for dialect '{dialect}'")]
    DialectNotFound { dialect: String, syntax: String },

    /// A syntax builder was called without a required argument.
    #[error("Syntax '{syntax}' is missing argument {index}")]
    SyntaxArgument { syntax: String, index: usize },

    /// No provider adapter is known for a connection.
    #[error("No provider adapter registered for '{scheme}'")]
    AdapterResolution { scheme: String },

    /// A connection string does not start with a provider scheme.
    #[error("Connection string does not name a provider scheme")]
    MissingScheme,

    /// The statement handle does not belong to this tree.
    #[error("Unknown statement #{0}")]
    UnknownStatement(usize),

    /// The statement is not a list.
    #[error("Statement #{0} is not a list")]
    NotAList(usize),

    /// A record does not expose the requested field.
    #[error("Property name \"{0}\" not found")]
    UnknownField(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A template document could not be parsed.
    #[error("Document error: {0}")]
    Document(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaceError {
    /// Create a template error at the given position.
    pub fn template(position: usize, message: impl Into<String>) -> Self {
        Self::Template {
            position,
            message: message.into(),
        }
    }

    /// Create an unresolved token error for the raw token text.
    pub fn unresolved(token: impl Into<String>) -> Self {
        Self::UnresolvedToken {
            token: token.into(),
        }
    }

    /// Create a dialect lookup error.
    pub fn dialect_not_found(dialect: impl Into<String>, syntax: impl Into<String>) -> Self {
        Self::DialectNotFound {
            dialect: dialect.into(),
            syntax: syntax.into(),
        }
    }
}

/// Result type alias for sqlplace operations.
pub type PlaceResult<T> = Result<T, PlaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlaceError::template(5, "unexpected end of input");
        assert_eq!(
            err.to_string(),
            "Template error at position 5: unexpected end of input"
        );
    }

    #[test]
    fn test_dialect_error_names_both_keys() {
        let err = PlaceError::dialect_not_found("MSSQL", "top");
        assert_eq!(
            err.to_string(),
            "There is no syntax 'top' registered for dialect 'MSSQL'"
        );
    }

    #[test]
    fn test_unresolved_token_keeps_braces() {
        let err = PlaceError::unresolved("{X}");
        assert_eq!(err.to_string(), "Parameter {X} has not been assigned");
    }
}
