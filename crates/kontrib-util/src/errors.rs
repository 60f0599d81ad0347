use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all kontrib operations.
///
/// Merge-level variants (`Replacement`, `Exclusion`, `AmbiguousBinding`,
/// `NotInterface`, `Declaration`) abort a single merge request. The
/// remaining variants are reported against the whole session.
#[derive(Debug, Error, Diagnostic)]
pub enum KontribError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dependency's hint token could not be decoded.
    #[error("Malformed hint `{token}`: {reason}")]
    #[diagnostic(
        code(kontrib::malformed_hint),
        help("The dependency was probably compiled by an incompatible producer; rebuild it")
    )]
    MalformedHint { token: String, reason: String },

    /// A `replaces` target is missing, of the wrong kind, or outside the merged scopes.
    #[error("{message}")]
    #[diagnostic(code(kontrib::replacement))]
    Replacement {
        replacer: String,
        replaced: String,
        message: String,
    },

    /// An excluded type was never contributed, or cannot be excluded.
    #[error("{message}")]
    #[diagnostic(code(kontrib::exclusion))]
    Exclusion {
        target: String,
        excluded: Vec<String>,
        message: String,
    },

    /// Two or more bindings tie for the same binding key at the highest rank.
    #[error(
        "There are multiple contributed bindings with the same bound type and rank. \
         The bound type is {bound_type}{}. The scope is {scope}. The rank is {rank}. \
         The contributed binding classes are: [{}]",
        qualifier.as_ref().map(|q| format!(" (qualified by {q})")).unwrap_or_default(),
        contributors.join(", ")
    )]
    #[diagnostic(
        code(kontrib::ambiguous_binding),
        help("Raise the rank of the binding that should win, or replace the others")
    )]
    AmbiguousBinding {
        scope: String,
        bound_type: String,
        qualifier: Option<String>,
        rank: String,
        contributors: Vec<String>,
    },

    /// A contribution or merge target that must be an interface is not one.
    #[error("{message}")]
    #[diagnostic(code(kontrib::not_interface))]
    NotInterface { type_name: String, message: String },

    /// A local contribution annotation cannot be turned into a record.
    #[error("{message}")]
    #[diagnostic(
        code(kontrib::declaration),
        help("Fix the contribution annotation on {type_name}")
    )]
    Declaration { type_name: String, message: String },

    /// Invalid engine configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check the [merge] engine configuration"))]
    Config { message: String },

    /// The host's declaration model failed; its state is unusable.
    #[error("Host error: {message}")]
    Host { message: String },
}

impl KontribError {
    /// Whether this error invalidates the whole compilation session rather
    /// than a single merge request.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            KontribError::Io(_)
                | KontribError::Host { .. }
                | KontribError::Config { .. }
                | KontribError::MalformedHint { .. }
        )
    }
}

/// Convenience alias for results carrying a [`KontribError`].
pub type KontribResult<T> = Result<T, KontribError>;
