//! Unified error type for key split planning
//!
//! FQN parsing and the attribute service keep their own error types for
//! precise handling; this type is what granter construction and planning
//! return.
//!
//! # Example
//!
//! ```
//! use opentdf_autoconfigure::{Error, ErrorKind, Granter};
//!
//! let granter = Granter::default();
//! let err = granter.plan(&[], || "1".to_string()).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::MissingDefault);
//! assert!(matches!(err, Error::MissingDefault));
//! ```

use crate::fqn::FqnError;
use crate::service::ServiceError;
use thiserror::Error;

/// Errors raised while building a granter or planning a key split
#[derive(Debug, Error)]
pub enum Error {
    /// FQN grammar or encoding violation
    #[error(transparent)]
    Invalid(#[from] FqnError),

    /// A requested FQN was absent from the attribute service response
    #[error("attribute not found: [{fqn}]")]
    AttributeNotFound { fqn: String },

    /// An offline value was supplied without its attribute definition
    #[error("no associated definition with value [{fqn}]")]
    MissingDefinition { fqn: String },

    /// An offline definition was supplied without its namespace
    #[error("no associated namespace with definition [{definition}] from value [{fqn}]")]
    MissingNamespace { definition: String, fqn: String },

    /// Planning reached a value the granter has no grant entry for
    #[error("no definition or grant found for [{fqn}]")]
    MissingGrant { fqn: String },

    #[error("no default KAS specified; required for grantless plans")]
    MissingDefault,

    #[error("too many attribute FQNs: {count} exceeds the limit of {max}")]
    TooManyFqns { count: usize, max: usize },

    #[error("attribute service error: {0}")]
    Service(#[from] ServiceError),
}

/// Abstract error kind for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Invalid,
    AttributeNotFound,
    MissingGrant,
    MissingDefault,
    TooManyFqns,
    Service,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            // a value without a definition is a malformed offline input
            Error::Invalid(_)
            | Error::MissingDefinition { .. }
            | Error::MissingNamespace { .. } => ErrorKind::Invalid,
            Error::AttributeNotFound { .. } => ErrorKind::AttributeNotFound,
            Error::MissingGrant { .. } => ErrorKind::MissingGrant,
            Error::MissingDefault => ErrorKind::MissingDefault,
            Error::TooManyFqns { .. } => ErrorKind::TooManyFqns,
            Error::Service(_) => ErrorKind::Service,
        }
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Service(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns a suggestion for how to fix this error, if available
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Error::Invalid(e) => Some(e.hint()),
            Error::AttributeNotFound { .. } => {
                Some("Check that the attribute value exists and is active in the policy service")
            }
            Error::MissingDefinition { .. } => {
                Some("Offline values must carry their attribute definition")
            }
            Error::MissingNamespace { .. } => {
                Some("Offline attribute definitions must carry their namespace")
            }
            Error::MissingDefault => {
                Some("Configure at least one default KAS for data without attribute grants")
            }
            Error::TooManyFqns { .. } => Some("Split the request into batches of at most 250 FQNs"),
            _ => None,
        }
    }

    /// Returns a stable error code for programmatic error handling
    ///
    /// Error codes follow the format: `OPENTDF_E_<CATEGORY>_<SPECIFIC>`
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Invalid(e) => e.error_code(),
            Error::AttributeNotFound { .. } => "OPENTDF_E_ATTRIBUTE_NOT_FOUND",
            Error::MissingDefinition { .. } => "OPENTDF_E_ATTRIBUTE_DEFINITION_MISSING",
            Error::MissingNamespace { .. } => "OPENTDF_E_NAMESPACE_MISSING",
            Error::MissingGrant { .. } => "OPENTDF_E_GRANT_MISSING",
            Error::MissingDefault => "OPENTDF_E_DEFAULT_KAS_MISSING",
            Error::TooManyFqns { .. } => "OPENTDF_E_FQN_LIMIT",
            Error::Service(_) => "OPENTDF_E_ATTRIBUTE_SERVICE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fqn::AttributeValueFqn;

    #[test]
    fn test_error_categories() {
        let fqn_err = AttributeValueFqn::parse("ftp://nope").unwrap_err();
        let err = Error::from(fqn_err);
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.error_code(), "OPENTDF_E_FQN_MALFORMED");
        assert!(err.suggestion().is_some());
        assert!(!err.is_retryable());

        let err = Error::Service(ServiceError::Transport {
            message: "unavailable".to_string(),
            source: None,
        });
        assert_eq!(err.kind(), ErrorKind::Service);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::MissingGrant {
            fqn: "https://virtru.com/attr/a/value/b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no definition or grant found for [https://virtru.com/attr/a/value/b]"
        );

        let err = Error::TooManyFqns { count: 251, max: 250 };
        assert!(err.to_string().contains("251"));
        assert_eq!(err.kind(), ErrorKind::TooManyFqns);
    }
}
