//! Fully Qualified Name (FQN) support for OpenTDF attributes
//!
//! Attribute names and attribute values are identified by URLs of the form:
//!
//! - Attribute: `https://<authority>/attr/<name>`
//! - Value: `https://<authority>/attr/<name>/value/<value>`
//!
//! The name and value segments are percent-encoded. Both FQN types keep the
//! caller's original string for display and a lowercased copy that is used
//! for equality and hashing, so `https://virtru.com/attr/Classification` and
//! `https://VIRTRU.com/attr/classification` identify the same attribute.
//!
//! # Example
//!
//! ```
//! use opentdf_autoconfigure::fqn::AttributeValueFqn;
//!
//! let fqn = AttributeValueFqn::parse("https://virtru.com/attr/Releasable%20To/value/CAN")?;
//! assert_eq!(fqn.authority(), "https://virtru.com");
//! assert_eq!(fqn.name(), "Releasable To");
//! assert_eq!(fqn.value(), "CAN");
//! assert_eq!(fqn.prefix().to_string(), "https://virtru.com/attr/Releasable%20To");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use lazy_static::lazy_static;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

lazy_static! {
    static ref NAME_FQN: Regex = Regex::new(r"^(https?://[A-Za-z0-9_./-]+)/attr/([^/\s]*)$")
        .expect("Failed to compile attribute name pattern");
    static ref VALUE_FQN: Regex =
        Regex::new(r"^(https?://[A-Za-z0-9_./-]+)/attr/(\S*)/value/(\S*)$")
            .expect("Failed to compile attribute value pattern");
}

/// Characters left unescaped when encoding a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// FQN parsing errors
///
/// Every variant corresponds to the `Invalid` error kind of the crate-level
/// [`Error`](crate::Error).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FqnError {
    #[error("invalid attribute FQN [{fqn}]: expected {expected}")]
    Malformed { fqn: String, expected: &'static str },

    #[error("invalid attribute FQN [{fqn}]: empty {component} segment")]
    EmptySegment {
        fqn: String,
        component: &'static str,
    },

    #[error("invalid attribute FQN [{fqn}]: slash not allowed in {component}")]
    SlashInSegment {
        fqn: String,
        component: &'static str,
    },

    #[error("invalid attribute FQN: error in attribute {component} [{segment}]")]
    BadEncoding {
        segment: String,
        component: &'static str,
    },
}

/// Error kind for programmatic FQN error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FqnErrorKind {
    Malformed,
    EmptySegment,
    SlashInSegment,
    BadEncoding,
}

impl FqnError {
    pub fn kind(&self) -> FqnErrorKind {
        match self {
            FqnError::Malformed { .. } => FqnErrorKind::Malformed,
            FqnError::EmptySegment { .. } => FqnErrorKind::EmptySegment,
            FqnError::SlashInSegment { .. } => FqnErrorKind::SlashInSegment,
            FqnError::BadEncoding { .. } => FqnErrorKind::BadEncoding,
        }
    }

    /// Returns a hint for how to fix this error
    pub fn hint(&self) -> &'static str {
        match self {
            FqnError::Malformed { .. } => {
                "FQN must follow format: https://<authority>/attr/<name>[/value/<value>]"
            }
            FqnError::EmptySegment { .. } => "Attribute names and values must not be empty",
            FqnError::SlashInSegment { .. } => {
                "Percent-encode '/' as %2F inside attribute names and values"
            }
            FqnError::BadEncoding { .. } => {
                "Use RFC 3986 percent-encoding (%XX with two hex digits) for UTF-8 text"
            }
        }
    }

    /// Returns a stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            FqnError::Malformed { .. } => "OPENTDF_E_FQN_MALFORMED",
            FqnError::EmptySegment { .. } => "OPENTDF_E_FQN_COMPONENT_MISSING",
            FqnError::SlashInSegment { .. } => "OPENTDF_E_FQN_SLASH",
            FqnError::BadEncoding { .. } => "OPENTDF_E_FQN_ENCODING",
        }
    }
}

/// FQN of an attribute definition: `<scheme>://<authority>/attr/<name>`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributeNameFqn {
    url: String,
    key: String,
    authority: String,
    name: String,
}

impl AttributeNameFqn {
    /// Parse and validate an attribute name FQN
    ///
    /// # Example
    ///
    /// ```
    /// use opentdf_autoconfigure::fqn::AttributeNameFqn;
    ///
    /// let fqn = AttributeNameFqn::parse("http://a-b.com/attr/b-c")?;
    /// assert_eq!(fqn.authority(), "http://a-b.com");
    /// assert_eq!(fqn.name(), "b-c");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn parse(s: &str) -> Result<Self, FqnError> {
        let caps = NAME_FQN.captures(s).ok_or_else(|| FqnError::Malformed {
            fqn: s.to_string(),
            expected: "<scheme>://<authority>/attr/<name>",
        })?;
        let authority = &caps[1];
        let raw_name = &caps[2];
        if raw_name.is_empty() {
            return Err(FqnError::EmptySegment {
                fqn: s.to_string(),
                component: "name",
            });
        }
        let name = path_unescape(raw_name, "name")?;

        Ok(Self {
            url: s.to_string(),
            key: s.to_lowercase(),
            authority: authority.to_string(),
            name,
        })
    }

    /// Scheme and authority, e.g. `https://virtru.com`
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Percent-decoded attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded identity of this FQN
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// FQN of the value `v` of this attribute; `v` is percent-encoded.
    ///
    /// ```
    /// use opentdf_autoconfigure::fqn::AttributeNameFqn;
    ///
    /// let rel = AttributeNameFqn::parse("https://virtru.com/attr/Releasable%20To")?;
    /// let usa = rel.select("U S A")?;
    /// assert_eq!(usa.to_string(), "https://virtru.com/attr/Releasable%20To/value/U%20S%20A");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn select(&self, v: &str) -> Result<AttributeValueFqn, FqnError> {
        let encoded = utf8_percent_encode(v, PATH_SEGMENT);
        AttributeValueFqn::parse(&format!("{}/value/{}", self.url, encoded))
    }
}

impl PartialEq for AttributeNameFqn {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AttributeNameFqn {}

impl Hash for AttributeNameFqn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for AttributeNameFqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl std::str::FromStr for AttributeNameFqn {
    type Err = FqnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'a> TryFrom<&'a str> for AttributeNameFqn {
    type Error = FqnError;

    fn try_from(s: &'a str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AttributeNameFqn {
    type Error = FqnError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AttributeNameFqn> for String {
    fn from(fqn: AttributeNameFqn) -> Self {
        fqn.url
    }
}

/// FQN of an attribute value: `<scheme>://<authority>/attr/<name>/value/<value>`
///
/// The parent attribute FQN is parsed once at construction and is available
/// through [`prefix`](Self::prefix).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributeValueFqn {
    url: String,
    key: String,
    value: String,
    prefix: AttributeNameFqn,
}

impl AttributeValueFqn {
    /// Parse and validate an attribute value FQN
    pub fn parse(s: &str) -> Result<Self, FqnError> {
        let caps = VALUE_FQN.captures(s).ok_or_else(|| FqnError::Malformed {
            fqn: s.to_string(),
            expected: "<scheme>://<authority>/attr/<name>/value/<value>",
        })?;
        for (component, segment) in [("name", &caps[2]), ("value", &caps[3])] {
            if segment.is_empty() {
                return Err(FqnError::EmptySegment {
                    fqn: s.to_string(),
                    component,
                });
            }
            if segment.contains('/') {
                return Err(FqnError::SlashInSegment {
                    fqn: s.to_string(),
                    component,
                });
            }
        }
        let value = path_unescape(&caps[3], "value")?;

        // caps[3] is a suffix of s, preceded by "/value/"
        let prefix_end = s.len() - caps[3].len() - "/value/".len();
        let prefix = AttributeNameFqn::parse(&s[..prefix_end])?;

        Ok(Self {
            url: s.to_string(),
            key: s.to_lowercase(),
            value,
            prefix,
        })
    }

    pub fn authority(&self) -> &str {
        self.prefix.authority()
    }

    /// Percent-decoded attribute name
    pub fn name(&self) -> &str {
        self.prefix.name()
    }

    /// Percent-decoded attribute value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// FQN of the attribute definition that owns this value
    pub fn prefix(&self) -> &AttributeNameFqn {
        &self.prefix
    }

    /// Case-folded identity of this FQN
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl PartialEq for AttributeValueFqn {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AttributeValueFqn {}

impl Hash for AttributeValueFqn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for AttributeValueFqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl std::str::FromStr for AttributeValueFqn {
    type Err = FqnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'a> TryFrom<&'a str> for AttributeValueFqn {
    type Error = FqnError;

    fn try_from(s: &'a str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AttributeValueFqn {
    type Error = FqnError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AttributeValueFqn> for String {
    fn from(fqn: AttributeValueFqn) -> Self {
        fqn.url
    }
}

/// Strict percent-decoding of a path segment.
///
/// Every `%` must introduce two hex digits and the decoded bytes must be UTF-8.
fn path_unescape(segment: &str, component: &'static str) -> Result<String, FqnError> {
    let bad_encoding = || FqnError::BadEncoding {
        segment: segment.to_string(),
        component,
    };

    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escaped = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !escaped {
                return Err(bad_encoding());
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| bad_encoding())
}
