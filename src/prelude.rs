//! Autoconfigure prelude
//!
//! Commonly used types in one import.
//!
//! # Example
//!
//! ```rust
//! use opentdf_autoconfigure::prelude::*;
//!
//! # fn example() -> Result<(), Error> {
//! let fqn = AttributeValueFqn::parse("https://virtru.com/attr/Classification/value/Secret")?;
//! assert_eq!(fqn.value(), "Secret");
//!
//! let granter = Granter::default();
//! let plan = granter.plan(&["https://kas.us/".to_string()], uuid_split_id)?;
//! assert_eq!(plan, vec![KeySplitStep::new("https://kas.us/", "")]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// Core planning types
pub use crate::error::{Error, ErrorKind};
pub use crate::fqn::{AttributeNameFqn, AttributeValueFqn, FqnError};
pub use crate::granter::Granter;
pub use crate::plan::{uuid_split_id, KeySplitStep};
pub use crate::config::PlannerConfig;
pub use crate::planner::{PolicySource, SplitPlanner};

// Policy service records
pub use crate::policy::{Attribute, AttributeRule, KeyAccessServer, KeyAlgorithm, Namespace, Value};

// Capabilities the caller provides
pub use crate::key_cache::{KasKeyCache, KeyCache};
pub use crate::service::{AttributesService, ServiceError};
