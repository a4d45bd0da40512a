pub mod config;
pub mod error;
pub mod expression;
pub mod fqn;
pub mod granter;
pub mod key_cache;
pub mod plan;
pub mod planner;
pub mod policy;
pub mod prelude;
pub mod service;

pub use config::PlannerConfig;
pub use error::{Error, ErrorKind};
pub use expression::{BooleanKeyExpression, Disjunction, KasTerm, KeyClause, ReducedExpression};
pub use fqn::{AttributeNameFqn, AttributeValueFqn, FqnError, FqnErrorKind};
pub use granter::{AttributeBooleanExpression, Granter, KeyAccessGrant, SingleAttributeClause};
pub use key_cache::{KasInfo, KasKeyCache, KeyCache};
pub use plan::{uuid_split_id, KeySplitStep};
pub use planner::{PolicySource, SplitPlanner};
pub use policy::{Attribute, AttributeRule, KeyAccessServer, KeyAlgorithm, Namespace, Value};
pub use service::{AttributesService, ServiceError};
