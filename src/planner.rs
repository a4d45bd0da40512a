//! Split planner facade
//!
//! [`SplitPlanner`] bundles an attribute service, a key cache and a
//! [`PlannerConfig`] so that callers go from a data policy to a key split plan
//! in one call.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use opentdf_autoconfigure::service::{
//!     AttributesService, GetAttributeValuesByFqnsRequest, GetAttributeValuesByFqnsResponse,
//!     ServiceError,
//! };
//! use opentdf_autoconfigure::{KasKeyCache, PlannerConfig, PolicySource, SplitPlanner};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl AttributesService for Offline {
//!     async fn get_attribute_values_by_fqns(
//!         &self,
//!         _request: GetAttributeValuesByFqnsRequest,
//!     ) -> Result<GetAttributeValuesByFqnsResponse, ServiceError> {
//!         Err(ServiceError::Rejected("offline".to_string()))
//!     }
//! }
//!
//! let config = PlannerConfig::new().with_default_kas(["https://kas.us/"]);
//! let planner = SplitPlanner::new(Offline, KasKeyCache::new(), config);
//! let granter = planner.granter_from_values(&[])?;
//! let plan = planner.plan(&granter)?;
//! assert_eq!(plan[0].kas, "https://kas.us/");
//! # Ok::<(), opentdf_autoconfigure::Error>(())
//! ```

use crate::config::PlannerConfig;
use crate::error::Error;
use crate::fqn::AttributeValueFqn;
use crate::granter::Granter;
use crate::key_cache::KeyCache;
use crate::plan::{uuid_split_id, KeySplitStep};
use crate::policy::Value;
use crate::service::AttributesService;

/// Where the attribute definitions of a data policy come from
#[derive(Debug, Clone)]
pub enum PolicySource {
    /// Resolve through the attribute service
    Fqns(Vec<AttributeValueFqn>),
    /// Values already carrying their definitions and grants
    Values(Vec<Value>),
}

pub struct SplitPlanner<S, C> {
    service: S,
    cache: C,
    config: PlannerConfig,
}

impl<S, C> SplitPlanner<S, C>
where
    S: AttributesService,
    C: KeyCache,
{
    pub fn new(service: S, cache: C, config: PlannerConfig) -> Self {
        let max = config.max_fqns_per_request;
        Self {
            service,
            cache,
            config: config.with_max_fqns(max),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub async fn granter_from_service(&self, fqns: &[AttributeValueFqn]) -> Result<Granter, Error> {
        if fqns.len() > self.config.max_fqns_per_request {
            return Err(Error::TooManyFqns {
                count: fqns.len(),
                max: self.config.max_fqns_per_request,
            });
        }
        Granter::from_service(&self.service, &self.cache, fqns).await
    }

    pub fn granter_from_values(&self, values: &[Value]) -> Result<Granter, Error> {
        Granter::from_values(&self.cache, values)
    }

    /// Plan with the configured default KAS list and random split IDs
    pub fn plan(&self, granter: &Granter) -> Result<Vec<KeySplitStep>, Error> {
        self.plan_with(granter, uuid_split_id)
    }

    pub fn plan_with<F>(&self, granter: &Granter, gen_split_id: F) -> Result<Vec<KeySplitStep>, Error>
    where
        F: FnMut() -> String,
    {
        granter.plan(&self.config.default_kas, gen_split_id)
    }

    /// Build the granter for `source` and plan it
    pub async fn autoconfigure(&self, source: PolicySource) -> Result<Vec<KeySplitStep>, Error> {
        let granter = match source {
            PolicySource::Fqns(fqns) => self.granter_from_service(&fqns).await?,
            PolicySource::Values(values) => self.granter_from_values(&values)?,
        };
        self.plan(&granter)
    }
}
