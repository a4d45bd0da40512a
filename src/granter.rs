//! Grant table construction and attribute boolean expressions
//!
//! A [`Granter`] maps every attribute value FQN of a data policy to the Key
//! Access Servers granted to it, together with the attribute definition that
//! owns the value. It is built once, either online from the attribute service
//! ([`Granter::from_service`]) or offline from pre-fetched values
//! ([`Granter::from_values`]), and is then read by the planner.
//!
//! Grants are taken from the most specific level that has any: the value's
//! own grants, else the attribute definition's, else the definition's
//! namespace's. A value with no grant at any level is still recorded, with
//! an empty KAS list, so that planning falls back to the default KAS.
//!
//! # Example
//!
//! ```
//! use opentdf_autoconfigure::policy::{Attribute, AttributeRule, KeyAccessServer, Namespace, Value};
//! use opentdf_autoconfigure::{Granter, KasKeyCache};
//!
//! let rel = Attribute {
//!     namespace: Some(Namespace {
//!         name: "virtru.com".to_string(),
//!         fqn: "https://virtru.com".to_string(),
//!         ..Default::default()
//!     }),
//!     name: "Releasable To".to_string(),
//!     rule: AttributeRule::AnyOf,
//!     fqn: "https://virtru.com/attr/Releasable%20To".to_string(),
//!     ..Default::default()
//! };
//! let can = Value {
//!     value: "CAN".to_string(),
//!     fqn: "https://virtru.com/attr/Releasable%20To/value/CAN".to_string(),
//!     attribute: Some(Box::new(rel)),
//!     grants: vec![KeyAccessServer::new("https://kas.ca/")],
//!     ..Default::default()
//! };
//!
//! let granter = Granter::from_values(&KasKeyCache::new(), &[can])?;
//! let plan = granter.plan(&["https://kas.us/".to_string()], || "1".to_string())?;
//! assert_eq!(plan.len(), 1);
//! assert_eq!(plan[0].kas, "https://kas.ca/");
//! assert_eq!(plan[0].split_id, "");
//! # Ok::<(), opentdf_autoconfigure::Error>(())
//! ```

use crate::error::Error;
use crate::expression::{BooleanKeyExpression, ClauseOperator, KasTerm, KeyClause};
use crate::fqn::AttributeValueFqn;
use crate::key_cache::{store_grant_keys, KeyCache};
use crate::policy::{Attribute, AttributeRule, KeyAccessServer, Value};
use crate::service::{AttributesService, GetAttributeValuesByFqnsRequest, MAX_FQNS_PER_REQUEST};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// KAS URIs granted to one attribute value, with the value's definition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyAccessGrant {
    pub attribute: Option<Arc<Attribute>>,
    pub kases: Vec<String>,
}

/// Which level of the policy hierarchy a value's grants came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantLevel {
    Value,
    Attribute,
    Namespace,
    /// No level had a grant; the default KAS applies
    None,
}

/// Grant table for one data policy
#[derive(Debug, Clone, Default)]
pub struct Granter {
    policy: Vec<AttributeValueFqn>,
    grants: HashMap<String, KeyAccessGrant>,
}

impl Granter {
    /// Resolve `fqns` through the attribute service in one batched call.
    ///
    /// Every requested FQN must come back from the service. Public keys cached
    /// on any grant are stored to `cache`. An empty `fqns` makes no call.
    pub async fn from_service<S, C>(
        service: &S,
        cache: &C,
        fqns: &[AttributeValueFqn],
    ) -> Result<Self, Error>
    where
        S: AttributesService + ?Sized,
        C: KeyCache + ?Sized,
    {
        if fqns.len() > MAX_FQNS_PER_REQUEST {
            return Err(Error::TooManyFqns {
                count: fqns.len(),
                max: MAX_FQNS_PER_REQUEST,
            });
        }
        let mut granter = Granter {
            policy: fqns.to_vec(),
            grants: HashMap::new(),
        };
        if fqns.is_empty() {
            return Ok(granter);
        }

        let request =
            GetAttributeValuesByFqnsRequest::with_grants(fqns.iter().map(|f| f.to_string()).collect());
        let response = service.get_attribute_values_by_fqns(request).await?;

        // the service may answer with a different case than requested
        let resolved: HashMap<String, _> = response
            .fqn_attribute_values
            .into_iter()
            .map(|(fqn, pair)| (fqn.to_lowercase(), pair))
            .collect();

        for fqn in fqns {
            let pair = resolved
                .get(fqn.key())
                .ok_or_else(|| Error::AttributeNotFound {
                    fqn: fqn.to_string(),
                })?;
            let definition = pair.attribute.clone().map(Arc::new);
            granter.ingest(fqn, definition, pair.value.as_ref(), &cache);
        }

        debug!(
            values = granter.policy.len(),
            grants = granter.grants.len(),
            "built granter from attribute service"
        );
        Ok(granter)
    }

    /// Build a granter from fully hydrated values, without network access.
    ///
    /// Each value must carry its attribute definition, and each definition
    /// its namespace.
    pub fn from_values<C>(cache: &C, values: &[Value]) -> Result<Self, Error>
    where
        C: KeyCache + ?Sized,
    {
        let mut granter = Granter {
            policy: Vec::with_capacity(values.len()),
            grants: HashMap::new(),
        };
        for value in values {
            let fqn = AttributeValueFqn::parse(&value.fqn)?;
            let definition = value
                .attribute
                .as_deref()
                .cloned()
                .map(Arc::new)
                .ok_or_else(|| Error::MissingDefinition {
                    fqn: fqn.to_string(),
                })?;
            if definition.namespace.is_none() {
                return Err(Error::MissingNamespace {
                    definition: definition.fqn.clone(),
                    fqn: fqn.to_string(),
                });
            }
            granter.ingest(&fqn, Some(definition), Some(value), &cache);
            granter.policy.push(fqn);
        }

        debug!(
            values = granter.policy.len(),
            grants = granter.grants.len(),
            "built granter from attribute values"
        );
        Ok(granter)
    }

    /// The data policy, in caller order
    pub fn policy(&self) -> &[AttributeValueFqn] {
        &self.policy
    }

    /// Grant entry for `fqn`, compared case-insensitively
    pub fn by_attribute(&self, fqn: &AttributeValueFqn) -> Option<&KeyAccessGrant> {
        self.grants.get(fqn.key())
    }

    pub fn grants(&self) -> impl Iterator<Item = (&str, &KeyAccessGrant)> {
        self.grants.iter().map(|(k, g)| (k.as_str(), g))
    }

    fn add_grant(&mut self, fqn: &AttributeValueFqn, kas: &str, attribute: &Option<Arc<Attribute>>) {
        self.grants
            .entry(fqn.key().to_string())
            .or_insert_with(|| KeyAccessGrant {
                attribute: attribute.clone(),
                kases: Vec::new(),
            })
            .kases
            .push(kas.to_string());
    }

    fn ingest(
        &mut self,
        fqn: &AttributeValueFqn,
        definition: Option<Arc<Attribute>>,
        value: Option<&Value>,
        cache: &dyn KeyCache,
    ) -> GrantLevel {
        let namespace_grants = definition
            .as_deref()
            .and_then(|d| d.namespace.as_ref())
            .map(|ns| ns.grants.as_slice())
            .unwrap_or_default();
        let attribute_grants = definition
            .as_deref()
            .map(|d| d.grants.as_slice())
            .unwrap_or_default();
        let value_grants = value.map(|v| v.grants.as_slice()).unwrap_or_default();

        for grants in [value_grants, attribute_grants, namespace_grants] {
            store_grant_keys(grants, cache);
        }

        let levels = [
            (GrantLevel::Value, value_grants),
            (GrantLevel::Attribute, attribute_grants),
            (GrantLevel::Namespace, namespace_grants),
        ];
        for (level, grants) in levels {
            let kases: Vec<&KeyAccessServer> = grants
                .iter()
                .filter(|g| {
                    if g.uri.is_empty() {
                        debug!(value = %fqn, "ignoring grant without KAS URI");
                    }
                    !g.uri.is_empty()
                })
                .collect();
            if kases.is_empty() {
                continue;
            }
            for kas in kases {
                self.add_grant(fqn, &kas.uri, &definition);
            }
            debug!(value = %fqn, ?level, "added grants");
            return level;
        }

        self.grants
            .entry(fqn.key().to_string())
            .or_insert_with(|| KeyAccessGrant {
                attribute: definition,
                kases: Vec::new(),
            });
        debug!(value = %fqn, "no grants found; default KAS applies");
        GrantLevel::None
    }

    /// Group the policy's values by attribute, in first-seen order.
    ///
    /// Values without a grant entry are left out.
    pub fn attribute_boolean(&self) -> AttributeBooleanExpression {
        let mut must: Vec<SingleAttributeClause> = Vec::new();
        let mut by_prefix: HashMap<&str, usize> = HashMap::new();
        for value in &self.policy {
            let prefix = value.prefix().key();
            if let Some(&i) = by_prefix.get(prefix) {
                must[i].values.push(value.clone());
            } else if let Some(grant) = self.by_attribute(value) {
                by_prefix.insert(prefix, must.len());
                must.push(SingleAttributeClause {
                    definition: grant.attribute.clone(),
                    values: vec![value.clone()],
                });
            }
        }
        AttributeBooleanExpression { must }
    }

    /// Replace every value of `expr` with its granted KAS terms.
    ///
    /// Values without grants become a single [`KasTerm::Default`].
    pub fn keyed_expression(
        &self,
        expr: &AttributeBooleanExpression,
    ) -> Result<BooleanKeyExpression, Error> {
        let mut clauses = Vec::with_capacity(expr.must.len());
        for clause in &expr.must {
            let mut terms = Vec::with_capacity(clause.values.len());
            for value in &clause.values {
                let grant = self.by_attribute(value).ok_or_else(|| Error::MissingGrant {
                    fqn: value.to_string(),
                })?;
                if grant.kases.is_empty() {
                    terms.push(KasTerm::Default);
                } else {
                    terms.extend(grant.kases.iter().cloned().map(KasTerm::Kas));
                }
            }

            let operator = ClauseOperator::from(clause.rule());
            if operator == ClauseOperator::Unspecified {
                warn!(attribute = %clause.fqn(), "unknown attribute rule type; treating as allOf");
            }
            clauses.push(KeyClause { operator, terms });
        }
        Ok(BooleanKeyExpression::new(clauses))
    }
}

/// Values of one attribute that appear in the data policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleAttributeClause {
    pub definition: Option<Arc<Attribute>>,
    pub values: Vec<AttributeValueFqn>,
}

impl SingleAttributeClause {
    pub fn rule(&self) -> AttributeRule {
        self.definition
            .as_deref()
            .map(|d| d.rule)
            .unwrap_or_default()
    }

    /// Definition FQN, falling back to the first value's prefix
    pub fn fqn(&self) -> String {
        match self.definition.as_deref() {
            Some(d) if !d.fqn.is_empty() => d.fqn.clone(),
            _ => self
                .values
                .first()
                .map(|v| v.prefix().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Conjunction of per-attribute clauses
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeBooleanExpression {
    pub must: Vec<SingleAttributeClause>,
}

impl fmt::Display for AttributeBooleanExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.must.is_empty() {
            return f.write_str("∅");
        }
        for (i, clause) in self.must.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            match clause.values.as_slice() {
                [] => f.write_str(&clause.fqn())?,
                [only] => write!(f, "{only}")?,
                values => {
                    write!(f, "{}/value/{{", clause.fqn())?;
                    for (j, v) in values.iter().enumerate() {
                        if j > 0 {
                            f.write_str(",")?;
                        }
                        f.write_str(v.value())?;
                    }
                    f.write_str("}")?;
                }
            }
        }
        Ok(())
    }
}
