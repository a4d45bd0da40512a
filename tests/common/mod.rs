//! Common test utilities for autoconfigure integration tests
//!
//! Provides a fixed grant universe and an in-memory attribute service that
//! serves it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;

pub use opentdf_autoconfigure::service::{
    AttributeAndValue, AttributesService, GetAttributeValuesByFqnsRequest,
    GetAttributeValuesByFqnsResponse, ServiceError,
};
pub use opentdf_autoconfigure::{
    Attribute, AttributeNameFqn, AttributeRule, AttributeValueFqn, Granter, KasKeyCache,
    KeyAccessServer, KeyAlgorithm, KeySplitStep, Namespace, Value,
};

pub const KAS_AU: &str = "https://kas.au/";
pub const KAS_CA: &str = "https://kas.ca/";
pub const KAS_UK: &str = "https://kas.uk/";
pub const KAS_NZ: &str = "https://kas.nz/";
pub const KAS_US: &str = "https://kas.us/";
pub const KAS_US_HCS: &str = "https://hcs.kas.us/";
pub const KAS_US_SA: &str = "https://si.kas.us/";
pub const ATTR_KAS: &str = "https://attr.kas.com/";
pub const VALUE_KAS: &str = "https://value.kas.com/";
pub const NAMESPACE_KAS: &str = "https://namespace.kas.com/";

pub const FAKE_PEM: &str = "-----BEGIN PUBLIC KEY-----\nMIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA\n-----END PUBLIC KEY-----\n";

pub const CLS: &str = "https://virtru.com/attr/Classification";
pub const N2K: &str = "https://virtru.com/attr/Need%20to%20Know";
pub const REL: &str = "https://virtru.com/attr/Releasable%20To";
pub const SPECKED: &str = "https://other.com/attr/specified";
pub const UNSPECKED: &str = "https://other.com/attr/unspecified";
pub const SPK_SPECKED: &str = "https://hasgrants.com/attr/specified";
pub const SPK_UNSPECKED: &str = "https://hasgrants.com/attr/unspecified";

pub const CLS_A: &str = "https://virtru.com/attr/Classification/value/Allowed";
pub const CLS_S: &str = "https://virtru.com/attr/Classification/value/Secret";
pub const CLS_TS: &str = "https://virtru.com/attr/Classification/value/Top%20Secret";

pub const N2K_HCS: &str = "https://virtru.com/attr/Need%20to%20Know/value/HCS";
pub const N2K_INT: &str = "https://virtru.com/attr/Need%20to%20Know/value/INT";
pub const N2K_SI: &str = "https://virtru.com/attr/Need%20to%20Know/value/SI";

pub const REL_AUS: &str = "https://virtru.com/attr/Releasable%20To/value/AUS";
pub const REL_CAN: &str = "https://virtru.com/attr/Releasable%20To/value/CAN";
pub const REL_GBR: &str = "https://virtru.com/attr/Releasable%20To/value/GBR";
pub const REL_NZL: &str = "https://virtru.com/attr/Releasable%20To/value/NZL";
pub const REL_USA: &str = "https://virtru.com/attr/Releasable%20To/value/USA";
pub const REL_FVEY: &str = "https://virtru.com/attr/Releasable%20To/value/FVEY";

pub const UNS2UNS: &str = "https://other.com/attr/unspecified/value/unspecked";
pub const UNS2SPK: &str = "https://other.com/attr/unspecified/value/specked";
pub const SPK2UNS: &str = "https://other.com/attr/specified/value/unspecked";
pub const SPK2SPK: &str = "https://other.com/attr/specified/value/specked";

pub const SPK2UNS2UNS: &str = "https://hasgrants.com/attr/unspecified/value/unspecked";
pub const SPK2UNS2SPK: &str = "https://hasgrants.com/attr/unspecified/value/specked";
pub const SPK2SPK2UNS: &str = "https://hasgrants.com/attr/specified/value/unspecked";
pub const SPK2SPK2SPK: &str = "https://hasgrants.com/attr/specified/value/specked";

/// Install a stderr subscriber honoring `RUST_LOG`; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

pub fn value_fqn(s: &str) -> AttributeValueFqn {
    AttributeValueFqn::parse(s).expect("fixture FQN must parse")
}

pub fn value_fqns(fqns: &[&str]) -> Vec<AttributeValueFqn> {
    fqns.iter().map(|s| value_fqn(s)).collect()
}

pub fn kases(uris: &[&str]) -> Vec<String> {
    uris.iter().map(|u| u.to_string()).collect()
}

pub fn step(kas: &str, split_id: &str) -> KeySplitStep {
    KeySplitStep::new(kas, split_id)
}

/// Split ID generator yielding "1", "2", ...
pub fn counter() -> impl FnMut() -> String {
    let mut n = 0;
    move || {
        n += 1;
        n.to_string()
    }
}

/// Grant with a cached RSA key, as the policy service returns them
pub fn grant(kas: &str, kid: &str) -> KeyAccessServer {
    KeyAccessServer::new(kas).with_kas_key(kid, KeyAlgorithm::Rsa2048, FAKE_PEM)
}

fn namespace(id: &str, name: &str, grants: Vec<KeyAccessServer>) -> Namespace {
    Namespace {
        id: id.to_string(),
        name: name.to_string(),
        fqn: format!("https://{name}"),
        grants,
    }
}

/// Definition for a known attribute name, keeping the caller's casing
pub fn attribute_for(fqn: &AttributeNameFqn) -> Option<Attribute> {
    let virtru = namespace("v", "virtru.com", vec![]);
    let other = namespace("o", "other.com", vec![]);
    let has_grants = namespace("h", "hasgrants.com", vec![KeyAccessServer::new(NAMESPACE_KAS)]);

    let (id, ns, name, rule, grants) = match fqn.key() {
        k if k == CLS.to_lowercase() => ("CLS", virtru, "Classification", AttributeRule::Hierarchy, vec![]),
        k if k == N2K.to_lowercase() => ("N2K", virtru, "Need to Know", AttributeRule::AllOf, vec![]),
        k if k == REL.to_lowercase() => ("REL", virtru, "Releasable To", AttributeRule::AnyOf, vec![]),
        k if k == SPECKED => ("SPK", other, "specified", AttributeRule::AnyOf, vec![grant(ATTR_KAS, "r1")]),
        k if k == UNSPECKED => ("UNS", other, "unspecified", AttributeRule::AnyOf, vec![]),
        k if k == SPK_SPECKED => (
            "SPK",
            has_grants,
            "specified",
            AttributeRule::AnyOf,
            vec![grant(ATTR_KAS, "r1")],
        ),
        k if k == SPK_UNSPECKED => ("UNS", has_grants, "unspecified", AttributeRule::AnyOf, vec![]),
        _ => return None,
    };
    Some(Attribute {
        id: id.to_string(),
        namespace: Some(ns),
        name: name.to_string(),
        rule,
        fqn: fqn.to_string(),
        grants,
    })
}

/// Fully hydrated value for a known attribute value FQN
pub fn value_for(fqn: &AttributeValueFqn) -> Option<Value> {
    let attribute = attribute_for(fqn.prefix())?;
    let v = fqn.value().to_string();
    let upper = v.to_uppercase();

    let prefix = fqn.prefix().key();
    let grants = if prefix == N2K.to_lowercase() {
        match upper.as_str() {
            "INT" => vec![grant(KAS_UK, "r1")],
            "HCS" => vec![grant(KAS_US_HCS, "r2")],
            "SI" => vec![grant(KAS_US_SA, "r2")],
            _ => vec![],
        }
    } else if prefix == REL.to_lowercase() {
        match upper.as_str() {
            "FVEY" => [KAS_AU, KAS_CA, KAS_UK, KAS_NZ, KAS_US]
                .iter()
                .map(|k| grant(k, "r1"))
                .collect(),
            "AUS" => vec![grant(KAS_AU, "r1")],
            "CAN" => vec![grant(KAS_CA, "r1")],
            "GBR" => vec![grant(KAS_UK, "r1")],
            "NZL" => vec![grant(KAS_NZ, "r1")],
            "USA" => vec![grant(KAS_US, "r1")],
            _ => vec![],
        }
    } else if upper == "SPECKED" && prefix != CLS.to_lowercase() {
        vec![grant(VALUE_KAS, "r1")]
    } else {
        vec![]
    };

    Some(Value {
        id: format!("{}:{}", attribute.id, v),
        attribute: Some(Box::new(attribute)),
        value: v,
        fqn: fqn.to_string(),
        grants,
    })
}

pub fn values_for(fqns: &[&str]) -> Vec<Value> {
    fqns.iter()
        .map(|s| value_for(&value_fqn(s)).expect("fixture value must be known"))
        .collect()
}

/// In-memory attribute service over the fixture universe
#[derive(Default)]
pub struct MockAttributesService {
    calls: AtomicUsize,
    omit: HashSet<String>,
    requests: Mutex<Vec<GetAttributeValuesByFqnsRequest>>,
}

impl MockAttributesService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave `fqn` out of every response
    pub fn omitting(mut self, fqn: &str) -> Self {
        self.omit.insert(fqn.to_lowercase());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GetAttributeValuesByFqnsRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AttributesService for MockAttributesService {
    async fn get_attribute_values_by_fqns(
        &self,
        request: GetAttributeValuesByFqnsRequest,
    ) -> Result<GetAttributeValuesByFqnsResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let mut response = GetAttributeValuesByFqnsResponse::default();
        for requested in &request.fqns {
            if self.omit.contains(&requested.to_lowercase()) {
                continue;
            }
            let fqn = AttributeValueFqn::parse(requested)
                .map_err(|e| ServiceError::Rejected(e.to_string()))?;
            let Some(value) = value_for(&fqn) else {
                continue;
            };
            response.fqn_attribute_values.insert(
                requested.clone(),
                AttributeAndValue {
                    attribute: value.attribute.as_deref().cloned(),
                    value: Some(value),
                },
            );
        }
        Ok(response)
    }
}

/// Service that always fails at the transport level
pub struct UnavailableService;

#[async_trait]
impl AttributesService for UnavailableService {
    async fn get_attribute_values_by_fqns(
        &self,
        _request: GetAttributeValuesByFqnsRequest,
    ) -> Result<GetAttributeValuesByFqnsResponse, ServiceError> {
        Err(ServiceError::transport(
            "connection refused",
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "platform unreachable"),
        ))
    }
}

/// Alternate the case of the attribute name and value of an FQN.
///
/// Odd positions of the name are upper-cased; even positions of the value
/// are upper-cased.
pub fn sponge_case(fqn: &str) -> String {
    let (head, rest) = fqn.split_once("/attr/").expect("fixture FQN has /attr/");
    let (name, value) = match rest.split_once("/value/") {
        Some((n, v)) => (n, Some(v)),
        None => (rest, None),
    };

    let mut out = format!("{head}/attr/");
    for (i, c) in name.chars().enumerate() {
        if i % 2 == 1 {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    if let Some(value) = value {
        out.push_str("/value/");
        for (i, c) in value.chars().enumerate() {
            if i % 2 == 0 {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
        }
    }
    out
}
