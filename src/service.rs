//! Attribute service capability
//!
//! The granter resolves attribute value FQNs to their definitions and grants
//! through a single batched call. Transport is left to the implementor: a
//! gRPC or Connect client in production, an in-memory map in tests.

use crate::policy::{Attribute, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Server-side limit on FQNs per `GetAttributeValuesByFqns` call
pub const MAX_FQNS_PER_REQUEST: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeValueSelector {
    pub with_key_access_grants: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetAttributeValuesByFqnsRequest {
    pub fqns: Vec<String>,
    pub with_value: AttributeValueSelector,
}

impl GetAttributeValuesByFqnsRequest {
    /// Request for `fqns` including key access grants
    pub fn with_grants(fqns: Vec<String>) -> Self {
        Self {
            fqns,
            with_value: AttributeValueSelector {
                with_key_access_grants: true,
            },
        }
    }
}

/// Definition and value resolved for one requested FQN
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeAndValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetAttributeValuesByFqnsResponse {
    pub fqn_attribute_values: HashMap<String, AttributeAndValue>,
}

/// Errors reported by an attribute service implementation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("attribute service request failed: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("attribute service rejected request: {0}")]
    Rejected(String),

    #[error("attribute service request cancelled")]
    Cancelled,
}

impl ServiceError {
    pub fn transport(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ServiceError::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Transport failures may succeed on retry; rejections will not
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transport { .. })
    }
}

/// Policy attribute service as consumed by the granter.
///
/// Dropping the returned future cancels the request; timeouts belong to the
/// implementation or the caller.
#[async_trait]
pub trait AttributesService: Send + Sync {
    async fn get_attribute_values_by_fqns(
        &self,
        request: GetAttributeValuesByFqnsRequest,
    ) -> Result<GetAttributeValuesByFqnsResponse, ServiceError>;
}

#[async_trait]
impl<T: AttributesService + ?Sized> AttributesService for &T {
    async fn get_attribute_values_by_fqns(
        &self,
        request: GetAttributeValuesByFqnsRequest,
    ) -> Result<GetAttributeValuesByFqnsResponse, ServiceError> {
        (**self).get_attribute_values_by_fqns(request).await
    }
}

#[async_trait]
impl<T: AttributesService + ?Sized> AttributesService for Arc<T> {
    async fn get_attribute_values_by_fqns(
        &self,
        request: GetAttributeValuesByFqnsRequest,
    ) -> Result<GetAttributeValuesByFqnsResponse, ServiceError> {
        (**self).get_attribute_values_by_fqns(request).await
    }
}
