//! Policy service records
//!
//! These mirror the JSON form of the OpenTDF policy service objects that the
//! granter consumes: namespaces, attribute definitions, attribute values and
//! the Key Access Servers granted to them. Field names follow the service's
//! camelCase JSON so that pre-fetched definitions can be loaded directly with
//! `serde_json`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Combinator an attribute definition applies over its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeRule {
    /// Values are ordered levels; holding a higher level grants the lower ones
    Hierarchy,
    /// Every listed value is required
    AllOf,
    /// Any listed value suffices
    AnyOf,
    #[default]
    Unspecified,
}

impl AttributeRule {
    /// Parse a rule from its policy service spelling.
    ///
    /// Accepts the protobuf enum names (`ATTRIBUTE_RULE_TYPE_ENUM_ANY_OF`) as
    /// well as the short camelCase names (`anyOf`). Anything else is
    /// `Unspecified`.
    pub fn from_name(name: &str) -> Self {
        let short = name
            .strip_prefix("ATTRIBUTE_RULE_TYPE_ENUM_")
            .unwrap_or(name)
            .replace('_', "")
            .to_ascii_lowercase();
        match short.as_str() {
            "hierarchy" => AttributeRule::Hierarchy,
            "allof" => AttributeRule::AllOf,
            "anyof" => AttributeRule::AnyOf,
            _ => AttributeRule::Unspecified,
        }
    }

    /// Parse a rule from its protobuf enum number
    pub fn from_number(n: i64) -> Self {
        match n {
            1 => AttributeRule::AllOf,
            2 => AttributeRule::AnyOf,
            3 => AttributeRule::Hierarchy,
            _ => AttributeRule::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeRule::Hierarchy => "hierarchy",
            AttributeRule::AllOf => "allOf",
            AttributeRule::AnyOf => "anyOf",
            AttributeRule::Unspecified => "unspecified",
        }
    }

    fn proto_name(&self) -> &'static str {
        match self {
            AttributeRule::Hierarchy => "ATTRIBUTE_RULE_TYPE_ENUM_HIERARCHY",
            AttributeRule::AllOf => "ATTRIBUTE_RULE_TYPE_ENUM_ALL_OF",
            AttributeRule::AnyOf => "ATTRIBUTE_RULE_TYPE_ENUM_ANY_OF",
            AttributeRule::Unspecified => "ATTRIBUTE_RULE_TYPE_ENUM_UNSPECIFIED",
        }
    }
}

impl fmt::Display for AttributeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enum fields arrive either as names or as protobuf numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum EnumRepr {
    Name(String),
    Number(i64),
}

impl Serialize for AttributeRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.proto_name())
    }
}

impl<'de> Deserialize<'de> for AttributeRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match EnumRepr::deserialize(deserializer)? {
            EnumRepr::Name(name) => AttributeRule::from_name(&name),
            EnumRepr::Number(n) => AttributeRule::from_number(n),
        })
    }
}

/// Public key algorithms a KAS may advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyAlgorithm {
    Rsa2048,
    Rsa4096,
    EcP256,
    EcP384,
    EcP521,
    #[default]
    Unspecified,
}

impl KeyAlgorithm {
    /// Parse an algorithm from any of its spellings.
    ///
    /// Both protobuf families are accepted (`KAS_PUBLIC_KEY_ALG_ENUM_RSA_2048`,
    /// `ALGORITHM_RSA_2048`) as well as key type names (`rsa:2048`,
    /// `ec:secp256r1`).
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let short = lower
            .strip_prefix("kas_public_key_alg_enum_")
            .or_else(|| lower.strip_prefix("algorithm_"))
            .unwrap_or(&lower);
        match short {
            "rsa_2048" | "rsa:2048" => KeyAlgorithm::Rsa2048,
            "rsa_4096" | "rsa:4096" => KeyAlgorithm::Rsa4096,
            "ec_secp256r1" | "ec_p256" | "ec:secp256r1" => KeyAlgorithm::EcP256,
            "ec_secp384r1" | "ec_p384" | "ec:secp384r1" => KeyAlgorithm::EcP384,
            "ec_secp521r1" | "ec_p521" | "ec:secp521r1" => KeyAlgorithm::EcP521,
            _ => KeyAlgorithm::Unspecified,
        }
    }

    /// Parse a `KasPublicKeyAlgEnum` number
    pub fn from_number(n: i64) -> Self {
        match n {
            1 => KeyAlgorithm::Rsa2048,
            2 => KeyAlgorithm::Rsa4096,
            5 => KeyAlgorithm::EcP256,
            6 => KeyAlgorithm::EcP384,
            7 => KeyAlgorithm::EcP521,
            _ => KeyAlgorithm::Unspecified,
        }
    }

    /// Key type name used in KAS key records; empty when unspecified
    pub fn key_type(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa2048 => "rsa:2048",
            KeyAlgorithm::Rsa4096 => "rsa:4096",
            KeyAlgorithm::EcP256 => "ec:secp256r1",
            KeyAlgorithm::EcP384 => "ec:secp384r1",
            KeyAlgorithm::EcP521 => "ec:secp521r1",
            KeyAlgorithm::Unspecified => "",
        }
    }

    fn proto_name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa2048 => "KAS_PUBLIC_KEY_ALG_ENUM_RSA_2048",
            KeyAlgorithm::Rsa4096 => "KAS_PUBLIC_KEY_ALG_ENUM_RSA_4096",
            KeyAlgorithm::EcP256 => "KAS_PUBLIC_KEY_ALG_ENUM_EC_SECP256R1",
            KeyAlgorithm::EcP384 => "KAS_PUBLIC_KEY_ALG_ENUM_EC_SECP384R1",
            KeyAlgorithm::EcP521 => "KAS_PUBLIC_KEY_ALG_ENUM_EC_SECP521R1",
            KeyAlgorithm::Unspecified => "KAS_PUBLIC_KEY_ALG_ENUM_UNSPECIFIED",
        }
    }
}

impl Serialize for KeyAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.proto_name())
    }
}

impl<'de> Deserialize<'de> for KeyAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match EnumRepr::deserialize(deserializer)? {
            EnumRepr::Name(name) => KeyAlgorithm::from_name(&name),
            EnumRepr::Number(n) => KeyAlgorithm::from_number(n),
        })
    }
}

/// A public key a KAS has published, as cached by the policy service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KasPublicKey {
    pub pem: String,
    pub kid: String,
    pub alg: KeyAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KasPublicKeySet {
    pub keys: Vec<KasPublicKey>,
}

/// Public key material attached to a grant: either a remote URL to fetch
/// from or a cached key set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<KasPublicKeySet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimpleKasPublicKey {
    pub algorithm: KeyAlgorithm,
    pub kid: String,
    pub pem: String,
}

/// A single key of a KAS, identified by KAS URI and key ID
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimpleKasKey {
    pub kas_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<SimpleKasPublicKey>,
    pub kas_id: String,
}

/// A Key Access Server granted to a namespace, attribute or value
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyAccessServer {
    pub id: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kas_keys: Vec<SimpleKasKey>,
    pub name: String,
}

impl KeyAccessServer {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            id: uri.clone(),
            uri,
            ..Default::default()
        }
    }

    /// Attach a cached public key to this grant
    pub fn with_cached_key(
        mut self,
        kid: impl Into<String>,
        alg: KeyAlgorithm,
        pem: impl Into<String>,
    ) -> Self {
        let key = KasPublicKey {
            pem: pem.into(),
            kid: kid.into(),
            alg,
        };
        self.public_key
            .get_or_insert_with(PublicKey::default)
            .cached
            .get_or_insert_with(KasPublicKeySet::default)
            .keys
            .push(key);
        self
    }

    /// Attach a simple KAS key to this grant
    pub fn with_kas_key(
        mut self,
        kid: impl Into<String>,
        algorithm: KeyAlgorithm,
        pem: impl Into<String>,
    ) -> Self {
        self.kas_keys.push(SimpleKasKey {
            kas_uri: self.uri.clone(),
            public_key: Some(SimpleKasPublicKey {
                algorithm,
                kid: kid.into(),
                pem: pem.into(),
            }),
            kas_id: self.id.clone(),
        });
        self
    }

    /// Cached public keys, if the policy service supplied any
    pub fn cached_keys(&self) -> &[KasPublicKey] {
        self.public_key
            .as_ref()
            .and_then(|pk| pk.cached.as_ref())
            .map(|set| set.keys.as_slice())
            .unwrap_or_default()
    }
}

/// Attribute namespace; its grants are the least specific
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Namespace {
    pub id: String,
    pub name: String,
    pub fqn: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<KeyAccessServer>,
}

/// Attribute definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attribute {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
    pub name: String,
    pub rule: AttributeRule,
    pub fqn: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<KeyAccessServer>,
}

/// Attribute value, optionally carrying its parent definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Value {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<Box<Attribute>>,
    pub value: String,
    pub fqn: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<KeyAccessServer>,
}
