//! Issuer configuration and environment selection.
//!
//! [`IssuerConfig`] is an immutable value handed to every component that needs
//! the issuer identity or the shared secrets. It derives serde so it can be
//! loaded from whatever format the deployment keeps its settings in.
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::numbering::NumberingConfig;
use super::types::Party;

/// Target environment, emitted as `cbc:ProfileExecutionID` and as the last
/// field of the fiscal identifier formula.
///
/// ```rust
/// use std::str::FromStr;
/// use dian_fe::core::Environment;
///
/// let env = Environment::from_str("test")?;
/// assert_eq!(env.code(), "2");
/// # Ok::<(), dian_fe::core::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Production,
    Test,
}

/// Error returned when parsing an [`Environment`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    #[error("invalid environment: {input}")]
    Invalid { input: String },
}

impl FromStr for Environment {
    type Err = EnvironmentParseError;

    fn from_str(env: &str) -> Result<Self, Self::Err> {
        match env.to_ascii_lowercase().as_str() {
            "1" | "production" => Ok(Self::Production),
            "2" | "test" | "habilitacion" => Ok(Self::Test),
            _ => Err(EnvironmentParseError::Invalid {
                input: env.to_string(),
            }),
        }
    }
}

impl Environment {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Production => "1",
            Self::Test => "2",
        }
    }
}

/// Registered software identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareCredentials {
    pub software_id: String,
    pub pin: String,
}

/// XAdES-EPES signature policy reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePolicy {
    /// Policy document URL.
    pub identifier: String,
    /// Base64 SHA-256 digest of the policy document.
    pub digest: String,
}

fn default_currency() -> String {
    "COP".to_string()
}

/// Everything a document pipeline needs to know about its issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    pub issuer: Party,
    pub environment: Environment,
    /// Technical key bound to the numbering resolution.
    pub technical_key: String,
    pub numbering: NumberingConfig,
    #[serde(default)]
    pub software: Option<SoftwareCredentials>,
    #[serde(default)]
    pub signature_policy: Option<SignaturePolicy>,
    /// ISO 4217 code used on every amount of the document.
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl IssuerConfig {
    pub fn new(
        issuer: Party,
        environment: Environment,
        technical_key: impl Into<String>,
        numbering: NumberingConfig,
    ) -> Self {
        Self {
            issuer,
            environment,
            technical_key: technical_key.into(),
            numbering,
            software: None,
            signature_policy: None,
            currency: default_currency(),
        }
    }

    pub fn with_software(mut self, software_id: impl Into<String>, pin: impl Into<String>) -> Self {
        self.software = Some(SoftwareCredentials {
            software_id: software_id.into(),
            pin: pin.into(),
        });
        self
    }

    pub fn with_signature_policy(
        mut self,
        identifier: impl Into<String>,
        digest: impl Into<String>,
    ) -> Self {
        self.signature_policy = Some(SignaturePolicy {
            identifier: identifier.into(),
            digest: digest.into(),
        });
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}
