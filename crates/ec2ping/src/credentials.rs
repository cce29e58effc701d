//! Credentials Resolution
//!
//! Credentials strategies are looked up by name in a registry so operators can
//! plug in organisation specific wiring without touching the resolver. An
//! explicit key pair bypasses the registry entirely.

use crate::config::StaticKeyPair;
use crate::error::{DiscoveryError, Result};
use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::ecs::EcsCredentialsProvider;
use aws_config::environment::credentials::EnvironmentVariableCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::Region;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{debug, error};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builds a credentials provider for the given region.
#[async_trait]
pub trait CredentialsStrategy: Send + Sync {
    async fn create(&self, region: &str) -> std::result::Result<SharedCredentialsProvider, BoxError>;
}

#[async_trait]
impl<F> CredentialsStrategy for F
where
    F: Fn(&str) -> std::result::Result<SharedCredentialsProvider, BoxError> + Send + Sync,
{
    async fn create(&self, region: &str) -> std::result::Result<SharedCredentialsProvider, BoxError> {
        self(region)
    }
}

/// Strategies available without registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinProvider {
    /// Environment, profile, web identity, ECS and instance profile, in that order
    Default,
    Environment,
    Profile,
    InstanceProfile,
    Ecs,
}

#[async_trait]
impl CredentialsStrategy for BuiltinProvider {
    async fn create(&self, region: &str) -> std::result::Result<SharedCredentialsProvider, BoxError> {
        let provider = match self {
            Self::Default => SharedCredentialsProvider::new(
                DefaultCredentialsChain::builder()
                    .region(Region::new(region.to_string()))
                    .build()
                    .await,
            ),
            Self::Environment => {
                SharedCredentialsProvider::new(EnvironmentVariableCredentialsProvider::new())
            }
            Self::Profile => {
                SharedCredentialsProvider::new(ProfileFileCredentialsProvider::builder().build())
            }
            Self::InstanceProfile => {
                SharedCredentialsProvider::new(ImdsCredentialsProvider::builder().build())
            }
            Self::Ecs => SharedCredentialsProvider::new(EcsCredentialsProvider::builder().build()),
        };
        Ok(provider)
    }
}

/// Name to strategy mapping, validated when the lifecycle initializes.
#[derive(Clone)]
pub struct CredentialsRegistry {
    strategies: BTreeMap<String, Arc<dyn CredentialsStrategy>>,
}

impl Default for CredentialsRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for CredentialsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl CredentialsRegistry {
    /// A registry with no strategies at all.
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// A registry holding every `BuiltinProvider`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        for builtin in BuiltinProvider::iter() {
            registry.register(builtin.to_string(), builtin);
        }
        registry
    }

    /// Register (or replace) a strategy under `name`.
    pub fn register(&mut self, name: impl Into<String>, strategy: impl CredentialsStrategy + 'static) -> &mut Self {
        self.strategies.insert(name.into(), Arc::new(strategy));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Resolve the credentials provider for the inventory client.
    ///
    /// An explicit key pair is used as-is; otherwise `provider_name` is looked up.
    pub async fn resolve(
        &self,
        provider_name: &str,
        explicit: Option<&StaticKeyPair>,
        region: &str,
    ) -> Result<SharedCredentialsProvider> {
        if let Some(keys) = explicit {
            debug!(access_key = %keys.access_key, "Using explicit key pair");
            return Ok(static_provider(keys));
        }

        let name = provider_name.trim();
        let strategy = self
            .strategies
            .get(name)
            .ok_or_else(|| DiscoveryError::ProviderNotFound {
                name: name.to_string(),
            })?;

        match strategy.create(region).await {
            Ok(provider) => {
                debug!(provider = %name, region = %region, "Credentials provider created");
                Ok(provider)
            }
            Err(e) => {
                error!(
                    provider = %name,
                    error = %e,
                    "Credentials provider could not be created; check the strategy registered under this name"
                );
                Err(DiscoveryError::ProviderConstructionFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn static_provider(keys: &StaticKeyPair) -> SharedCredentialsProvider {
    SharedCredentialsProvider::new(Credentials::new(
        keys.access_key.clone(),
        keys.secret_key.clone(),
        None,
        None,
        "ec2ping-static",
    ))
}
