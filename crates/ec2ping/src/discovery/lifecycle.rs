//! Lifecycle Controller
//!
//! Owns the configuration, runs the init phases once and hands out rounds.

use super::round::{resolve_round, DiscoveryContext};
use super::{CandidateSource, LifecycleState};
use crate::config::PingConfig;
use crate::credentials::CredentialsRegistry;
use crate::criteria::{self, FilterCriterion, TagCriterion};
use crate::endpoints::CandidateEndpoint;
use crate::error::{DiscoveryError, Result};
use crate::identity::{IdentityProbe, NodeIdentity, RetryPolicy};
use crate::inventory::{Ec2ClientFactory, InventoryClientFactory};
use crate::observability::{events, metrics};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Discovery Lifecycle
///
/// Implements the state machine: Uninitialized -> Initializing -> Ready -> Stopped,
/// with `Failed` as the terminal state of a failed `init`.
pub struct DiscoveryLifecycle {
    /// Configuration
    config: PingConfig,
    /// Named credentials strategies
    registry: CredentialsRegistry,
    /// Builds the inventory client during init
    factory: Arc<dyn InventoryClientFactory>,
    /// Current state
    state: LifecycleState,
    /// Present only while Ready
    context: Option<Arc<DiscoveryContext>>,
}

impl std::fmt::Debug for DiscoveryLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryLifecycle")
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl DiscoveryLifecycle {
    pub fn new(config: PingConfig) -> Self {
        let factory = Arc::new(Ec2ClientFactory::from_config(&config));
        Self {
            config,
            registry: CredentialsRegistry::with_builtin(),
            factory,
            state: LifecycleState::Uninitialized,
            context: None,
        }
    }

    /// Replace the credentials registry, e.g. to add custom strategies.
    pub fn with_registry(mut self, registry: CredentialsRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the inventory client factory.
    pub fn with_factory(mut self, factory: Arc<dyn InventoryClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &PingConfig {
        &self.config
    }

    /// Identity of the local instance, once Ready.
    pub fn identity(&self) -> Option<&NodeIdentity> {
        self.context.as_deref().map(|ctx| &ctx.identity)
    }

    fn transition(&mut self, to: LifecycleState) {
        if self.state != to {
            events::lifecycle_transition(&self.state.to_string(), &to.to_string());
            self.state = to;
        }
    }

    /// Run every init phase. Allowed only once, from `Uninitialized`.
    ///
    /// Errors are fatal: the lifecycle moves to `Failed` and stays there.
    pub async fn init(&mut self) -> Result<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(DiscoveryError::InvalidState {
                operation: "init",
                state: self.state.to_string(),
            });
        }

        self.transition(LifecycleState::Initializing);
        match self.build_context().await {
            Ok(context) => {
                self.context = Some(Arc::new(context));
                self.transition(LifecycleState::Ready);
                info!("Discovery: ready");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Discovery: initialization failed");
                self.transition(LifecycleState::Failed);
                Err(e)
            }
        }
    }

    async fn build_context(&self) -> Result<DiscoveryContext> {
        // Phase 1: Configuration and criteria
        info!("Discovery: Phase 1 - Parsing criteria");
        self.config.validate()?;
        let keys = self.config.static_key_pair()?;
        let tags = TagCriterion::parse(self.config.tags.as_deref());
        let filters = FilterCriterion::parse_optional(self.config.filters.as_deref())?;

        let tags_display = tags.as_ref().map(ToString::to_string).unwrap_or_default();
        let filters_display = filters.as_ref().map(ToString::to_string).unwrap_or_default();
        events::criteria_configured(&tags_display, &filters_display);
        if tags.is_none() && filters.is_none() {
            warn!("No tags or filters configured, every instance in the region is a candidate");
        }

        // Phase 2: Identity
        info!("Discovery: Phase 2 - Fetching instance identity");
        let probe = IdentityProbe::from_config(&self.config)?;
        let identity = probe
            .fetch_with_retry(&RetryPolicy::from_config(&self.config))
            .await?;
        events::identity_resolved(
            &identity.instance_id,
            &identity.region,
            &identity.availability_zone,
            &identity.private_ip,
        );

        // Phase 3: Credentials and inventory client
        info!("Discovery: Phase 3 - Building inventory client");
        let credentials = self
            .registry
            .resolve(&self.config.credentials_provider, keys.as_ref(), &identity.region)
            .await?;
        let client = self.factory.build(&identity.region, credentials)?;

        let context = DiscoveryContext {
            identity,
            client,
            tags,
            filters,
            ports: self.config.port_policy(),
        };

        // Phase 4: Eager tag validation
        if let Some(tags) = &context.tags {
            info!("Discovery: Phase 4 - Validating instance tags");
            let instance_tags =
                criteria::resolve_instance_tags(context.client.as_ref(), &context.identity.instance_id)
                    .await?;
            criteria::validate(Some(tags), &instance_tags)?;
        }

        Ok(context)
    }

    /// Run one round, surfacing its error.
    pub async fn try_round(&self) -> Result<Vec<CandidateEndpoint>> {
        let context = match (&self.state, &self.context) {
            (LifecycleState::Ready, Some(context)) => Arc::clone(context),
            _ => {
                return Err(DiscoveryError::InvalidState {
                    operation: "round",
                    state: self.state.to_string(),
                })
            }
        };

        let started = Instant::now();
        match resolve_round(&context).await {
            Ok(outcome) => {
                let elapsed = started.elapsed();
                metrics::record_round_success(outcome.hosts.len(), outcome.endpoints.len(), elapsed);
                events::round_completed(outcome.hosts.len(), outcome.endpoints.len(), elapsed.as_millis());
                Ok(outcome.endpoints)
            }
            Err(e) => {
                metrics::record_round_failure(started.elapsed());
                Err(e)
            }
        }
    }

    /// Run one round; failures are logged and yield no candidates.
    pub async fn fetch_cluster_members(&self) -> Vec<CandidateEndpoint> {
        match self.try_round().await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                events::round_failed(&e.to_string());
                Vec::new()
            }
        }
    }

    /// Release the context and inventory client. Idempotent.
    pub fn stop(&mut self) {
        match self.state {
            LifecycleState::Stopped | LifecycleState::Failed => {
                debug!(state = %self.state, "Discovery: stop ignored");
            }
            _ => {
                self.context = None;
                self.transition(LifecycleState::Stopped);
                info!("Discovery: stopped");
            }
        }
    }
}

#[async_trait]
impl CandidateSource for DiscoveryLifecycle {
    async fn fetch_cluster_members(&self) -> Vec<CandidateEndpoint> {
        DiscoveryLifecycle::fetch_cluster_members(self).await
    }
}
