//! ec2ping
//!
//! Resolves the peers of a clustered process running on EC2 without a static
//! address list: the local instance identity and tags select matching
//! instances through `DescribeInstances`, and each match expands into a range
//! of candidate endpoints for the membership round.

pub mod config;
pub mod credentials;
pub mod criteria;
pub mod discovery;
pub mod endpoints;
pub mod error;
pub mod identity;
pub mod inventory;
pub mod observability;

pub use config::{PingConfig, StaticKeyPair};
pub use credentials::{BuiltinProvider, CredentialsRegistry, CredentialsStrategy};
pub use discovery::{CandidateSource, DiscoveryLifecycle, LifecycleState};
pub use endpoints::{CandidateEndpoint, PortPolicy};
pub use error::{DiscoveryError, Result};
pub use identity::{IdentityProbe, NodeIdentity, RetryPolicy};
