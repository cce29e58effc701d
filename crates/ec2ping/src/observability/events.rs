//! Structured Events
//!
//! Each event type has a dedicated function so field names stay consistent
//! between the lifecycle, the round pipeline and the inventory client.
//!
//! Event types:
//! - `lifecycle_transition` - Lifecycle state change
//! - `identity_resolved` - Local identity document fetched
//! - `criteria_configured` - Parsed tags and filters at init
//! - `round_completed` - Discovery round produced candidates
//! - `round_failed` - Discovery round degraded to zero candidates
//! - `address_skipped` - Unresolvable address dropped during expansion
//! - `inventory_fault` - Inventory API answered with a service fault

use tracing::{error, info, warn};

/// Emit a lifecycle transition event
pub fn lifecycle_transition(from: &str, to: &str) {
    info!(
        event_type = "lifecycle_transition",
        from = %from,
        to = %to,
        "Discovery lifecycle transition"
    );
}

/// Emit an identity resolved event
pub fn identity_resolved(instance_id: &str, region: &str, availability_zone: &str, private_ip: &str) {
    info!(
        event_type = "identity_resolved",
        instance_id = %instance_id,
        region = %region,
        availability_zone = %availability_zone,
        private_ip = %private_ip,
        "Instance identity resolved"
    );
}

/// Emit a criteria configured event
pub fn criteria_configured(tags: &str, filters: &str) {
    info!(
        event_type = "criteria_configured",
        tags = %tags,
        filters = %filters,
        "Discovery criteria configured"
    );
}

/// Emit a round completed event
pub fn round_completed(hosts: usize, endpoints: usize, duration_ms: u128) {
    info!(
        event_type = "round_completed",
        hosts = hosts,
        endpoints = endpoints,
        duration_ms = duration_ms as u64,
        "Discovery round completed"
    );
}

/// Emit a round failed event
pub fn round_failed(error: &str) {
    warn!(
        event_type = "round_failed",
        error = %error,
        "Discovery round failed, no candidates this round"
    );
}

/// Emit an address skipped event
pub fn address_skipped(reason: &str) {
    warn!(
        event_type = "address_skipped",
        reason = %reason,
        "Address skipped during expansion"
    );
}

/// Emit an inventory fault event
pub fn inventory_fault(status: u16, request: &str, fault: &str) {
    error!(
        event_type = "inventory_fault",
        status = status,
        request = %request,
        fault = %fault,
        "Inventory API fault"
    );
}
