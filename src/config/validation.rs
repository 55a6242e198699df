//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Required organization keys: mspid, domname, peer_locations, orderer_locations
//! - `name@location` parsing and gRPC URL checks
//! - Warn (not fail) on missing optional keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure apart from warnings: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, OrgConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("organization '{org}' is missing required key '{field}'")]
    MissingField { org: String, field: &'static str },

    #[error("organization '{org}' has invalid {field} entry '{entry}': {reason}")]
    InvalidLocation {
        org: String,
        field: &'static str,
        entry: String,
        reason: String,
    },

    #[error("organizations '{first}' and '{second}' share mspid '{mspid}'")]
    DuplicateMspId {
        mspid: String,
        first: String,
        second: String,
    },

    #[error("client is bound to unknown organization '{0}'")]
    UnknownClientOrg(String),

    #[error("no organizations configured")]
    NoOrganizations,
}

/// Validate the whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.orgs.is_empty() {
        errors.push(ValidationError::NoOrganizations);
    }

    let mut seen_msp: HashMap<&str, &str> = HashMap::new();
    for (name, org) in &config.orgs {
        validate_org(name, org, &mut errors);

        if let Some(mspid) = org.mspid.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            if let Some(first) = seen_msp.insert(mspid, name.as_str()) {
                errors.push(ValidationError::DuplicateMspId {
                    mspid: mspid.to_string(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }
    }

    if !config.client.org.is_empty() && !config.orgs.contains_key(&config.client.org) {
        errors.push(ValidationError::UnknownClientOrg(config.client.org.clone()));
    }

    warn_optional(config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_org(name: &str, org: &OrgConfig, errors: &mut Vec<ValidationError>) {
    let required = [
        ("mspid", &org.mspid),
        ("domname", &org.domname),
        ("peer_locations", &org.peer_locations),
        ("orderer_locations", &org.orderer_locations),
    ];
    for (field, value) in required {
        if value.as_deref().map(str::trim).unwrap_or("").is_empty() {
            errors.push(ValidationError::MissingField {
                org: name.to_string(),
                field,
            });
        }
    }

    for (field, value) in [
        ("peer_locations", &org.peer_locations),
        ("orderer_locations", &org.orderer_locations),
    ] {
        if let Some(raw) = value.as_deref().filter(|r| !r.trim().is_empty()) {
            if let Err(e) = parse_locations(name, field, raw) {
                errors.push(e);
            }
        }
    }
}

fn warn_optional(config: &GatewayConfig) {
    let optional = [
        ("sdk.invoke_wait_time", config.sdk.invoke_wait_time),
        ("sdk.deploy_wait_time", config.sdk.deploy_wait_time),
        ("sdk.proposal_wait_time", config.sdk.proposal_wait_time),
    ];
    for (key, value) in optional {
        if value.is_none() {
            tracing::warn!(key = key, "No configuration value found, using default");
        }
    }
}

/// Parse a comma separated list of `name@location` pairs.
///
/// Whitespace around separators is ignored. Locations must be `grpc://` or
/// `grpcs://` URLs with a host and a port.
pub fn parse_locations(
    org: &str,
    field: &'static str,
    raw: &str,
) -> Result<Vec<(String, String)>, ValidationError> {
    let invalid = |entry: &str, reason: &str| ValidationError::InvalidLocation {
        org: org.to_string(),
        field,
        entry: entry.to_string(),
        reason: reason.to_string(),
    };

    let mut out = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, location) = entry
            .split_once('@')
            .ok_or_else(|| invalid(entry, "expected name@location"))?;
        let (name, location) = (name.trim(), location.trim());
        if name.is_empty() {
            return Err(invalid(entry, "empty endpoint name"));
        }
        check_grpc_url(location).map_err(|reason| invalid(entry, &reason))?;
        out.push((name.to_string(), location.to_string()));
    }

    if out.is_empty() {
        return Err(invalid(raw, "no endpoints listed"));
    }
    Ok(out)
}

/// Check that a location is a usable gRPC URL.
pub fn check_grpc_url(location: &str) -> Result<(), String> {
    let url = Url::parse(location).map_err(|e| e.to_string())?;
    match url.scheme() {
        "grpc" | "grpcs" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    if url.port().is_none() {
        return Err("missing port".to_string());
    }
    Ok(())
}
