//! Organization registry.
//!
//! # Responsibilities
//! - Register organizations with unique names and mspids
//! - Hold per-organization peer/orderer endpoints
//! - Attach credential material loaded at startup
//!
//! # Design Decisions
//! - Mutation requires `&mut self`; once built the registry is shared as
//!   `Arc<OrganizationRegistry>` and read without locks
//! - `resolve` hands out `Arc<Organization>` snapshots; `joined_peers` is the
//!   only state that keeps changing and it is shared between snapshots
//! - TLS rewriting happens once, at insertion time

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::validation::{check_grpc_url, parse_locations};
use crate::config::GatewayConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{CredentialProvider, Identity};
use crate::registry::organization::{Endpoint, Organization};

/// Named organizations of the network profile.
#[derive(Debug, Default)]
pub struct OrganizationRegistry {
    orgs: HashMap<String, Arc<Organization>>,
    /// mspid → owning organization name.
    msp_ids: HashMap<String, String>,
    tls: bool,
}

impl OrganizationRegistry {
    /// Create an empty registry. With `tls` set, `grpc://` endpoints are stored as `grpcs://`.
    pub fn new(tls: bool) -> Self {
        Self {
            tls,
            ..Default::default()
        }
    }

    /// Build a registry from validated configuration.
    pub fn from_config(config: &GatewayConfig) -> LedgerResult<Self> {
        let mut registry = Self::new(config.sdk.tls);

        for (name, org_config) in &config.orgs {
            let required = |value: &Option<String>, field: &str| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        LedgerError::Config(format!("organization '{}' is missing '{}'", name, field))
                    })
            };

            let mspid = required(&org_config.mspid, "mspid")?;
            let domname = required(&org_config.domname, "domname")?;
            let peers = required(&org_config.peer_locations, "peer_locations")?;
            let orderers = required(&org_config.orderer_locations, "orderer_locations")?;

            registry.register(name, &mspid)?;
            registry.set_domain_name(name, &domname)?;

            for (peer, location) in parse_locations(name, "peer_locations", &peers)
                .map_err(|e| LedgerError::Config(e.to_string()))?
            {
                registry.add_peer_endpoint(name, &peer, &location)?;
            }
            for (orderer, location) in parse_locations(name, "orderer_locations", &orderers)
                .map_err(|e| LedgerError::Config(e.to_string()))?
            {
                registry.add_orderer_endpoint(name, &orderer, &location)?;
            }
        }

        tracing::info!(orgs = registry.orgs.len(), tls = registry.tls, "Organization registry built");
        Ok(registry)
    }

    /// Register a new organization.
    pub fn register(&mut self, name: &str, msp_id: &str) -> LedgerResult<()> {
        let msp_id = msp_id.trim();
        if name.trim().is_empty() {
            return Err(LedgerError::Config("organization name is empty".to_string()));
        }
        if msp_id.is_empty() {
            return Err(LedgerError::Config(format!("organization '{}' has an empty mspid", name)));
        }
        if self.orgs.contains_key(name) {
            return Err(LedgerError::Config(format!(
                "organization '{}' is already registered",
                name
            )));
        }
        if let Some(owner) = self.msp_ids.get(msp_id) {
            return Err(LedgerError::Config(format!(
                "mspid '{}' already belongs to organization '{}'",
                msp_id, owner
            )));
        }

        self.msp_ids.insert(msp_id.to_string(), name.to_string());
        self.orgs
            .insert(name.to_string(), Arc::new(Organization::new(name, msp_id)));
        tracing::debug!(org = %name, msp_id = %msp_id, "Organization registered");
        Ok(())
    }

    pub fn add_peer_endpoint(&mut self, org: &str, name: &str, location: &str) -> LedgerResult<()> {
        let location = self.tlsify(org, location)?;
        let record = self.org_mut(org)?;
        if !record.push_peer(Endpoint {
            name: name.to_string(),
            location,
        }) {
            return Err(LedgerError::DuplicateEndpoint {
                org: org.to_string(),
                kind: "peer",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_orderer_endpoint(&mut self, org: &str, name: &str, location: &str) -> LedgerResult<()> {
        let location = self.tlsify(org, location)?;
        let record = self.org_mut(org)?;
        if !record.push_orderer(Endpoint {
            name: name.to_string(),
            location,
        }) {
            return Err(LedgerError::DuplicateEndpoint {
                org: org.to_string(),
                kind: "orderer",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn set_domain_name(&mut self, org: &str, domain_name: &str) -> LedgerResult<()> {
        self.org_mut(org)?.set_domain_name(domain_name.trim());
        Ok(())
    }

    pub fn attach_admin(&mut self, org: &str, admin: Identity) -> LedgerResult<()> {
        self.org_mut(org)?.set_admin(Arc::new(admin));
        Ok(())
    }

    pub fn attach_peer_admin(&mut self, org: &str, peer_admin: Identity) -> LedgerResult<()> {
        self.org_mut(org)?.set_peer_admin(Arc::new(peer_admin));
        Ok(())
    }

    /// Load and attach the peer admin of every organization.
    pub fn load_peer_admins(&mut self, provider: &dyn CredentialProvider) -> LedgerResult<()> {
        let mut names: Vec<String> = self.orgs.keys().cloned().collect();
        names.sort();
        for name in names {
            let (msp_id, domain) = {
                let org = self.resolve(&name)?;
                (org.msp_id().to_string(), org.domain_name().to_string())
            };
            if domain.is_empty() {
                return Err(LedgerError::Config(format!(
                    "organization '{}' has no domain name",
                    name
                )));
            }
            let admin = provider.load_peer_admin(&name, &msp_id, &domain)?;
            self.attach_peer_admin(&name, admin)?;
        }
        Ok(())
    }

    /// Look up an organization by name.
    pub fn resolve(&self, name: &str) -> LedgerResult<Arc<Organization>> {
        self.orgs
            .get(name)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("organization '{}'", name)))
    }

    /// Registered organization names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.orgs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    fn org_mut(&mut self, name: &str) -> LedgerResult<&mut Organization> {
        self.orgs
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| LedgerError::NotFound(format!("organization '{}'", name)))
    }

    fn tlsify(&self, org: &str, location: &str) -> LedgerResult<String> {
        let location = location.trim();
        check_grpc_url(location).map_err(|reason| {
            LedgerError::Config(format!(
                "bad grpc url '{}' for organization '{}': {}",
                location, org, reason
            ))
        })?;
        Ok(tlsify(location, self.tls))
    }
}

/// Rewrite `grpc://` to `grpcs://` when TLS is on.
pub fn tlsify(location: &str, tls: bool) -> String {
    match location.strip_prefix("grpc://") {
        Some(rest) if tls => format!("grpcs://{}", rest),
        _ => location.to_string(),
    }
}
