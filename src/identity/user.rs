//! Operating identities used to sign requests.

use std::collections::BTreeSet;
use std::fmt;

/// Enrollment material: a PEM private key and its PEM certificate.
#[derive(Clone)]
pub struct Enrollment {
    private_key_pem: Vec<u8>,
    certificate: String,
}

impl Enrollment {
    pub fn new(private_key_pem: Vec<u8>, certificate: String) -> Self {
        Self {
            private_key_pem,
            certificate,
        }
    }

    /// PEM encoded private key. Never log this.
    pub fn private_key_pem(&self) -> &[u8] {
        &self.private_key_pem
    }

    /// PEM encoded signing certificate.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }
}

impl fmt::Debug for Enrollment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enrollment")
            .field("private_key_pem", &"<redacted>")
            .field("certificate_len", &self.certificate.len())
            .finish()
    }
}

/// An administrative or operational actor.
///
/// Built with the `with_*` methods; once [`Identity::with_enrollment`] has
/// been called the value is handed out behind an `Arc` and never changes.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    name: String,
    organization: String,
    msp_id: String,
    roles: BTreeSet<String>,
    account: Option<String>,
    affiliation: Option<String>,
    enrollment: Option<Enrollment>,
}

impl Identity {
    pub fn new(name: impl Into<String>, msp_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            msp_id: msp_id.into(),
            ..Default::default()
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_affiliation(mut self, affiliation: impl Into<String>) -> Self {
        self.affiliation = Some(affiliation.into());
        self
    }

    pub fn with_enrollment(mut self, enrollment: Enrollment) -> Self {
        self.enrollment = Some(enrollment);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn affiliation(&self) -> Option<&str> {
        self.affiliation.as_deref()
    }

    pub fn enrollment(&self) -> Option<&Enrollment> {
        self.enrollment.as_ref()
    }

    /// Certificate presented as the proposal creator, empty when not enrolled.
    pub fn certificate(&self) -> &str {
        self.enrollment.as_ref().map_or("", Enrollment::certificate)
    }
}
