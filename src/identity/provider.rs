//! Credential loading from the `crypto-config` tree.
//!
//! # Responsibilities
//! - Locate the single `*_sk` key file in an MSP keystore
//! - Parse PEM key and certificate material
//! - Build an enrolled [`Identity`]
//!
//! # Security
//! - Key bytes are never logged
//! - Every failure is a fatal configuration error; nothing is retried

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, LedgerResult};
use crate::identity::user::{Enrollment, Identity};

/// Suffix of private key files produced by `cryptogen`.
pub const PRIVATE_KEY_SUFFIX: &str = "_sk";

/// Source of enrolled identities.
pub trait CredentialProvider: Send + Sync {
    /// Load an identity from a private key file and a certificate file.
    fn load_identity(
        &self,
        name: &str,
        msp_id: &str,
        private_key: &Path,
        certificate: &Path,
    ) -> LedgerResult<Identity>;

    /// Load the `Admin@<domain>` identity of a peer organization.
    fn load_peer_admin(&self, org_name: &str, msp_id: &str, domain: &str) -> LedgerResult<Identity>;
}

/// Reads PEM material from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    crypto_root: PathBuf,
}

impl FileCredentialProvider {
    pub fn new(crypto_root: impl Into<PathBuf>) -> Self {
        Self {
            crypto_root: crypto_root.into(),
        }
    }

    /// Keystore directory and certificate file of a domain's admin user.
    pub fn admin_paths(&self, domain: &str) -> (PathBuf, PathBuf) {
        let msp = self
            .crypto_root
            .join("peerOrganizations")
            .join(domain)
            .join("users")
            .join(format!("Admin@{}", domain))
            .join("msp");
        let keystore = msp.join("keystore");
        let cert = msp
            .join("signcerts")
            .join(format!("Admin@{}-cert.pem", domain));
        (keystore, cert)
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn load_identity(
        &self,
        name: &str,
        msp_id: &str,
        private_key: &Path,
        certificate: &Path,
    ) -> LedgerResult<Identity> {
        let key_bytes = read_file(private_key)?;
        parse_private_key(&key_bytes, private_key)?;

        let cert_bytes = read_file(certificate)?;
        let certificate_pem = parse_certificate(&cert_bytes, certificate)?;

        tracing::info!(
            identity = %name,
            msp_id = %msp_id,
            certificate = %certificate.display(),
            "Identity enrolled"
        );

        Ok(Identity::new(name, msp_id).with_enrollment(Enrollment::new(key_bytes, certificate_pem)))
    }

    fn load_peer_admin(&self, org_name: &str, msp_id: &str, domain: &str) -> LedgerResult<Identity> {
        let (keystore, cert) = self.admin_paths(domain);
        let key_file = find_private_key(&keystore)?;
        let identity = self.load_identity(&format!("{}Admin", org_name), msp_id, &key_file, &cert)?;
        Ok(identity.with_organization(org_name).with_role("admin"))
    }
}

/// Find the one `*_sk` file in a keystore directory.
pub fn find_private_key(directory: &Path) -> LedgerResult<PathBuf> {
    let entries = fs::read_dir(directory).map_err(|e| {
        LedgerError::Config(format!(
            "cannot read keystore {}: {}",
            directory.display(),
            e
        ))
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| LedgerError::Config(format!("keystore {}: {}", directory.display(), e)))?
            .path();
        let is_key = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PRIVATE_KEY_SUFFIX));
        if is_key && path.is_file() {
            matches.push(path);
        }
    }

    if matches.len() != 1 {
        return Err(LedgerError::Config(format!(
            "expected exactly 1 {} file in {} but found {}",
            PRIVATE_KEY_SUFFIX,
            directory.display(),
            matches.len()
        )));
    }
    Ok(matches.remove(0))
}

fn read_file(path: &Path) -> LedgerResult<Vec<u8>> {
    fs::read(path).map_err(|e| LedgerError::Config(format!("cannot read {}: {}", path.display(), e)))
}

fn parse_private_key(bytes: &[u8], path: &Path) -> LedgerResult<()> {
    match rustls_pemfile::private_key(&mut &bytes[..]) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(LedgerError::Config(format!(
            "no private key found in {}",
            path.display()
        ))),
        Err(e) => Err(LedgerError::Config(format!(
            "malformed private key in {}: {}",
            path.display(),
            e
        ))),
    }
}

fn parse_certificate(bytes: &[u8], path: &Path) -> LedgerResult<String> {
    let certs = rustls_pemfile::certs(&mut &bytes[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            LedgerError::Config(format!("malformed certificate in {}: {}", path.display(), e))
        })?;
    if certs.is_empty() {
        return Err(LedgerError::Config(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|_| LedgerError::Config(format!("certificate {} is not UTF-8", path.display())))
}
