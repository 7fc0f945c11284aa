//! Webhook event payload from the Certificate Transparency monitor.

use serde::Deserialize;

/// A certificate issuance event delivered to `POST /hook`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertEvent {
    /// Opaque certificate identifier assigned by the monitor.
    #[serde(default)]
    pub id: String,
    /// Issuance details, including the subject DNS names.
    #[serde(default)]
    pub issuance: Issuance,
    /// Observed endpoints for the certificate, if any.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// Issuance block of a webhook event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Issuance {
    #[serde(default)]
    pub dns_names: Vec<String>,
    #[serde(default)]
    pub tbs_sha256: String,
    #[serde(default)]
    pub cert_sha256: String,
}

/// One observed endpoint of a webhook event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub dns_name: String,
}

impl CertEvent {
    /// Collect the full DNS name list: issuance names plus every non-empty
    /// endpoint name, in payload order.
    pub fn dns_names(&self) -> Vec<String> {
        let mut names =
            Vec::with_capacity(self.issuance.dns_names.len() + self.endpoints.len());
        names.extend(self.issuance.dns_names.iter().cloned());
        names.extend(
            self.endpoints
                .iter()
                .filter(|ep| !ep.dns_name.is_empty())
                .map(|ep| ep.dns_name.clone()),
        );
        names
    }
}
