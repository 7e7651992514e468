use crate::appgw::ApplicationGateway;
use crate::kubernetes::objects::{ObjectKey, ObjectKeyError};
use crate::kubernetes::snapshot::InMemorySnapshot;
use agic_api::v1::{
    AzureApplicationGatewayLoadDistributionPolicy, AzureIngressManagedTarget,
    AzureIngressProhibitedTarget,
};
use agic_api::v1beta1::AzureApplicationGatewayRewrite;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;

/// The on-disk form of a snapshot plus the gateway it will be merged into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    #[serde(default)]
    pub ingresses: Vec<Ingress>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub endpoints: Vec<Endpoints>,
    #[serde(default)]
    pub pods: Vec<Pod>,
    #[serde(default)]
    pub certificates: Vec<CertificateEntry>,
    #[serde(default)]
    pub load_distribution_policies: Vec<AzureApplicationGatewayLoadDistributionPolicy>,
    #[serde(default)]
    pub rewrites: Vec<AzureApplicationGatewayRewrite>,
    #[serde(default)]
    pub prohibited_targets: Vec<AzureIngressProhibitedTarget>,
    #[serde(default)]
    pub managed_targets: Vec<AzureIngressManagedTarget>,
    #[serde(default)]
    pub existing_gateway: ApplicationGateway,
}

/// A TLS secret already converted to a PFX bundle, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    pub namespace: String,
    pub name: String,
    pub pfx: String,
}

#[derive(Debug, Error)]
pub enum SnapshotDocumentError {
    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid object in snapshot: {0}")]
    Object(#[from] ObjectKeyError),
    #[error("Certificate {secret} is not valid base64: {source}")]
    Certificate {
        secret: ObjectKey,
        source: base64::DecodeError,
    },
}

impl SnapshotDocument {
    /// Reads a YAML or JSON snapshot.
    pub fn from_reader(reader: impl Read) -> Result<Self, SnapshotDocumentError> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn into_parts(
        self,
        ingress_class: &str,
    ) -> Result<(InMemorySnapshot, ApplicationGateway), SnapshotDocumentError> {
        let mut builder = InMemorySnapshot::builder().ingress_class(ingress_class);

        for entry in self.certificates {
            let secret = ObjectKey::new(entry.namespace, entry.name);
            let pfx = STANDARD
                .decode(entry.pfx.trim())
                .map_err(|source| SnapshotDocumentError::Certificate {
                    secret: secret.clone(),
                    source,
                })?;
            builder = builder.add_pfx_certificate(secret, pfx);
        }

        builder = self.ingresses.into_iter().fold(builder, |b, o| b.add_ingress(o));
        builder = self.services.into_iter().fold(builder, |b, o| b.add_service(o));
        builder = self.endpoints.into_iter().fold(builder, |b, o| b.add_endpoints(o));
        builder = self.pods.into_iter().fold(builder, |b, o| b.add_pod(o));
        builder = self
            .load_distribution_policies
            .into_iter()
            .fold(builder, |b, o| b.add_load_distribution_policy(o));
        builder = self.rewrites.into_iter().fold(builder, |b, o| b.add_rewrite(o));
        builder = self
            .prohibited_targets
            .into_iter()
            .fold(builder, |b, o| b.add_prohibited_target(o));
        builder = self
            .managed_targets
            .into_iter()
            .fold(builder, |b, o| b.add_managed_target(o));

        Ok((builder.build()?, self.existing_gateway))
    }
}
