use crate::annotations::Annotations;
use crate::appgw::{TrustedRootCertificate, TrustedRootCertificateProperties};
use crate::builder::ConfigBuilder;
use crate::builder::names::trusted_root_certificate_name;
use crate::events::EventReason;
use crate::kubernetes::ObjectKey;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Trusted root certificates and the ones each ingress trusts.
#[derive(Debug, Default)]
pub struct TrustedRoots {
    certificates: BTreeMap<String, TrustedRootCertificate>,
    by_ingress: BTreeMap<ObjectKey, Vec<String>>,
}

impl TrustedRoots {
    pub fn certificates(&self) -> impl Iterator<Item = &TrustedRootCertificate> {
        self.certificates.values()
    }

    pub fn for_ingress(&self, ingress: &ObjectKey) -> &[String] {
        self.by_ingress.get(ingress).map_or(&[], Vec::as_slice)
    }

    pub fn certificate(&self, name: &str) -> Option<&TrustedRootCertificate> {
        self.certificates.get(name)
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn trusted_roots(&self) -> &TrustedRoots {
        self.memo
            .trusted_roots
            .get_or_init(|| self.build_trusted_roots())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_trusted_roots")]
    fn build_trusted_roots(&self) -> TrustedRoots {
        let existing: BTreeMap<&str, &TrustedRootCertificate> = self
            .existing
            .properties
            .trusted_root_certificates
            .iter()
            .map(|certificate| (certificate.name().as_str(), certificate))
            .collect();

        let mut roots = TrustedRoots::default();
        let mut names_by_data: BTreeMap<String, String> = BTreeMap::new();

        for (key, ingress) in &self.ingresses {
            let annotations = Annotations::of(ingress);
            let mut names = Vec::new();

            for name in self
                .annotation(key, annotations.appgw_trusted_root_certificates())
                .unwrap_or_default()
            {
                match existing.get(name) {
                    Some(certificate) => {
                        roots
                            .certificates
                            .entry(name.to_string())
                            .or_insert_with(|| (*certificate).clone());
                        names.push(name.to_string());
                    }
                    None => self.emit(
                        key,
                        EventReason::TrustedRootCertificateNotFound,
                        format!("Trusted root certificate {name} is not installed on the gateway"),
                    ),
                }
            }

            if let Some(data) = self.annotation(key, annotations.backend_trusted_root_certificate()) {
                if STANDARD.decode(data).is_ok() {
                    let name = names_by_data
                        .entry(data.to_string())
                        .or_insert_with(|| trusted_root_certificate_name(key))
                        .clone();
                    roots.certificates.entry(name.clone()).or_insert_with(|| {
                        debug!("Created trusted root certificate {name} from {key}");
                        TrustedRootCertificate::new(
                            &name,
                            self.identifier.trusted_root_certificate_id(&name),
                            TrustedRootCertificateProperties {
                                data: Some(data.to_string()),
                                key_vault_secret_id: None,
                            },
                        )
                    });
                    names.push(name);
                } else {
                    self.emit(
                        key,
                        EventReason::InvalidAnnotation,
                        format!("Trusted root certificate data on {key} is not valid base64"),
                    );
                }
            }

            if !names.is_empty() {
                names.dedup();
                roots.by_ingress.insert(key.clone(), names);
            }
        }

        roots
    }
}
