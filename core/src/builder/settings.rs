use crate::annotations::{Annotations, DEFAULT_CONNECTION_DRAINING_TIMEOUT};
use crate::appgw::{
    BackendHttpSettings, BackendHttpSettingsProperties, ConnectionDraining, CookieBasedAffinity,
    Protocol, SubResource,
};
use crate::builder::backends::BackendId;
use crate::builder::names::{
    DEFAULT_BACKEND_HTTP_SETTINGS_NAME, default_probe_name, http_settings_name,
};
use crate::builder::{BuildError, ConfigBuilder};
use crate::kubernetes::ObjectKey;
use crate::net::{HTTP_PORT, Port};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

pub const DEFAULT_REQUEST_TIMEOUT: i32 = 30;

/// Backend HTTP settings and the settings used by each backend.
#[derive(Debug, Default)]
pub struct Settings {
    settings: BTreeMap<String, BackendHttpSettings>,
    by_backend: BTreeMap<BackendId, String>,
}

impl Settings {
    pub fn settings(&self) -> impl Iterator<Item = &BackendHttpSettings> {
        self.settings.values()
    }

    /// Name of the settings used by the backend; the default settings when it has none of its own.
    pub fn settings_name(&self, backend: &BackendId) -> &str {
        self.by_backend
            .get(backend)
            .map_or(DEFAULT_BACKEND_HTTP_SETTINGS_NAME, String::as_str)
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn settings(&self) -> Result<&Settings, BuildError> {
        self.memo.settings.get_or_try_init(|| self.build_settings())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_settings")]
    fn build_settings(&self) -> Result<Settings, BuildError> {
        let ports = self.backend_ports()?;
        let probes = self.probes()?;
        let mut settings = Settings::default();
        settings.settings.insert(
            DEFAULT_BACKEND_HTTP_SETTINGS_NAME.to_string(),
            self.default_settings(),
        );

        for backend in self.backends().backends() {
            let Some(pair) = ports.resolved(backend) else {
                continue;
            };

            let name = http_settings_name(
                backend.service(),
                backend.port(),
                pair.backend(),
                backend.ingress().name(),
            );
            if !settings.settings.contains_key(&name) {
                let mut properties = self.settings_properties(backend.ingress(), pair.backend());
                let probe = probes.probe_for(backend).map_or_else(
                    || self.identifier.probe_id(&default_probe_name(properties.protocol)),
                    |probe| probe.id().clone(),
                );
                properties.probe = Some(SubResource::new(probe));

                debug!("Created backend HTTP settings {name} for {backend}");
                settings.settings.insert(
                    name.clone(),
                    BackendHttpSettings::new(
                        &name,
                        self.identifier.http_settings_id(&name),
                        properties,
                    ),
                );
            }
            settings.by_backend.insert(backend.clone(), name);
        }

        Ok(settings)
    }

    fn default_settings(&self) -> BackendHttpSettings {
        let name = DEFAULT_BACKEND_HTTP_SETTINGS_NAME;
        BackendHttpSettings::new(
            name,
            self.identifier.http_settings_id(name),
            BackendHttpSettingsProperties {
                port: HTTP_PORT,
                protocol: Protocol::Http,
                cookie_based_affinity: CookieBasedAffinity::Disabled,
                request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
                probe: Some(SubResource::new(
                    self.identifier
                        .probe_id(&default_probe_name(Protocol::Http)),
                )),
                path: None,
                host_name: None,
                connection_draining: None,
                trusted_root_certificates: Vec::new(),
            },
        )
    }

    /// Settings of one backend port as shaped by the annotations of its ingress. The probe is left unset.
    fn settings_properties(&self, key: &ObjectKey, port: Port) -> BackendHttpSettingsProperties {
        let mut properties = BackendHttpSettingsProperties {
            port,
            protocol: Protocol::Http,
            cookie_based_affinity: CookieBasedAffinity::Disabled,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            probe: None,
            path: None,
            host_name: None,
            connection_draining: None,
            trusted_root_certificates: Vec::new(),
        };

        let Some(ingress) = self.ingress(key) else {
            return properties;
        };
        let annotations = Annotations::of(ingress);

        if let Some(protocol) = self.annotation(key, annotations.backend_protocol()) {
            properties.protocol = protocol;
        }
        if let Some(prefix) = self.annotation(key, annotations.backend_path_prefix()) {
            properties.path = Some(prefix.to_string());
        }
        if let Some(host_name) = self.annotation(key, annotations.backend_hostname()) {
            properties.host_name = Some(host_name.to_string());
        }
        if let Some(timeout) = self.annotation(key, annotations.request_timeout()) {
            properties.request_timeout = Some(timeout);
        }
        if self
            .annotation(key, annotations.is_cookie_based_affinity())
            .unwrap_or_default()
        {
            properties.cookie_based_affinity = CookieBasedAffinity::Enabled;
        }
        if self
            .annotation(key, annotations.is_connection_draining())
            .unwrap_or_default()
        {
            let drain_timeout_in_sec = self
                .annotation(key, annotations.connection_draining_timeout())
                .unwrap_or(DEFAULT_CONNECTION_DRAINING_TIMEOUT);
            properties.connection_draining = Some(ConnectionDraining {
                enabled: true,
                drain_timeout_in_sec,
            });
        }

        if properties.protocol == Protocol::Https {
            properties.trusted_root_certificates = self
                .trusted_roots()
                .for_ingress(key)
                .iter()
                .map(|name| SubResource::new(self.identifier.trusted_root_certificate_id(name)))
                .collect();
        }

        properties
    }
}
