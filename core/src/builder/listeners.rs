//! Frontend listeners, the ports they bind and the certificates they present.

use crate::annotations::Annotations;
use crate::appgw::{
    FrontendIpConfiguration, FrontendPort, FrontendPortProperties, HttpListener,
    HttpListenerProperties, Protocol, SslCertificate, SslCertificateProperties, SubResource,
};
use crate::builder::ConfigBuilder;
use crate::builder::names::{
    frontend_port_name, listener_name, ssl_certificate_name, ssl_redirect_name,
};
use crate::events::EventReason;
use crate::kubernetes::ingress::{default_backend, host, http_paths, is_root_path, path, rules, tls};
use crate::kubernetes::{ObjectKey, SecretId};
use crate::net::{HTTP_PORT, HTTPS_PORT, Port};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use k8s_openapi::api::networking::v1::{Ingress, IngressRule};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, instrument, warn};

/// Password of every PFX certificate handed to the gateway.
pub const CERTIFICATE_PASSWORD: &str = "msazure";

/// What makes a listener distinct: port, up to five host names and the frontend IP it binds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Getters, CopyGetters)]
pub struct ListenerId {
    #[getset(get_copy = "pub")]
    frontend_port: Port,

    #[getset(get = "pub")]
    host_names: Vec<String>,

    #[getset(get_copy = "pub")]
    use_private_ip: bool,
}

impl ListenerId {
    pub const MAX_HOST_NAMES: usize = 5;

    pub fn new(frontend_port: Port, mut host_names: Vec<String>, use_private_ip: bool) -> Self {
        host_names.truncate(Self::MAX_HOST_NAMES);
        Self {
            frontend_port,
            host_names,
            use_private_ip,
        }
    }

    /// The catch-all listener on port 80.
    pub fn default_listener(use_private_ip: bool) -> Self {
        Self::new(HTTP_PORT, Vec::new(), use_private_ip)
    }

    pub fn with_port(&self, frontend_port: Port) -> Self {
        Self {
            frontend_port,
            ..self.clone()
        }
    }
}

/// Where the certificate of an HTTPS listener comes from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CertificateSource {
    /// A TLS secret of the cluster.
    Secret(SecretId),
    /// A certificate already installed on the gateway.
    Gateway(String),
}

impl CertificateSource {
    pub fn name(&self) -> String {
        match self {
            Self::Secret(secret) => ssl_certificate_name(secret),
            Self::Gateway(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ListenerConfig {
    #[getset(get_copy = "pub")]
    protocol: Protocol,

    #[getset(get = "pub")]
    certificate: Option<CertificateSource>,

    /// Redirect configuration that sends plain HTTP traffic to this HTTPS listener.
    #[getset(get = "pub")]
    ssl_redirect: Option<String>,

    /// Redirect configuration this HTTP listener hands its traffic to.
    #[getset(get = "pub")]
    redirect_to: Option<String>,

    #[getset(get = "pub")]
    firewall_policy: Option<String>,
}

impl ListenerConfig {
    fn http() -> Self {
        Self {
            protocol: Protocol::Http,
            certificate: None,
            ssl_redirect: None,
            redirect_to: None,
            firewall_policy: None,
        }
    }

    /// Fills whatever this config lacks from another config of the same listener.
    fn absorb(&mut self, other: ListenerConfig) {
        if self.certificate.is_none() {
            self.certificate = other.certificate;
        }
        if self.ssl_redirect.is_none() {
            self.ssl_redirect = other.ssl_redirect;
        }
        if self.redirect_to.is_none() {
            self.redirect_to = other.redirect_to;
        }
        if self.firewall_policy.is_none() {
            self.firewall_policy = other.firewall_policy;
        }
    }
}

/// Listener-shaping annotations of one ingress.
struct IngressListenerOptions<'i> {
    frontend_port_override: Option<Port>,
    use_private_ip: bool,
    ssl_redirect: bool,
    host_name_extensions: Vec<&'i str>,
    gateway_certificate: Option<&'i str>,
    firewall_policy: Option<&'i str>,
    tls_secrets: BTreeMap<&'i str, SecretId>,
}

#[derive(Debug, Default)]
pub struct Listeners {
    configs: BTreeMap<ListenerId, ListenerConfig>,
    listeners: BTreeMap<ListenerId, HttpListener>,
    ports: BTreeMap<Port, FrontendPort>,
    certificates: BTreeMap<String, SslCertificate>,
}

impl Listeners {
    pub fn configs(&self) -> impl Iterator<Item = (&ListenerId, &ListenerConfig)> {
        self.configs.iter()
    }

    pub fn config(&self, id: &ListenerId) -> Option<&ListenerConfig> {
        self.configs.get(id)
    }

    pub fn listener(&self, id: &ListenerId) -> Option<&HttpListener> {
        self.listeners.get(id)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &HttpListener> {
        self.listeners.values()
    }

    pub fn ports(&self) -> impl Iterator<Item = &FrontendPort> {
        self.ports.values()
    }

    pub fn certificates(&self) -> impl Iterator<Item = &SslCertificate> {
        self.certificates.values()
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn listeners(&self) -> &Listeners {
        self.memo.listeners.get_or_init(|| self.build_listeners())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_listeners")]
    fn build_listeners(&self) -> Listeners {
        let mut configs: BTreeMap<ListenerId, ListenerConfig> = BTreeMap::new();
        let mut origins: BTreeMap<ListenerId, ObjectKey> = BTreeMap::new();

        for (key, ingress) in &self.ingresses {
            for (id, config) in self.ingress_listeners(key, ingress) {
                if let Some(current) = configs.get_mut(&id) {
                    current.absorb(config);
                } else {
                    origins.insert(id.clone(), key.clone());
                    configs.insert(id, config);
                }
            }
        }

        self.drop_conflicting_private_listeners(&mut configs, &origins);

        if configs.is_empty() {
            configs.insert(
                ListenerId::default_listener(self.configuration.use_private_ip()),
                ListenerConfig::http(),
            );
        }

        let ports = self.frontend_ports(configs.keys());
        let certificates = self.certificates(configs.values());
        let listeners = configs
            .iter()
            .map(|(id, config)| (id.clone(), self.listener(id, config, &ports)))
            .collect();

        Listeners {
            configs,
            listeners,
            ports,
            certificates,
        }
    }

    /// The listeners an ingress asks for.
    pub(super) fn ingress_listeners(
        &self,
        key: &ObjectKey,
        ingress: &Ingress,
    ) -> Vec<(ListenerId, ListenerConfig)> {
        let options = self.listener_options(key, ingress);
        if rules(ingress).is_empty() {
            return if default_backend(ingress).is_some() {
                vec![(
                    ListenerId::default_listener(options.use_private_ip),
                    ListenerConfig::http(),
                )]
            } else {
                Vec::new()
            };
        }

        rules(ingress)
            .iter()
            .filter(|rule| http_paths(rule).is_some())
            .flat_map(|rule| self.listeners_for_rule(key, &options, rule))
            .collect()
    }

    /// The listeners one rule of an ingress binds to; HTTPS first.
    pub(super) fn rule_listeners(
        &self,
        key: &ObjectKey,
        ingress: &Ingress,
        rule: &IngressRule,
    ) -> Vec<(ListenerId, ListenerConfig)> {
        let options = self.listener_options(key, ingress);
        self.listeners_for_rule(key, &options, rule)
    }

    fn listener_options<'i>(&self, key: &ObjectKey, ingress: &'i Ingress) -> IngressListenerOptions<'i> {
        let annotations = Annotations::of(ingress);

        let mut tls_secrets = BTreeMap::new();
        for entry in tls(ingress) {
            let Some(secret_name) = entry.secret_name.as_deref().filter(|name| !name.is_empty())
            else {
                continue;
            };
            let secret = key.sibling(secret_name);
            if self.snapshot.pfx_certificate(&secret).is_none() {
                warn!("TLS secret {secret} of {key} has no usable certificate");
                continue;
            }

            let hosts = entry.hosts.as_deref().unwrap_or_default();
            if hosts.is_empty() {
                tls_secrets.entry("").or_insert_with(|| secret.clone());
            }
            for host in hosts {
                tls_secrets
                    .entry(host.as_str())
                    .or_insert_with(|| secret.clone());
            }
        }

        IngressListenerOptions {
            frontend_port_override: self.annotation(key, annotations.override_frontend_port()),
            use_private_ip: self
                .annotation(key, annotations.use_private_ip())
                .unwrap_or_default()
                || self.configuration.use_private_ip(),
            ssl_redirect: self
                .annotation(key, annotations.is_ssl_redirect())
                .unwrap_or_default(),
            host_name_extensions: self
                .annotation(key, annotations.hostname_extensions())
                .unwrap_or_default(),
            gateway_certificate: self.annotation(key, annotations.appgw_ssl_certificate()),
            firewall_policy: self.annotation(key, annotations.firewall_policy()),
            tls_secrets,
        }
    }

    fn listeners_for_rule(
        &self,
        key: &ObjectKey,
        options: &IngressListenerOptions<'_>,
        rule: &IngressRule,
    ) -> Vec<(ListenerId, ListenerConfig)> {
        let rule_host = host(rule);
        let host_names: Vec<String> = std::iter::once(rule_host)
            .chain(options.host_name_extensions.iter().copied())
            .filter(|host| !host.is_empty())
            .unique()
            .map(str::to_string)
            .collect();

        let firewall_policy = options
            .firewall_policy
            .filter(|_| {
                http_paths(rule)
                    .unwrap_or_default()
                    .iter()
                    .any(|entry| is_root_path(path(entry)))
            })
            .map(str::to_string);

        let mut listeners = Vec::new();
        let certificate = self.certificate_for(key, options, rule_host);
        let mut redirect = None;

        if let Some(certificate) = certificate.clone() {
            let id = ListenerId::new(
                options.frontend_port_override.unwrap_or(HTTPS_PORT),
                host_names.clone(),
                options.use_private_ip,
            );
            if options.ssl_redirect {
                redirect = Some(ssl_redirect_name(&id));
            }
            listeners.push((
                id,
                ListenerConfig {
                    protocol: Protocol::Https,
                    certificate: Some(certificate),
                    ssl_redirect: redirect.clone(),
                    redirect_to: None,
                    firewall_policy: firewall_policy.clone(),
                },
            ));
        }

        if certificate.is_none() || options.ssl_redirect {
            let id = ListenerId::new(
                options.frontend_port_override.unwrap_or(HTTP_PORT),
                host_names,
                options.use_private_ip,
            );
            listeners.push((
                id,
                ListenerConfig {
                    protocol: Protocol::Http,
                    certificate: None,
                    ssl_redirect: None,
                    redirect_to: redirect,
                    firewall_policy,
                },
            ));
        }

        listeners
    }

    /// TLS secret for the host, then the catch-all TLS secret, then a certificate installed on the gateway.
    fn certificate_for(
        &self,
        key: &ObjectKey,
        options: &IngressListenerOptions<'_>,
        host: &str,
    ) -> Option<CertificateSource> {
        if let Some(secret) = options
            .tls_secrets
            .get(host)
            .or_else(|| options.tls_secrets.get(""))
        {
            return Some(CertificateSource::Secret(secret.clone()));
        }

        let name = options.gateway_certificate?;
        let installed = self
            .existing
            .properties
            .ssl_certificates
            .iter()
            .any(|certificate| certificate.name() == name);
        if installed {
            Some(CertificateSource::Gateway(name.to_string()))
        } else {
            self.emit(
                key,
                EventReason::SslCertificateNotFound,
                format!("SSL certificate {name} is not installed on the gateway"),
            );
            None
        }
    }

    /// Public and private listeners cannot share a frontend port; the public ones stay.
    fn drop_conflicting_private_listeners(
        &self,
        configs: &mut BTreeMap<ListenerId, ListenerConfig>,
        origins: &BTreeMap<ListenerId, ObjectKey>,
    ) {
        let public_ports: BTreeSet<Port> = configs
            .keys()
            .filter(|id| !id.use_private_ip())
            .map(ListenerId::frontend_port)
            .collect();

        let conflicting: Vec<ListenerId> = configs
            .keys()
            .filter(|id| id.use_private_ip() && public_ports.contains(&id.frontend_port()))
            .cloned()
            .collect();

        for id in conflicting {
            configs.remove(&id);
            let message = format!(
                "Private listener {} conflicts with a public listener on port {}",
                listener_name(&id),
                id.frontend_port()
            );
            error!("{message}");
            if let Some(origin) = origins.get(&id) {
                self.emit(origin, EventReason::FrontendIpConflict, message);
            }
        }
    }

    fn frontend_ports<'l>(
        &self,
        ids: impl Iterator<Item = &'l ListenerId>,
    ) -> BTreeMap<Port, FrontendPort> {
        ids.map(ListenerId::frontend_port)
            .unique()
            .map(|port| {
                let existing = self
                    .existing
                    .properties
                    .frontend_ports
                    .iter()
                    .find(|existing| existing.properties().port == port);
                let frontend_port = existing.cloned().unwrap_or_else(|| {
                    let name = frontend_port_name(port);
                    FrontendPort::new(
                        &name,
                        self.identifier.frontend_port_id(&name),
                        FrontendPortProperties { port },
                    )
                });
                (port, frontend_port)
            })
            .collect()
    }

    fn certificates<'l>(
        &self,
        configs: impl Iterator<Item = &'l ListenerConfig>,
    ) -> BTreeMap<String, SslCertificate> {
        let mut certificates = BTreeMap::new();
        for source in configs.filter_map(|config| config.certificate.as_ref()) {
            let name = source.name();
            if certificates.contains_key(&name) {
                continue;
            }

            let certificate = match source {
                CertificateSource::Secret(secret) => {
                    self.snapshot.pfx_certificate(secret).map(|pfx| {
                        SslCertificate::new(
                            &name,
                            self.identifier.ssl_certificate_id(&name),
                            SslCertificateProperties {
                                data: Some(STANDARD.encode(pfx)),
                                password: Some(CERTIFICATE_PASSWORD.to_string()),
                                ..SslCertificateProperties::default()
                            },
                        )
                    })
                }
                CertificateSource::Gateway(name) => self
                    .existing
                    .properties
                    .ssl_certificates
                    .iter()
                    .find(|certificate| certificate.name() == name)
                    .cloned(),
            };

            if let Some(certificate) = certificate {
                debug!("Using SSL certificate {name}");
                certificates.insert(name, certificate);
            }
        }

        certificates
    }

    fn listener(
        &self,
        id: &ListenerId,
        config: &ListenerConfig,
        ports: &BTreeMap<Port, FrontendPort>,
    ) -> HttpListener {
        let name = listener_name(id);
        let (host_name, host_names) = match id.host_names().as_slice() {
            [] => (None, Vec::new()),
            [single] => (Some(single.clone()), Vec::new()),
            many => (None, many.to_vec()),
        };
        let is_https = config.protocol == Protocol::Https;

        HttpListener::new(
            &name,
            self.identifier.listener_id(&name),
            HttpListenerProperties {
                frontend_ip_configuration: self
                    .frontend_ip_configuration(id.use_private_ip())
                    .map(|configuration| SubResource::new(configuration.id().clone())),
                frontend_port: ports
                    .get(&id.frontend_port())
                    .map(|port| SubResource::new(port.id().clone())),
                protocol: config.protocol,
                host_name,
                host_names,
                ssl_certificate: config
                    .certificate
                    .as_ref()
                    .filter(|_| is_https)
                    .map(|source| SubResource::new(self.identifier.ssl_certificate_id(&source.name()))),
                require_server_name_indication: is_https.then_some(!id.host_names().is_empty()),
                firewall_policy: config.firewall_policy.clone().map(SubResource::new),
            },
        )
    }

    fn frontend_ip_configuration(&self, use_private_ip: bool) -> Option<&FrontendIpConfiguration> {
        let found = self
            .existing
            .properties
            .frontend_ip_configurations
            .iter()
            .find(|configuration| {
                if use_private_ip {
                    configuration.properties().is_private()
                } else {
                    configuration.properties().is_public()
                }
            });
        if found.is_none() {
            warn!(
                "The gateway has no {} frontend IP configuration",
                if use_private_ip { "private" } else { "public" }
            );
        }
        found
    }
}
