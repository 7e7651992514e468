use getset::{Getters, MutGetters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use typed_builder::TypedBuilder;

use crate::net::Port;

pub const ETAG: &str = "*";

fn default_etag() -> String {
    ETAG.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationGateway {
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: GatewayProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProperties {
    #[serde(default)]
    pub backend_address_pools: Vec<BackendAddressPool>,
    #[serde(default)]
    pub backend_http_settings_collection: Vec<BackendHttpSettings>,
    #[serde(default, rename = "frontendIPConfigurations")]
    pub frontend_ip_configurations: Vec<FrontendIpConfiguration>,
    #[serde(default)]
    pub frontend_ports: Vec<FrontendPort>,
    #[serde(default)]
    pub http_listeners: Vec<HttpListener>,
    #[serde(default)]
    pub probes: Vec<Probe>,
    #[serde(default)]
    pub redirect_configurations: Vec<RedirectConfiguration>,
    #[serde(default)]
    pub request_routing_rules: Vec<RequestRoutingRule>,
    #[serde(default)]
    pub ssl_certificates: Vec<SslCertificate>,
    #[serde(default)]
    pub url_path_maps: Vec<UrlPathMap>,
    #[serde(default)]
    pub rewrite_rule_sets: Vec<RewriteRuleSet>,
    #[serde(default)]
    pub load_distribution_policies: Vec<LoadDistributionPolicy>,
    #[serde(default)]
    pub trusted_root_certificates: Vec<TrustedRootCertificate>,
}

/// A named gateway resource.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters, MutGetters, TypedBuilder,
)]
pub struct Resource<P> {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    id: String,

    #[getset(get = "pub")]
    #[builder(default = default_etag(), setter(into))]
    #[serde(default = "default_etag")]
    etag: String,

    #[getset(get = "pub", get_mut = "pub")]
    properties: P,
}

impl<P> Resource<P> {
    pub fn new(name: impl Into<String>, id: impl Into<String>, properties: P) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            etag: default_etag(),
            properties,
        }
    }

    pub fn into_properties(self) -> P {
        self.properties
    }
}

/// A reference to another resource by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Getters)]
pub struct SubResource {
    #[getset(get = "pub")]
    id: String,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum CookieBasedAffinity {
    Enabled,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RuleType {
    #[default]
    Basic,
    PathBasedRouting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RedirectType {
    #[default]
    Permanent,
    Found,
    SeeOther,
    Temporary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum LoadDistributionAlgorithm {
    #[default]
    RoundRobin,
    LeastConnections,
    IpHash,
}

pub type BackendAddressPool = Resource<BackendAddressPoolProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddressPoolProperties {
    #[serde(default)]
    pub backend_addresses: Vec<BackendAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl BackendAddress {
    pub fn ip(ip: impl Into<String>) -> Self {
        Self {
            fqdn: None,
            ip_address: Some(ip.into()),
        }
    }

    pub fn fqdn(fqdn: impl Into<String>) -> Self {
        Self {
            fqdn: Some(fqdn.into()),
            ip_address: None,
        }
    }
}

pub type BackendHttpSettings = Resource<BackendHttpSettingsProperties>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHttpSettingsProperties {
    pub port: Port,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub cookie_based_affinity: CookieBasedAffinity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_draining: Option<ConnectionDraining>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_root_certificates: Vec<SubResource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDraining {
    pub enabled: bool,
    pub drain_timeout_in_sec: i32,
}

pub type Probe = Resource<ProbeProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeProperties {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub interval: i32,
    #[serde(default)]
    pub timeout: i32,
    #[serde(default)]
    pub unhealthy_threshold: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_host_name_from_backend_http_settings: Option<bool>,
    #[serde(default)]
    pub min_servers: i32,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_: Option<ProbeMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Port>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeMatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_codes: Vec<String>,
}

pub type FrontendPort = Resource<FrontendPortProperties>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendPortProperties {
    pub port: Port,
}

pub type FrontendIpConfiguration = Resource<FrontendIpConfigurationProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendIpConfigurationProperties {
    #[serde(default, rename = "privateIPAddress", skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    #[serde(
        default,
        rename = "privateIPAllocationMethod",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_ip_allocation_method: Option<String>,
    #[serde(default, rename = "publicIPAddress", skip_serializing_if = "Option::is_none")]
    pub public_ip_address: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,
}

impl FrontendIpConfigurationProperties {
    pub fn is_public(&self) -> bool {
        self.public_ip_address.is_some()
    }

    pub fn is_private(&self) -> bool {
        self.private_ip_address.is_some()
    }
}

pub type SslCertificate = Resource<SslCertificateProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificateProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_vault_secret_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_cert_data: Option<String>,
}

pub type TrustedRootCertificate = Resource<TrustedRootCertificateProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedRootCertificateProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_vault_secret_id: Option<String>,
}

pub type HttpListener = Resource<HttpListenerProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpListenerProperties {
    #[serde(
        default,
        rename = "frontendIPConfiguration",
        skip_serializing_if = "Option::is_none"
    )]
    pub frontend_ip_configuration: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_port: Option<SubResource>,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_certificate: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_server_name_indication: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall_policy: Option<SubResource>,
}

impl HttpListenerProperties {
    /// The host names the listener answers for, whichever of the two fields carries them.
    pub fn all_host_names(&self) -> Vec<&str> {
        if self.host_names.is_empty() {
            self.host_name.iter().map(String::as_str).collect()
        } else {
            self.host_names.iter().map(String::as_str).collect()
        }
    }
}

pub type UrlPathMap = Resource<UrlPathMapProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPathMapProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend_address_pool: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend_http_settings: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_redirect_configuration: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rewrite_rule_set: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_load_distribution_policy: Option<SubResource>,
    #[serde(default)]
    pub path_rules: Vec<PathRule>,
}

pub type PathRule = Resource<PathRuleProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRuleProperties {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_address_pool: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_http_settings: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_configuration: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_rule_set: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall_policy: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_distribution_policy: Option<SubResource>,
}

pub type RequestRoutingRule = Resource<RequestRoutingRuleProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRoutingRuleProperties {
    #[serde(default)]
    pub rule_type: RuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_listener: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_address_pool: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_http_settings: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_configuration: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_rule_set: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path_map: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_distribution_policy: Option<SubResource>,
}

pub type RedirectConfiguration = Resource<RedirectConfigurationProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectConfigurationProperties {
    #[serde(default)]
    pub redirect_type: RedirectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_listener: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_path: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_query_string: Option<bool>,
}

pub type RewriteRuleSet = Resource<RewriteRuleSetProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRuleSetProperties {
    #[serde(default)]
    pub rewrite_rules: Vec<RewriteRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRule {
    pub name: String,
    pub rule_sequence: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RewriteCondition>,
    #[serde(default)]
    pub action_set: RewriteActionSet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteCondition {
    pub variable: String,
    pub pattern: String,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteActionSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_header_configurations: Vec<HeaderConfiguration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_header_configurations: Vec<HeaderConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_configuration: Option<UrlConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderConfiguration {
    pub header_name: String,
    #[serde(default)]
    pub header_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_query_string: Option<String>,
    #[serde(default)]
    pub reroute: bool,
}

pub type LoadDistributionPolicy = Resource<LoadDistributionPolicyProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDistributionPolicyProperties {
    #[serde(default)]
    pub load_distribution_algorithm: LoadDistributionAlgorithm,
    #[serde(default)]
    pub load_distribution_targets: Vec<LoadDistributionTarget>,
}

pub type LoadDistributionTarget = Resource<LoadDistributionTargetProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDistributionTargetProperties {
    pub weight_per_server: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_address_pool: Option<SubResource>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::assert_ok;

    #[test]
    fn test_document_serializes_every_collection() {
        let json = assert_ok!(serde_json::to_value(ApplicationGateway::default()));
        let properties = &json["properties"];

        for key in [
            "backendAddressPools",
            "backendHttpSettingsCollection",
            "frontendIPConfigurations",
            "frontendPorts",
            "httpListeners",
            "probes",
            "redirectConfigurations",
            "requestRoutingRules",
            "sslCertificates",
            "urlPathMaps",
            "rewriteRuleSets",
            "loadDistributionPolicies",
            "trustedRootCertificates",
        ] {
            assert!(properties[key].is_array(), "{key} should be an array");
        }
        assert!(json["tags"].is_object());
    }

    #[test]
    fn test_resource_defaults_etag_on_read() {
        let json = r#"{"name":"fp-80","id":"/x/frontendPorts/fp-80","properties":{"port":80}}"#;
        let port: FrontendPort = assert_ok!(serde_json::from_str(json));

        assert_eq!(port.etag(), ETAG);
        assert_eq!(port.properties().port.value(), 80);
    }

    #[test]
    fn test_probe_match_is_renamed() {
        let probe = Probe::new(
            "defaultprobe-Http",
            "/x/probes/defaultprobe-Http",
            ProbeProperties {
                match_: Some(ProbeMatch::default()),
                ..ProbeProperties::default()
            },
        );

        let json = assert_ok!(serde_json::to_value(&probe));
        assert!(json["properties"]["match"].is_object());
    }

    #[test]
    fn test_protocol_parses_case_insensitively() {
        assert_eq!("HTTPS".parse::<Protocol>().ok(), Some(Protocol::Https));
        assert_eq!(Protocol::Http.to_string(), "Http");
    }
}
