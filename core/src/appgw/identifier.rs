use crate::config::CompilerConfiguration;
use getset::Getters;
use strum::IntoStaticStr;
use typed_builder::TypedBuilder;

/// The collections of the gateway, named the way they appear in resource ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ResourceKind {
    BackendAddressPools,
    BackendHttpSettingsCollection,
    #[strum(serialize = "frontendIPConfigurations")]
    FrontendIpConfigurations,
    FrontendPorts,
    HttpListeners,
    LoadDistributionPolicies,
    Probes,
    RedirectConfigurations,
    RequestRoutingRules,
    RewriteRuleSets,
    SslCertificates,
    TrustedRootCertificates,
    UrlPathMaps,
}

/// Produces resource ids rooted at one gateway.
#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder)]
pub struct Identifier {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    subscription_id: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    resource_group: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    gateway_name: String,
}

impl From<&CompilerConfiguration> for Identifier {
    fn from(config: &CompilerConfiguration) -> Self {
        Identifier::builder()
            .subscription_id(config.subscription_id())
            .resource_group(config.resource_group())
            .gateway_name(config.gateway_name())
            .build()
    }
}

impl Identifier {
    pub fn gateway_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/applicationGateways/{}",
            self.subscription_id, self.resource_group, self.gateway_name
        )
    }

    pub fn resource_id(&self, kind: ResourceKind, name: &str) -> String {
        let kind: &'static str = kind.into();
        format!("{}/{kind}/{name}", self.gateway_id())
    }

    pub fn address_pool_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::BackendAddressPools, name)
    }

    pub fn http_settings_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::BackendHttpSettingsCollection, name)
    }

    pub fn probe_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::Probes, name)
    }

    pub fn listener_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::HttpListeners, name)
    }

    pub fn frontend_port_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::FrontendPorts, name)
    }

    pub fn ssl_certificate_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::SslCertificates, name)
    }

    pub fn trusted_root_certificate_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::TrustedRootCertificates, name)
    }

    pub fn redirect_configuration_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::RedirectConfigurations, name)
    }

    pub fn rewrite_rule_set_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::RewriteRuleSets, name)
    }

    pub fn url_path_map_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::UrlPathMaps, name)
    }

    pub fn path_rule_id(&self, path_map: &str, name: &str) -> String {
        format!("{}/pathRules/{name}", self.url_path_map_id(path_map))
    }

    pub fn request_routing_rule_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::RequestRoutingRules, name)
    }

    pub fn load_distribution_policy_id(&self, name: &str) -> String {
        self.resource_id(ResourceKind::LoadDistributionPolicies, name)
    }

    pub fn load_distribution_target_id(&self, policy: &str, name: &str) -> String {
        format!(
            "{}/loadDistributionTargets/{name}",
            self.load_distribution_policy_id(policy)
        )
    }
}

/// The trailing name segment of a resource id.
pub fn name_of(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}
