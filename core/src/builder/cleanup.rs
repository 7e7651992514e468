//! Final passes over the assembled gateway that drop resources nothing refers to.

use crate::appgw::{GatewayProperties, Protocol, SubResource, UrlPathMap, name_of};
use crate::builder::names::{
    DEFAULT_BACKEND_ADDRESS_POOL_NAME, DEFAULT_BACKEND_HTTP_SETTINGS_NAME, PATH_RULE_PREFIX,
    default_probe_name,
};
use std::collections::BTreeSet;
use tracing::debug;

fn refers_to(reference: Option<&SubResource>, name: &str) -> bool {
    reference.is_some_and(|reference| name_of(reference.id()).eq_ignore_ascii_case(name))
}

/// Drops the path rules a previous build authored from path maps carried over from the existing gateway.
pub fn remove_managed_path_rules(maps: &mut [UrlPathMap]) {
    for map in maps {
        let name = map.name().clone();
        map.properties_mut().path_rules.retain(|rule| {
            let managed = rule.name().starts_with(PATH_RULE_PREFIX);
            if managed {
                debug!("Removing path rule {} from url path map {name}", rule.name());
            }
            !managed
        });
    }
}

fn is_pool_used(properties: &GatewayProperties, name: &str) -> bool {
    properties
        .request_routing_rules
        .iter()
        .any(|rule| refers_to(rule.properties().backend_address_pool.as_ref(), name))
        || properties.url_path_maps.iter().any(|map| {
            refers_to(map.properties().default_backend_address_pool.as_ref(), name)
                || map
                    .properties()
                    .path_rules
                    .iter()
                    .any(|rule| refers_to(rule.properties().backend_address_pool.as_ref(), name))
        })
        || properties
            .load_distribution_policies
            .iter()
            .flat_map(|policy| &policy.properties().load_distribution_targets)
            .any(|target| refers_to(target.properties().backend_address_pool.as_ref(), name))
}

fn is_settings_used(properties: &GatewayProperties, name: &str) -> bool {
    properties
        .request_routing_rules
        .iter()
        .any(|rule| refers_to(rule.properties().backend_http_settings.as_ref(), name))
        || properties.url_path_maps.iter().any(|map| {
            refers_to(map.properties().default_backend_http_settings.as_ref(), name)
                || map
                    .properties()
                    .path_rules
                    .iter()
                    .any(|rule| refers_to(rule.properties().backend_http_settings.as_ref(), name))
        })
}

fn is_probe_used(properties: &GatewayProperties, name: &str) -> bool {
    properties
        .backend_http_settings_collection
        .iter()
        .any(|settings| refers_to(settings.properties().probe.as_ref(), name))
}

/// Removes the default pool, settings and probes when no routing chain reaches them.
///
/// Settings go before probes so a probe only kept alive by the unused default settings goes too.
pub fn remove_unreferenced_defaults(properties: &mut GatewayProperties) {
    if !is_pool_used(properties, DEFAULT_BACKEND_ADDRESS_POOL_NAME) {
        debug!("Removing unused {DEFAULT_BACKEND_ADDRESS_POOL_NAME}");
        properties
            .backend_address_pools
            .retain(|pool| !pool.name().eq_ignore_ascii_case(DEFAULT_BACKEND_ADDRESS_POOL_NAME));
    }

    if !is_settings_used(properties, DEFAULT_BACKEND_HTTP_SETTINGS_NAME) {
        debug!("Removing unused {DEFAULT_BACKEND_HTTP_SETTINGS_NAME}");
        properties.backend_http_settings_collection.retain(|settings| {
            !settings
                .name()
                .eq_ignore_ascii_case(DEFAULT_BACKEND_HTTP_SETTINGS_NAME)
        });
    }

    for protocol in [Protocol::Http, Protocol::Https] {
        let name = default_probe_name(protocol);
        if !is_probe_used(properties, &name) {
            debug!("Removing unused {name}");
            properties
                .probes
                .retain(|probe| !probe.name().eq_ignore_ascii_case(&name));
        }
    }
}

/// Keeps only the redirect configurations a routing rule or path map points at.
pub fn remove_unreferenced_redirects(properties: &mut GatewayProperties) {
    let mut used: BTreeSet<&str> = BTreeSet::new();
    for rule in &properties.request_routing_rules {
        used.extend(rule.properties().redirect_configuration.as_ref().map(|r| r.id().as_str()));
    }
    for map in &properties.url_path_maps {
        used.extend(
            map.properties()
                .default_redirect_configuration
                .as_ref()
                .map(|r| r.id().as_str()),
        );
        for rule in &map.properties().path_rules {
            used.extend(rule.properties().redirect_configuration.as_ref().map(|r| r.id().as_str()));
        }
    }

    let used: BTreeSet<String> = used.into_iter().map(str::to_string).collect();
    properties.redirect_configurations.retain(|redirect| {
        let keep = used.contains(redirect.id());
        if !keep {
            debug!("Removing unused redirect {}", redirect.name());
        }
        keep
    });
}

/// Keeps only the trusted root certificates some backend HTTP settings trust.
pub fn remove_unreferenced_trusted_roots(properties: &mut GatewayProperties) {
    let used: BTreeSet<String> = properties
        .backend_http_settings_collection
        .iter()
        .flat_map(|settings| &settings.properties().trusted_root_certificates)
        .map(|certificate| certificate.id().clone())
        .collect();

    properties.trusted_root_certificates.retain(|certificate| {
        let keep = used.contains(certificate.id());
        if !keep {
            debug!("Removing unused trusted root certificate {}", certificate.name());
        }
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appgw::{
        BackendAddressPool, BackendAddressPoolProperties, BackendHttpSettings,
        BackendHttpSettingsProperties, PathRule, PathRuleProperties, Probe, ProbeProperties,
        RequestRoutingRule, RequestRoutingRuleProperties, UrlPathMapProperties,
    };

    fn id(name: &str) -> String {
        format!("/subscriptions/s/resourceGroups/g/providers/Microsoft.Network/applicationGateways/gw/x/{name}")
    }

    fn defaults() -> GatewayProperties {
        let probe = default_probe_name(Protocol::Http);
        GatewayProperties {
            backend_address_pools: vec![BackendAddressPool::new(
                DEFAULT_BACKEND_ADDRESS_POOL_NAME,
                id(DEFAULT_BACKEND_ADDRESS_POOL_NAME),
                BackendAddressPoolProperties::default(),
            )],
            backend_http_settings_collection: vec![BackendHttpSettings::new(
                DEFAULT_BACKEND_HTTP_SETTINGS_NAME,
                id(DEFAULT_BACKEND_HTTP_SETTINGS_NAME),
                BackendHttpSettingsProperties {
                    port: crate::net::HTTP_PORT,
                    protocol: Protocol::Http,
                    cookie_based_affinity: crate::appgw::CookieBasedAffinity::Disabled,
                    request_timeout: Some(30),
                    probe: Some(SubResource::new(id(&probe))),
                    path: None,
                    host_name: None,
                    connection_draining: None,
                    trusted_root_certificates: Vec::new(),
                },
            )],
            probes: vec![
                Probe::new(&probe, id(&probe), ProbeProperties::default()),
                Probe::new(
                    default_probe_name(Protocol::Https),
                    id(&default_probe_name(Protocol::Https)),
                    ProbeProperties::default(),
                ),
            ],
            ..GatewayProperties::default()
        }
    }

    #[test]
    fn test_unused_defaults_are_removed() {
        let mut properties = defaults();
        remove_unreferenced_defaults(&mut properties);

        assert!(properties.backend_address_pools.is_empty());
        assert!(properties.backend_http_settings_collection.is_empty());
        assert!(properties.probes.is_empty());
    }

    #[test]
    fn test_used_defaults_are_kept() {
        let mut properties = defaults();
        properties.request_routing_rules.push(RequestRoutingRule::new(
            "rr-80",
            id("rr-80"),
            RequestRoutingRuleProperties {
                backend_address_pool: Some(SubResource::new(id(DEFAULT_BACKEND_ADDRESS_POOL_NAME))),
                backend_http_settings: Some(SubResource::new(id(
                    DEFAULT_BACKEND_HTTP_SETTINGS_NAME,
                ))),
                ..RequestRoutingRuleProperties::default()
            },
        ));
        remove_unreferenced_defaults(&mut properties);

        assert_eq!(properties.backend_address_pools.len(), 1);
        assert_eq!(properties.backend_http_settings_collection.len(), 1);
        let probes: Vec<_> = properties.probes.iter().map(|p| p.name().as_str()).collect();
        assert_eq!(probes, vec!["defaultprobe-Http"]);
    }

    #[test]
    fn test_managed_path_rules_are_removed() {
        let rule = |name: &str| {
            PathRule::new(
                name,
                id(name),
                PathRuleProperties {
                    paths: vec![format!("/{name}")],
                    ..PathRuleProperties::default()
                },
            )
        };
        let mut maps = vec![UrlPathMap::new(
            "url-80",
            id("url-80"),
            UrlPathMapProperties {
                path_rules: vec![rule("pr-default-web-0"), rule("user-rule")],
                ..UrlPathMapProperties::default()
            },
        )];
        remove_managed_path_rules(&mut maps);

        let names: Vec<_> = maps[0]
            .properties()
            .path_rules
            .iter()
            .map(|r| r.name().as_str())
            .collect();
        assert_eq!(names, vec!["user-rule"]);
    }
}
