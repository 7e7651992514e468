//! Picks the resources of the deployed gateway that must survive a build.
//!
//! Every routing rule is traced back to the targets it serves: the host names and port of its
//! listener and, for path-based rules, the paths of its path map. Rules serving a retained target
//! keep their whole routing chain: listener, port, certificate, path map, pools, settings, probes,
//! redirects, rewrite rule sets and load distribution policies.

use crate::appgw::{
    GatewayProperties, HttpListener, Protocol, RequestRoutingRule, Resource, SubResource,
    UrlPathMap, name_of,
};
use crate::brownfield::targets::{Target, TargetPolicy};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExistingResourceError {
    #[error("routing rule {rule} references listener {listener}, which does not exist")]
    ListenerLookup { rule: String, listener: String },
}

/// Names of the retained resources, per kind.
#[derive(Debug, Default)]
struct RetainedNames {
    listeners: BTreeSet<String>,
    rules: BTreeSet<String>,
    path_maps: BTreeSet<String>,
    pools: BTreeSet<String>,
    settings: BTreeSet<String>,
    redirects: BTreeSet<String>,
    rewrite_rule_sets: BTreeSet<String>,
    load_distribution_policies: BTreeSet<String>,
}

impl RetainedNames {
    fn add(set: &mut BTreeSet<String>, reference: Option<&SubResource>) {
        if let Some(reference) = reference {
            set.insert(name_of(reference.id()).to_string());
        }
    }
}

/// Indexes over the deployed gateway.
struct ExistingGateway<'e> {
    properties: &'e GatewayProperties,
    listeners: BTreeMap<&'e str, &'e HttpListener>,
    path_maps: BTreeMap<&'e str, &'e UrlPathMap>,
    ports: BTreeMap<&'e str, i32>,
}

impl<'e> ExistingGateway<'e> {
    fn new(properties: &'e GatewayProperties) -> Self {
        Self {
            properties,
            listeners: by_name(&properties.http_listeners),
            path_maps: by_name(&properties.url_path_maps),
            ports: properties
                .frontend_ports
                .iter()
                .map(|port| {
                    (
                        port.name().as_str(),
                        i32::from(port.properties().port.value()),
                    )
                })
                .collect(),
        }
    }

    fn listener_port(&self, listener: &HttpListener) -> i32 {
        listener
            .properties()
            .frontend_port
            .as_ref()
            .and_then(|port| self.ports.get(name_of(port.id())).copied())
            .unwrap_or_else(|| match listener.properties().protocol {
                Protocol::Http => 80,
                Protocol::Https => 443,
            })
    }

    /// One host-level target per host name of the listener; a single empty host when it has none.
    fn listener_targets(&self, listener: &HttpListener) -> Vec<Target> {
        let port = self.listener_port(listener);
        let hosts = listener.properties().all_host_names();
        if hosts.is_empty() {
            vec![Target::new("", port, None)]
        } else {
            hosts
                .into_iter()
                .map(|host| Target::new(host, port, None))
                .collect()
        }
    }

    fn rule_listener(
        &self,
        rule: &RequestRoutingRule,
    ) -> Result<Option<&'e HttpListener>, ExistingResourceError> {
        let Some(reference) = rule.properties().http_listener.as_ref() else {
            return Ok(None);
        };
        let listener = name_of(reference.id());
        self.listeners
            .get(listener)
            .copied()
            .map(Some)
            .ok_or_else(|| ExistingResourceError::ListenerLookup {
                rule: rule.name().clone(),
                listener: listener.to_string(),
            })
    }

    fn rule_path_map(&self, rule: &RequestRoutingRule) -> Option<&'e UrlPathMap> {
        let reference = rule.properties().url_path_map.as_ref()?;
        let path_map = self.path_maps.get(name_of(reference.id())).copied();
        if path_map.is_none() {
            error!(
                "Routing rule {} references url path map {}, which does not exist",
                rule.name(),
                name_of(reference.id())
            );
        }
        path_map
    }

    /// Targets served by a routing rule: the host-level targets of its listener plus one per path.
    fn rule_targets(&self, rule: &RequestRoutingRule) -> Result<Vec<Target>, ExistingResourceError> {
        let Some(listener) = self.rule_listener(rule)? else {
            return Ok(Vec::new());
        };

        let mut targets = self.listener_targets(listener);
        if let Some(path_map) = self.rule_path_map(rule) {
            let port = self.listener_port(listener);
            let hosts = listener.properties().all_host_names();
            let hosts = if hosts.is_empty() { vec![""] } else { hosts };
            for path_rule in &path_map.properties().path_rules {
                for path in &path_rule.properties().paths {
                    targets.extend(
                        hosts
                            .iter()
                            .map(|host| Target::new(host, port, Some(path.as_str()))),
                    );
                }
            }
        }
        Ok(targets)
    }

    fn retained_names(&self, policy: &TargetPolicy) -> RetainedNames {
        let mut names = RetainedNames::default();

        for listener in &self.properties.http_listeners {
            let targets = self.listener_targets(listener);
            if let Some(target) = targets.iter().find(|target| policy.is_retained(target)) {
                debug!("Listener {} serves retained target {target}", listener.name());
                names.listeners.insert(listener.name().clone());
            }
        }

        for rule in &self.properties.request_routing_rules {
            let targets = match self.rule_targets(rule) {
                Ok(targets) => targets,
                Err(err) => {
                    error!("Dropping routing rule {}: {err}", rule.name());
                    continue;
                }
            };
            let Some(target) = targets.iter().find(|target| policy.is_retained(target)) else {
                continue;
            };

            debug!("Routing rule {} serves retained target {target}", rule.name());
            self.retain_rule(rule, &mut names);
        }

        for redirect in &self.properties.redirect_configurations {
            let target_listener = redirect
                .properties()
                .target_listener
                .as_ref()
                .map(|listener| name_of(listener.id()));
            if target_listener.is_some_and(|listener| names.listeners.contains(listener)) {
                names.redirects.insert(redirect.name().clone());
            }
        }

        names
    }

    fn retain_rule(&self, rule: &RequestRoutingRule, names: &mut RetainedNames) {
        let properties = rule.properties();
        names.rules.insert(rule.name().clone());
        RetainedNames::add(&mut names.listeners, properties.http_listener.as_ref());
        RetainedNames::add(&mut names.pools, properties.backend_address_pool.as_ref());
        RetainedNames::add(&mut names.settings, properties.backend_http_settings.as_ref());
        RetainedNames::add(&mut names.redirects, properties.redirect_configuration.as_ref());
        RetainedNames::add(&mut names.rewrite_rule_sets, properties.rewrite_rule_set.as_ref());
        RetainedNames::add(
            &mut names.load_distribution_policies,
            properties.load_distribution_policy.as_ref(),
        );

        let Some(path_map) = self.rule_path_map(rule) else {
            return;
        };
        let map = path_map.properties();
        names.path_maps.insert(path_map.name().clone());
        RetainedNames::add(&mut names.pools, map.default_backend_address_pool.as_ref());
        RetainedNames::add(&mut names.settings, map.default_backend_http_settings.as_ref());
        RetainedNames::add(&mut names.redirects, map.default_redirect_configuration.as_ref());
        RetainedNames::add(&mut names.rewrite_rule_sets, map.default_rewrite_rule_set.as_ref());
        RetainedNames::add(
            &mut names.load_distribution_policies,
            map.default_load_distribution_policy.as_ref(),
        );
        for path_rule in &map.path_rules {
            let path_rule = path_rule.properties();
            RetainedNames::add(&mut names.pools, path_rule.backend_address_pool.as_ref());
            RetainedNames::add(&mut names.settings, path_rule.backend_http_settings.as_ref());
            RetainedNames::add(&mut names.redirects, path_rule.redirect_configuration.as_ref());
            RetainedNames::add(&mut names.rewrite_rule_sets, path_rule.rewrite_rule_set.as_ref());
            RetainedNames::add(
                &mut names.load_distribution_policies,
                path_rule.load_distribution_policy.as_ref(),
            );
        }
    }
}

fn by_name<P>(resources: &[Resource<P>]) -> BTreeMap<&str, &Resource<P>> {
    resources
        .iter()
        .map(|resource| (resource.name().as_str(), resource))
        .collect()
}

fn retain_named<P: Clone>(resources: &[Resource<P>], names: &BTreeSet<String>) -> Vec<Resource<P>> {
    resources
        .iter()
        .filter(|resource| names.contains(resource.name()))
        .cloned()
        .collect()
}

fn referenced_names<'r>(references: impl Iterator<Item = Option<&'r SubResource>>) -> BTreeSet<String> {
    references
        .flatten()
        .map(|reference| name_of(reference.id()).to_string())
        .collect()
}

/// The resources of the deployed gateway that the policy says the compiler must carry over untouched.
pub fn retained_resources(existing: &GatewayProperties, policy: &TargetPolicy) -> GatewayProperties {
    if matches!(policy, TargetPolicy::Unrestricted) {
        return GatewayProperties::default();
    }

    let gateway = ExistingGateway::new(existing);
    let mut names = gateway.retained_names(policy);

    let load_distribution_policies =
        retain_named(&existing.load_distribution_policies, &names.load_distribution_policies);
    names.pools.extend(referenced_names(
        load_distribution_policies
            .iter()
            .flat_map(|ldp| &ldp.properties().load_distribution_targets)
            .map(|target| target.properties().backend_address_pool.as_ref()),
    ));

    let http_listeners = retain_named(&existing.http_listeners, &names.listeners);
    let ports = referenced_names(
        http_listeners
            .iter()
            .map(|listener| listener.properties().frontend_port.as_ref()),
    );
    let certificates = referenced_names(
        http_listeners
            .iter()
            .map(|listener| listener.properties().ssl_certificate.as_ref()),
    );

    let backend_http_settings_collection =
        retain_named(&existing.backend_http_settings_collection, &names.settings);
    let probes = referenced_names(
        backend_http_settings_collection
            .iter()
            .map(|settings| settings.properties().probe.as_ref()),
    );
    let trusted_roots = referenced_names(
        backend_http_settings_collection
            .iter()
            .flat_map(|settings| &settings.properties().trusted_root_certificates)
            .map(Some),
    );

    GatewayProperties {
        backend_address_pools: retain_named(&existing.backend_address_pools, &names.pools),
        backend_http_settings_collection,
        frontend_ip_configurations: Vec::new(),
        frontend_ports: retain_named(&existing.frontend_ports, &ports),
        http_listeners,
        probes: retain_named(&existing.probes, &probes),
        redirect_configurations: retain_named(&existing.redirect_configurations, &names.redirects),
        request_routing_rules: retain_named(&existing.request_routing_rules, &names.rules),
        ssl_certificates: retain_named(&existing.ssl_certificates, &certificates),
        url_path_maps: retain_named(&existing.url_path_maps, &names.path_maps),
        rewrite_rule_sets: retain_named(&existing.rewrite_rule_sets, &names.rewrite_rule_sets),
        load_distribution_policies,
        trusted_root_certificates: retain_named(&existing.trusted_root_certificates, &trusted_roots),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appgw::{
        FrontendPort, FrontendPortProperties, HttpListenerProperties,
        RequestRoutingRuleProperties, RuleType,
    };
    use crate::net::Port;

    fn id(name: &str) -> String {
        format!("/gw/{name}")
    }

    fn listener(name: &str, host: &str, port: &str) -> HttpListener {
        HttpListener::new(
            name,
            id(name),
            HttpListenerProperties {
                frontend_port: Some(SubResource::new(id(port))),
                host_name: Some(host.to_string()).filter(|h| !h.is_empty()),
                ..HttpListenerProperties::default()
            },
        )
    }

    fn rule(name: &str, listener: &str, pool: &str) -> RequestRoutingRule {
        RequestRoutingRule::new(
            name,
            id(name),
            RequestRoutingRuleProperties {
                rule_type: RuleType::Basic,
                http_listener: Some(SubResource::new(id(listener))),
                backend_address_pool: Some(SubResource::new(id(pool))),
                ..RequestRoutingRuleProperties::default()
            },
        )
    }

    fn gateway() -> GatewayProperties {
        GatewayProperties {
            frontend_ports: vec![FrontendPort::new(
                "fp-80",
                id("fp-80"),
                FrontendPortProperties {
                    port: Port::new(80),
                },
            )],
            http_listeners: vec![
                listener("user-listener", "bye.com", "fp-80"),
                listener("fl-1234abcd", "foo.baz", "fp-80"),
            ],
            request_routing_rules: vec![
                rule("user-rule", "user-listener", "user-pool"),
                rule("rr-1234abcd", "fl-1234abcd", "pool-foo"),
                rule("orphan-rule", "missing-listener", "user-pool"),
            ],
            ..GatewayProperties::default()
        }
    }

    #[test]
    fn test_unrestricted_policy_retains_nothing() {
        let retained = retained_resources(&gateway(), &TargetPolicy::Unrestricted);
        assert_eq!(retained, GatewayProperties::default());
    }

    #[test]
    fn test_prohibited_host_keeps_its_routing_chain() {
        let policy = TargetPolicy::Prohibit(vec![Target::new("bye.com", 0, None)]);
        let retained = retained_resources(&gateway(), &policy);

        let listeners: Vec<_> = retained.http_listeners.iter().map(|l| l.name().as_str()).collect();
        let rules: Vec<_> = retained
            .request_routing_rules
            .iter()
            .map(|r| r.name().as_str())
            .collect();
        let ports: Vec<_> = retained.frontend_ports.iter().map(|p| p.name().as_str()).collect();

        assert_eq!(listeners, vec!["user-listener"]);
        assert_eq!(rules, vec!["user-rule"]);
        assert_eq!(ports, vec!["fp-80"]);
    }

    #[test]
    fn test_managed_host_releases_only_its_chain() {
        let policy = TargetPolicy::Manage(vec![Target::new("foo.baz", 0, None)]);
        let retained = retained_resources(&gateway(), &policy);

        let rules: Vec<_> = retained
            .request_routing_rules
            .iter()
            .map(|r| r.name().as_str())
            .collect();
        assert_eq!(rules, vec!["user-rule"]);
    }

    #[test]
    fn test_rule_with_unknown_listener_fails_lookup() {
        let gateway = gateway();
        let existing = ExistingGateway::new(&gateway);
        let orphan = &gateway.request_routing_rules[2];

        assert_eq!(
            existing.rule_targets(orphan),
            Err(ExistingResourceError::ListenerLookup {
                rule: "orphan-rule".to_string(),
                listener: "missing-listener".to_string(),
            })
        );
    }
}
