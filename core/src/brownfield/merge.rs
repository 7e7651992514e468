//! Combines the retained resources of the deployed gateway with the freshly built ones.
//!
//! Resources of the same kind merge by name with the fresh copy winning. Frontend ports and
//! listeners are additionally deduplicated by what they bind to, since the gateway rejects two
//! of them on the same port or host, and routing rules merge per listener.

use crate::appgw::{
    FrontendPort, GatewayProperties, HttpListener, RequestRoutingRule,
    Resource, RuleType, SubResource, UrlPathMap, name_of,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Fresh resource ids replaced by the id of an equivalent retained resource.
type Aliases = BTreeMap<String, String>;

fn merge_by_name<P>(
    kind: &str,
    retained: Vec<Resource<P>>,
    fresh: Vec<Resource<P>>,
) -> Vec<Resource<P>> {
    let fresh_names: BTreeSet<String> = fresh.iter().map(|r| r.name().clone()).collect();

    let mut merged: Vec<Resource<P>> = retained
        .into_iter()
        .filter(|resource| {
            let replaced = fresh_names.contains(resource.name());
            if replaced {
                debug!("Replacing existing {kind} {}", resource.name());
            } else {
                debug!("Retaining existing {kind} {}", resource.name());
            }
            !replaced
        })
        .collect();
    merged.extend(fresh);
    merged
}

fn alias(reference: &mut Option<SubResource>, aliases: &Aliases) {
    if let Some(id) = reference.as_ref().and_then(|r| aliases.get(r.id())) {
        *reference = Some(SubResource::new(id.clone()));
    }
}

/// Fresh frontend ports that open a port number a retained port already opens.
fn port_aliases(retained: &[FrontendPort], fresh: &[FrontendPort]) -> Aliases {
    fresh
        .iter()
        .filter_map(|port| {
            retained
                .iter()
                .find(|existing| {
                    existing.properties().port == port.properties().port
                        && existing.name() != port.name()
                })
                .map(|existing| (port.id().clone(), existing.id().clone()))
        })
        .collect()
}

/// What a listener binds to: frontend IP, frontend port and host names.
fn listener_key(listener: &HttpListener) -> (Option<String>, Option<String>, Vec<String>) {
    let properties = listener.properties();
    let mut hosts: Vec<String> = properties
        .all_host_names()
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect();
    hosts.sort();

    (
        properties
            .frontend_ip_configuration
            .as_ref()
            .map(|ip| ip.id().to_ascii_lowercase()),
        properties
            .frontend_port
            .as_ref()
            .map(|port| port.id().to_ascii_lowercase()),
        hosts,
    )
}

/// Fresh listeners that bind exactly what a retained listener of another name binds.
fn listener_aliases(retained: &[HttpListener], fresh: &[HttpListener]) -> Aliases {
    let keys: BTreeMap<_, &HttpListener> = retained
        .iter()
        .map(|listener| (listener_key(listener), listener))
        .collect();

    fresh
        .iter()
        .filter_map(|listener| {
            keys.get(&listener_key(listener))
                .filter(|existing| existing.name() != listener.name())
                .map(|existing| (listener.id().clone(), existing.id().clone()))
        })
        .collect()
}

fn drop_aliased<P>(kind: &str, resources: &mut Vec<Resource<P>>, aliases: &Aliases) {
    resources.retain(|resource| match aliases.get(resource.id()) {
        Some(existing) => {
            debug!(
                "Using existing {kind} {} in place of {}",
                name_of(existing),
                resource.name()
            );
            false
        }
        None => true,
    });
}

fn merge_path_rules(into: &mut UrlPathMap, from: UrlPathMap) {
    let target = into.properties_mut();
    let mut names: BTreeSet<String> = target
        .path_rules
        .iter()
        .map(|rule| rule.name().clone())
        .collect();
    for rule in from.into_properties().path_rules {
        if names.insert(rule.name().clone()) {
            target.path_rules.push(rule);
        }
    }
}

/// Path maps merge by name; path rules within a map merge by name with the fresh rule winning.
fn merge_path_maps(retained: Vec<UrlPathMap>, fresh: Vec<UrlPathMap>) -> Vec<UrlPathMap> {
    let mut retained: BTreeMap<String, UrlPathMap> = retained
        .into_iter()
        .map(|map| (map.name().clone(), map))
        .collect();

    let mut merged: Vec<UrlPathMap> = fresh
        .into_iter()
        .map(|mut map| {
            if let Some(existing) = retained.remove(map.name()) {
                debug!("Merging path rules of existing url path map {}", map.name());
                merge_path_rules(&mut map, existing);
            }
            map
        })
        .collect();
    merged.extend(retained.into_values());
    merged
}

fn path_map_mut<'m>(
    maps: &'m mut [UrlPathMap],
    rule: &RequestRoutingRule,
) -> Option<&'m mut UrlPathMap> {
    let name = name_of(rule.properties().url_path_map.as_ref()?.id());
    maps.iter_mut()
        .find(|map| map.name().eq_ignore_ascii_case(name))
}

/// The catch-all of a basic rule becomes the default of a path map on the same listener.
fn apply_defaults(map: &mut UrlPathMap, basic: &RequestRoutingRule) {
    let rule = basic.properties();
    let map = map.properties_mut();

    if rule.redirect_configuration.is_some() {
        map.default_redirect_configuration = rule.redirect_configuration.clone();
        map.default_backend_address_pool = None;
        map.default_backend_http_settings = None;
    } else {
        map.default_backend_address_pool = rule.backend_address_pool.clone();
        map.default_backend_http_settings = rule.backend_http_settings.clone();
        map.default_redirect_configuration = None;
    }
    map.default_rewrite_rule_set = rule.rewrite_rule_set.clone();
    map.default_load_distribution_policy = rule.load_distribution_policy.clone();
}

/// Two rules on one listener become one; the first rule's name survives unless only the second routes by path.
fn combine(
    first: &RequestRoutingRule,
    second: RequestRoutingRule,
    maps: &mut Vec<UrlPathMap>,
) -> RequestRoutingRule {
    match (first.properties().rule_type, second.properties().rule_type) {
        (RuleType::Basic, RuleType::Basic) => {
            warn!(
                "Routing rules {} and {} share a listener; keeping {}",
                first.name(),
                second.name(),
                first.name()
            );
            first.clone()
        }
        (RuleType::Basic, RuleType::PathBasedRouting) => {
            if let Some(map) = path_map_mut(maps, &second) {
                apply_defaults(map, first);
            }
            second
        }
        (RuleType::PathBasedRouting, RuleType::Basic) => {
            if let Some(map) = path_map_mut(maps, first) {
                apply_defaults(map, &second);
            }
            first.clone()
        }
        (RuleType::PathBasedRouting, RuleType::PathBasedRouting) => {
            let source = second
                .properties()
                .url_path_map
                .as_ref()
                .map(|map| name_of(map.id()).to_string());
            let target = first
                .properties()
                .url_path_map
                .as_ref()
                .map(|map| name_of(map.id()).to_string());

            if let (Some(source), Some(target)) = (source, target) {
                if !source.eq_ignore_ascii_case(&target) {
                    if let Some(position) = maps
                        .iter()
                        .position(|map| map.name().eq_ignore_ascii_case(&source))
                    {
                        let removed = maps.remove(position);
                        debug!("Folding url path map {source} into {target}");
                        if let Some(map) = maps
                            .iter_mut()
                            .find(|map| map.name().eq_ignore_ascii_case(&target))
                        {
                            merge_path_rules(map, removed);
                        }
                    }
                }
            }
            first.clone()
        }
    }
}

/// Rules merge by name first, then by listener with retained rules ahead of fresh ones.
fn merge_rules(
    retained: Vec<RequestRoutingRule>,
    fresh: Vec<RequestRoutingRule>,
    maps: &mut Vec<UrlPathMap>,
) -> Vec<RequestRoutingRule> {
    let candidates = merge_by_name("request routing rule", retained, fresh);

    let mut merged: Vec<RequestRoutingRule> = Vec::with_capacity(candidates.len());
    let mut by_listener: BTreeMap<String, usize> = BTreeMap::new();
    for rule in candidates {
        let Some(listener) = rule
            .properties()
            .http_listener
            .as_ref()
            .map(|listener| listener.id().to_ascii_lowercase())
        else {
            merged.push(rule);
            continue;
        };

        match by_listener.get(&listener) {
            Some(&position) => {
                let combined = combine(&merged[position], rule, maps);
                merged[position] = combined;
            }
            None => {
                by_listener.insert(listener, merged.len());
                merged.push(rule);
            }
        }
    }
    merged
}

/// Overlays the freshly built gateway on the resources retained from the deployed one.
pub fn merge(retained: GatewayProperties, fresh: GatewayProperties) -> GatewayProperties {
    let mut fresh = fresh;

    let ports = port_aliases(&retained.frontend_ports, &fresh.frontend_ports);
    drop_aliased("frontend port", &mut fresh.frontend_ports, &ports);
    for listener in &mut fresh.http_listeners {
        alias(&mut listener.properties_mut().frontend_port, &ports);
    }

    let listeners = listener_aliases(&retained.http_listeners, &fresh.http_listeners);
    drop_aliased("listener", &mut fresh.http_listeners, &listeners);
    for rule in &mut fresh.request_routing_rules {
        alias(&mut rule.properties_mut().http_listener, &listeners);
    }
    for redirect in &mut fresh.redirect_configurations {
        alias(&mut redirect.properties_mut().target_listener, &listeners);
    }

    let mut url_path_maps = merge_path_maps(retained.url_path_maps, fresh.url_path_maps);
    let request_routing_rules = merge_rules(
        retained.request_routing_rules,
        fresh.request_routing_rules,
        &mut url_path_maps,
    );

    GatewayProperties {
        backend_address_pools: merge_by_name(
            "backend address pool",
            retained.backend_address_pools,
            fresh.backend_address_pools,
        ),
        backend_http_settings_collection: merge_by_name(
            "backend http settings",
            retained.backend_http_settings_collection,
            fresh.backend_http_settings_collection,
        ),
        frontend_ip_configurations: merge_by_name(
            "frontend ip configuration",
            retained.frontend_ip_configurations,
            fresh.frontend_ip_configurations,
        ),
        frontend_ports: merge_by_name("frontend port", retained.frontend_ports, fresh.frontend_ports),
        http_listeners: merge_by_name("listener", retained.http_listeners, fresh.http_listeners),
        probes: merge_by_name("probe", retained.probes, fresh.probes),
        redirect_configurations: merge_by_name(
            "redirect configuration",
            retained.redirect_configurations,
            fresh.redirect_configurations,
        ),
        request_routing_rules,
        ssl_certificates: merge_by_name(
            "ssl certificate",
            retained.ssl_certificates,
            fresh.ssl_certificates,
        ),
        url_path_maps,
        rewrite_rule_sets: merge_by_name(
            "rewrite rule set",
            retained.rewrite_rule_sets,
            fresh.rewrite_rule_sets,
        ),
        load_distribution_policies: merge_by_name(
            "load distribution policy",
            retained.load_distribution_policies,
            fresh.load_distribution_policies,
        ),
        trusted_root_certificates: merge_by_name(
            "trusted root certificate",
            retained.trusted_root_certificates,
            fresh.trusted_root_certificates,
        ),
    }
}
