//! URL path maps and request routing rules.
//!
//! Every ingress rule is folded into a draft path map for each listener it binds to. Drafts that
//! end up without path rules become basic routing rules; the rest become path-based rules
//! referencing a URL path map.

use crate::annotations::Annotations;
use crate::appgw::{
    PathRule, PathRuleProperties, Protocol, RequestRoutingRule, RequestRoutingRuleProperties,
    RuleType, SubResource, UrlPathMap, UrlPathMapProperties, name_of,
};
use crate::builder::backends::{BackendSite, SiteBackend};
use crate::builder::listeners::{ListenerConfig, ListenerId};
use crate::builder::names::{
    DEFAULT_BACKEND_ADDRESS_POOL_NAME, DEFAULT_BACKEND_HTTP_SETTINGS_NAME, listener_name,
    path_rule_name, routing_rule_name, url_path_map_name,
};
use crate::builder::{BuildError, ConfigBuilder};
use crate::kubernetes::ObjectKey;
use crate::kubernetes::ingress::{default_backend, http_paths, is_root_path, path, rules};
use crate::net::Port;
use k8s_openapi::api::networking::v1::{HTTPIngressPath, Ingress};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, instrument};

/// Path maps and routing rules, ready to emit.
#[derive(Debug, Default)]
pub struct Routing {
    path_maps: BTreeMap<String, UrlPathMap>,
    rules: BTreeMap<String, RequestRoutingRule>,
}

impl Routing {
    pub fn path_maps(&self) -> impl Iterator<Item = &UrlPathMap> {
        self.path_maps.values()
    }

    pub fn rules(&self) -> impl Iterator<Item = &RequestRoutingRule> {
        self.rules.values()
    }
}

/// Pool, settings and policy ids a backend site routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BackendRefs {
    pool: String,
    settings: String,
    policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PathMapDraft {
    default_pool: Option<String>,
    default_settings: Option<String>,
    default_redirect: Option<String>,
    default_rewrite: Option<String>,
    default_policy: Option<String>,
    path_rules: Vec<(String, PathRuleProperties)>,
}

impl PathMapDraft {
    fn with_backend(refs: BackendRefs) -> Self {
        Self {
            default_pool: Some(refs.pool),
            default_settings: Some(refs.settings),
            default_policy: refs.policy,
            ..Self::default()
        }
    }

    /// Folds a draft of another rule sharing the listener into this one.
    fn merge(&mut self, other: PathMapDraft, defaults: &BackendRefs) {
        if other.default_redirect.is_some() {
            self.default_redirect = other.default_redirect;
            self.default_pool = None;
            self.default_settings = None;
            self.default_policy = None;
        } else if self.default_redirect.is_none() {
            if other.default_pool.as_ref().is_some_and(|pool| *pool != defaults.pool) {
                self.default_pool = other.default_pool;
            }
            if other
                .default_settings
                .as_ref()
                .is_some_and(|settings| *settings != defaults.settings)
            {
                self.default_settings = other.default_settings;
            }
            if other.default_policy.is_some() {
                self.default_policy = other.default_policy;
            }
        }
        if other.default_rewrite.is_some() {
            self.default_rewrite = other.default_rewrite;
        }

        let mut seen: BTreeSet<String> = self
            .path_rules
            .iter()
            .flat_map(|(_, rule)| rule.paths.iter().cloned())
            .collect();
        for (name, rule) in other.path_rules {
            if let Some(duplicate) = rule.paths.iter().find(|path| seen.contains(*path)) {
                error!("A path rule with path '{duplicate}' already exists; dropping path rule {name}");
                continue;
            }
            seen.extend(rule.paths.iter().cloned());
            self.path_rules.push((name, rule));
        }
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn routing(&self) -> Result<&Routing, BuildError> {
        self.memo.routing.get_or_try_init(|| self.build_routing())
    }

    fn default_backend_refs(&self) -> BackendRefs {
        BackendRefs {
            pool: self
                .identifier
                .address_pool_id(DEFAULT_BACKEND_ADDRESS_POOL_NAME),
            settings: self
                .identifier
                .http_settings_id(DEFAULT_BACKEND_HTTP_SETTINGS_NAME),
            policy: None,
        }
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_routing")]
    fn build_routing(&self) -> Result<Routing, BuildError> {
        let defaults = self.default_backend_refs();
        let mut drafts: BTreeMap<ListenerId, PathMapDraft> = BTreeMap::new();

        for (key, ingress) in &self.ingresses {
            for (id, draft) in self.ingress_drafts(key, ingress)? {
                drafts
                    .entry(id)
                    .or_insert_with(|| PathMapDraft::with_backend(defaults.clone()))
                    .merge(draft, &defaults);
            }
        }

        if drafts.is_empty() {
            drafts.insert(
                ListenerId::default_listener(self.configuration.use_private_ip()),
                PathMapDraft::with_backend(defaults),
            );
        }

        Ok(self.emit_routing(drafts))
    }

    /// Drafts contributed by one ingress, in rule order.
    fn ingress_drafts(
        &self,
        key: &ObjectKey,
        ingress: &Ingress,
    ) -> Result<Vec<(ListenerId, PathMapDraft)>, BuildError> {
        let annotations = Annotations::of(ingress);
        let rewrite = self.rewrites().set_for(key).map(|set| set.id().clone());

        if rules(ingress).is_empty() {
            let site = BackendSite::default_backend(key.clone());
            let Some(refs) = self.site_refs(&site)? else {
                return Ok(Vec::new());
            };
            return Ok(self
                .ingress_listeners(key, ingress)
                .into_iter()
                .map(|(id, _)| {
                    let mut draft = PathMapDraft::with_backend(refs.clone());
                    draft.default_rewrite.clone_from(&rewrite);
                    (id, draft)
                })
                .collect());
        }

        let ssl_redirect = self
            .annotation(key, annotations.is_ssl_redirect())
            .unwrap_or_default();
        let firewall_policy = self
            .annotation(key, annotations.firewall_policy())
            .map(str::to_string);

        let mut drafts = Vec::new();
        let mut index_base = 0;
        for (rule_index, rule) in rules(ingress).iter().enumerate() {
            let Some(paths) = http_paths(rule) else {
                continue;
            };

            for (id, config) in self.rule_listeners(key, ingress, rule) {
                let redirect = if ssl_redirect {
                    self.listener_redirect(&id, &config)
                } else {
                    None
                };

                let rule_draft = RuleDraft {
                    key,
                    ingress,
                    rule_index,
                    paths,
                    index_base,
                    redirect,
                    rewrite: rewrite.clone(),
                    firewall_policy: firewall_policy.clone(),
                };
                drafts.push((id, self.rule_draft(&rule_draft)?));
            }
            index_base += paths.len();
        }

        Ok(drafts)
    }

    /// The redirect an HTTP listener of an ssl-redirect ingress sends its traffic to.
    fn listener_redirect(&self, id: &ListenerId, config: &ListenerConfig) -> Option<String> {
        if config.protocol() != Protocol::Http {
            return None;
        }
        let name = config.redirect_to().as_deref()?;
        match self.redirects().redirect(name) {
            Some(redirect) => {
                debug!(
                    "Attaching redirect {name} to listener {}",
                    listener_name(id)
                );
                Some(redirect.id().clone())
            }
            None => {
                error!("Will not attach redirect to rule; SSL redirect {name} does not exist");
                None
            }
        }
    }

    fn rule_draft(&self, rule: &RuleDraft<'_>) -> Result<PathMapDraft, BuildError> {
        let mut draft = PathMapDraft {
            default_rewrite: rule.rewrite.clone(),
            ..PathMapDraft::default()
        };

        if let Some(redirect) = &rule.redirect {
            draft.default_redirect = Some(redirect.clone());
        } else {
            let root = rule
                .paths
                .iter()
                .enumerate()
                .filter(|(_, entry)| is_root_path(path(entry)))
                .map(|(index, _)| BackendSite::at_path(rule.key.clone(), rule.rule_index, index))
                .last();
            let site = root.or_else(|| {
                default_backend(rule.ingress).map(|_| BackendSite::default_backend(rule.key.clone()))
            });

            let refs = match site {
                Some(site) => self.site_refs(&site)?,
                None => None,
            }
            .unwrap_or_else(|| self.default_backend_refs());
            draft.default_pool = Some(refs.pool);
            draft.default_settings = Some(refs.settings);
            draft.default_policy = refs.policy;
        }

        for (path_index, entry) in rule.paths.iter().enumerate() {
            let entry_path = path(entry);
            if is_root_path(entry_path) {
                continue;
            }

            let name = path_rule_name(rule.key, rule.index_base + path_index);
            let mut properties = PathRuleProperties {
                paths: vec![entry_path.to_string()],
                rewrite_rule_set: rule.rewrite.clone().map(SubResource::new),
                firewall_policy: rule.firewall_policy.clone().map(SubResource::new),
                ..PathRuleProperties::default()
            };

            if let Some(redirect) = &rule.redirect {
                properties.redirect_configuration = Some(SubResource::new(redirect.clone()));
            } else {
                let site = BackendSite::at_path(rule.key.clone(), rule.rule_index, path_index);
                let Some(refs) = self.site_refs(&site)? else {
                    debug!("Path rule {name} has no backend; skipping it");
                    continue;
                };
                properties.backend_address_pool = Some(SubResource::new(refs.pool));
                properties.backend_http_settings = Some(SubResource::new(refs.settings));
                properties.load_distribution_policy = refs.policy.map(SubResource::new);
            }

            draft.path_rules.push((name, properties));
        }

        Ok(draft)
    }

    /// Ids a backend site routes to; `None` when the site is unknown.
    fn site_refs(&self, site: &BackendSite) -> Result<Option<BackendRefs>, BuildError> {
        let Some(backend) = self.backends().site(site) else {
            return Ok(None);
        };
        let Some(primary) = backend.primary() else {
            return Ok(Some(self.default_backend_refs()));
        };

        let pools = self.pools()?;
        let settings = self.settings()?;
        let policy = match backend {
            SiteBackend::Policy { .. } => self
                .load_distribution_policies()?
                .policy_for(site)
                .map(|policy| policy.id().clone()),
            _ => None,
        };

        Ok(Some(BackendRefs {
            pool: self.identifier.address_pool_id(pools.pool_name(primary)),
            settings: self
                .identifier
                .http_settings_id(settings.settings_name(primary)),
            policy,
        }))
    }

    fn emit_routing(&self, drafts: BTreeMap<ListenerId, PathMapDraft>) -> Routing {
        let listeners = self.listeners();
        let mut path_based_per_port: BTreeMap<Port, usize> = BTreeMap::new();
        for id in drafts
            .iter()
            .filter(|(id, draft)| !draft.path_rules.is_empty() && listeners.listener(id).is_some())
            .map(|(id, _)| id)
        {
            *path_based_per_port.entry(id.frontend_port()).or_default() += 1;
        }

        let mut routing = Routing::default();
        for (id, draft) in drafts {
            let rule_name = routing_rule_name(&id);
            let Some(listener) = listeners.listener(&id) else {
                error!(
                    "Routing rule {rule_name} will not be created; listener {} does not exist",
                    listener_name(&id)
                );
                continue;
            };

            let mut properties = RequestRoutingRuleProperties {
                http_listener: Some(SubResource::new(listener.id().clone())),
                ..RequestRoutingRuleProperties::default()
            };

            if draft.path_rules.is_empty() {
                properties.rule_type = RuleType::Basic;
                if let Some(redirect) = draft.default_redirect {
                    debug!("Bound basic rule {rule_name} to redirect {}", name_of(&redirect));
                    properties.redirect_configuration = Some(SubResource::new(redirect));
                } else {
                    properties.backend_address_pool = draft.default_pool.map(SubResource::new);
                    properties.backend_http_settings =
                        draft.default_settings.map(SubResource::new);
                    properties.load_distribution_policy =
                        draft.default_policy.map(SubResource::new);
                    debug!(
                        "Bound basic rule {rule_name} to listener {}",
                        listener.name()
                    );
                }
                properties.rewrite_rule_set = draft.default_rewrite.map(SubResource::new);
            } else {
                let shares_port = path_based_per_port
                    .get(&id.frontend_port())
                    .is_some_and(|count| *count > 1);
                let map_name = url_path_map_name(&id, shares_port);
                let path_map = self.path_map(&map_name, draft);
                debug!(
                    "Bound path-based rule {rule_name} to listener {} and url path map {map_name}",
                    listener.name()
                );

                properties.rule_type = RuleType::PathBasedRouting;
                properties.url_path_map = Some(SubResource::new(path_map.id().clone()));
                routing.path_maps.insert(map_name, path_map);
            }

            routing.rules.insert(
                rule_name.clone(),
                RequestRoutingRule::new(
                    &rule_name,
                    self.identifier.request_routing_rule_id(&rule_name),
                    properties,
                ),
            );
        }

        routing
    }

    fn path_map(&self, name: &str, draft: PathMapDraft) -> UrlPathMap {
        let path_rules = draft
            .path_rules
            .into_iter()
            .map(|(rule_name, properties)| {
                PathRule::new(
                    &rule_name,
                    self.identifier.path_rule_id(name, &rule_name),
                    properties,
                )
            })
            .collect();

        UrlPathMap::new(
            name,
            self.identifier.url_path_map_id(name),
            UrlPathMapProperties {
                default_backend_address_pool: draft.default_pool.map(SubResource::new),
                default_backend_http_settings: draft.default_settings.map(SubResource::new),
                default_redirect_configuration: draft.default_redirect.map(SubResource::new),
                default_rewrite_rule_set: draft.default_rewrite.map(SubResource::new),
                default_load_distribution_policy: draft.default_policy.map(SubResource::new),
                path_rules,
            },
        )
    }
}

/// One ingress rule, seen from one of its listeners.
struct RuleDraft<'r> {
    key: &'r ObjectKey,
    ingress: &'r Ingress,
    rule_index: usize,
    paths: &'r [HTTPIngressPath],
    /// Paths of the ingress declared before this rule.
    index_base: usize,
    redirect: Option<String>,
    rewrite: Option<String>,
    firewall_policy: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(pool: &str, settings: &str) -> BackendRefs {
        BackendRefs {
            pool: pool.to_string(),
            settings: settings.to_string(),
            policy: None,
        }
    }

    fn path_rule(name: &str, path: &str) -> (String, PathRuleProperties) {
        (
            name.to_string(),
            PathRuleProperties {
                paths: vec![path.to_string()],
                backend_address_pool: Some(SubResource::new("pool")),
                backend_http_settings: Some(SubResource::new("settings")),
                ..PathRuleProperties::default()
            },
        )
    }

    #[test]
    fn test_merge_keeps_first_path_rule_per_path() {
        let defaults = refs("default-pool", "default-settings");
        let mut draft = PathMapDraft::with_backend(defaults.clone());
        draft.path_rules.push(path_rule("pr-ns-a-0", "/api"));

        let mut other = PathMapDraft::with_backend(defaults.clone());
        other.path_rules.push(path_rule("pr-ns-b-0", "/api"));
        other.path_rules.push(path_rule("pr-ns-b-1", "/web"));
        draft.merge(other, &defaults);

        let names: Vec<_> = draft.path_rules.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["pr-ns-a-0", "pr-ns-b-1"]);
    }

    #[test]
    fn test_merge_default_backend_does_not_override_real_backend() {
        let defaults = refs("default-pool", "default-settings");
        let mut draft = PathMapDraft::with_backend(refs("pool-a", "bp-a"));
        draft.merge(PathMapDraft::with_backend(defaults.clone()), &defaults);

        assert_eq!(draft.default_pool.as_deref(), Some("pool-a"));
        assert_eq!(draft.default_settings.as_deref(), Some("bp-a"));

        draft.merge(PathMapDraft::with_backend(refs("pool-b", "bp-b")), &defaults);
        assert_eq!(draft.default_pool.as_deref(), Some("pool-b"));
    }

    #[test]
    fn test_merge_redirect_clears_backend_and_wins() {
        let defaults = refs("default-pool", "default-settings");
        let mut draft = PathMapDraft::with_backend(defaults.clone());
        draft.merge(
            PathMapDraft {
                default_redirect: Some("sslr".to_string()),
                ..PathMapDraft::default()
            },
            &defaults,
        );

        assert_eq!(draft.default_redirect.as_deref(), Some("sslr"));
        assert!(draft.default_pool.is_none());
        assert!(draft.default_settings.is_none());

        draft.merge(PathMapDraft::with_backend(refs("pool-b", "bp-b")), &defaults);
        assert_eq!(draft.default_redirect.as_deref(), Some("sslr"));
        assert!(draft.default_pool.is_none());
    }
}
