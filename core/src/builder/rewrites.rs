use crate::annotations::Annotations;
use crate::appgw::{
    HeaderConfiguration, RewriteActionSet, RewriteCondition, RewriteRule, RewriteRuleSet,
    RewriteRuleSetProperties, UrlConfiguration,
};
use crate::builder::ConfigBuilder;
use crate::builder::names::{REWRITE_RULE_SET_PREFIX, rewrite_rule_set_name};
use crate::events::EventReason;
use crate::kubernetes::ObjectKey;
use agic_api::v1beta1;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

const DELETE_HEADER_ACTION: &str = "delete";

/// Rewrite rule sets and the set each ingress rewrites with.
#[derive(Debug, Default)]
pub struct Rewrites {
    sets: BTreeMap<String, RewriteRuleSet>,
    by_ingress: BTreeMap<ObjectKey, String>,
}

impl Rewrites {
    pub fn sets(&self) -> impl Iterator<Item = &RewriteRuleSet> {
        self.sets.values()
    }

    pub fn set_for(&self, ingress: &ObjectKey) -> Option<&RewriteRuleSet> {
        self.by_ingress
            .get(ingress)
            .and_then(|name| self.sets.get(name))
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn rewrites(&self) -> &Rewrites {
        self.memo.rewrites.get_or_init(|| self.build_rewrites())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_rewrites")]
    fn build_rewrites(&self) -> Rewrites {
        let mut rewrites = Rewrites::default();

        for (key, ingress) in &self.ingresses {
            let annotations = Annotations::of(ingress);
            let Some(crd_name) = self.annotation(key, annotations.rewrite_rule_set_custom_resource())
            else {
                continue;
            };

            let crd_key = key.sibling(crd_name);
            let Some(rewrite) = self.snapshot.rewrite(&crd_key) else {
                self.emit(
                    key,
                    EventReason::RewriteRuleSetNotFound,
                    format!("Unable to find rewrite rule set custom resource {crd_key}"),
                );
                continue;
            };

            let name = rewrite_rule_set_name(&crd_key);
            if !rewrites.sets.contains_key(&name) {
                debug!("Created rewrite rule set {name} from {crd_key}");
                let properties = RewriteRuleSetProperties {
                    rewrite_rules: rewrite.spec.rewrite_rules.iter().map(rewrite_rule).collect(),
                };
                rewrites.sets.insert(
                    name.clone(),
                    RewriteRuleSet::new(&name, self.identifier.rewrite_rule_set_id(&name), properties),
                );
            }
            rewrites.by_ingress.insert(key.clone(), name);
        }

        // rule sets authored on the gateway itself are kept as they are
        for set in &self.existing.properties.rewrite_rule_sets {
            if !set.name().starts_with(REWRITE_RULE_SET_PREFIX) {
                rewrites
                    .sets
                    .entry(set.name().clone())
                    .or_insert_with(|| set.clone());
            }
        }

        rewrites
    }
}

fn rewrite_rule(rule: &v1beta1::RewriteRule) -> RewriteRule {
    RewriteRule {
        name: rule.name.clone(),
        rule_sequence: rule.rule_sequence,
        conditions: rule
            .conditions
            .iter()
            .map(|condition| RewriteCondition {
                variable: condition.variable.clone(),
                pattern: condition.pattern.clone(),
                ignore_case: condition.ignore_case,
                negate: condition.negate,
            })
            .collect(),
        action_set: RewriteActionSet {
            request_header_configurations: header_configurations(
                &rule.actions.request_header_configurations,
            ),
            response_header_configurations: header_configurations(
                &rule.actions.response_header_configurations,
            ),
            url_configuration: rule.actions.url_configuration.as_ref().map(|url| UrlConfiguration {
                modified_path: url.modified_path.clone(),
                modified_query_string: url.modified_query_string.clone(),
                reroute: url.reroute,
            }),
        },
    }
}

fn header_configurations(headers: &[v1beta1::HeaderConfiguration]) -> Vec<HeaderConfiguration> {
    headers
        .iter()
        .map(|header| HeaderConfiguration {
            header_name: header.header_name.clone(),
            header_value: if header.action_type.eq_ignore_ascii_case(DELETE_HEADER_ACTION) {
                String::new()
            } else {
                header.header_value.clone()
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::assert_ok;

    const RULE: &str = r"
name: strip-server
ruleSequence: 100
conditions:
  - variable: http_req_Host
    pattern: contoso.com
    ignoreCase: true
actions:
  requestHeaderConfigurations:
    - actionType: set
      headerName: X-Forwarded-For
      headerValue: '{var_client_ip}'
  responseHeaderConfigurations:
    - actionType: delete
      headerName: Server
      headerValue: nginx
  urlConfiguration:
    modifiedPath: /new
    reroute: true
";

    #[test]
    fn test_rewrite_rule_is_copied() {
        let rule: v1beta1::RewriteRule = assert_ok!(serde_yaml::from_str(RULE));
        let translated = rewrite_rule(&rule);

        assert_eq!(translated.name, "strip-server");
        assert_eq!(translated.rule_sequence, 100);
        assert_eq!(translated.conditions.len(), 1);
        assert!(translated.conditions[0].ignore_case);
        assert_eq!(
            translated.action_set.request_header_configurations[0].header_value,
            "{var_client_ip}"
        );
        assert_eq!(
            translated.action_set.url_configuration,
            Some(UrlConfiguration {
                modified_path: Some("/new".to_string()),
                modified_query_string: None,
                reroute: true,
            })
        );
    }

    #[test]
    fn test_delete_action_clears_header_value() {
        let rule: v1beta1::RewriteRule = assert_ok!(serde_yaml::from_str(RULE));
        let translated = rewrite_rule(&rule);

        let header = &translated.action_set.response_header_configurations[0];
        assert_eq!(header.header_name, "Server");
        assert!(header.header_value.is_empty());
    }
}
