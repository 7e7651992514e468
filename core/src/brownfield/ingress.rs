use crate::brownfield::targets::Target;
use crate::kubernetes::ingress::{default_backend, host, http_paths, path, rules};
use k8s_openapi::api::networking::v1::{HTTPIngressRuleValue, Ingress, IngressRule};
use tracing::debug;

/// Removes the paths of `ingress` that point at prohibited targets.
///
/// Rules without an `http` block route nothing and are dropped. Returns `None` when nothing
/// routable remains: no rule keeps a path and the ingress has no default backend.
pub fn prune_ingress(ingress: &Ingress, prohibited: &[Target]) -> Option<Ingress> {
    let original = rules(ingress);
    if original.is_empty() {
        return Some(ingress.clone());
    }

    let kept: Vec<IngressRule> = original
        .iter()
        .filter_map(|rule| prune_rule(rule, prohibited))
        .collect();

    if kept.is_empty() && default_backend(ingress).is_none() {
        return None;
    }

    let mut pruned = ingress.clone();
    if let Some(spec) = pruned.spec.as_mut() {
        spec.rules = Some(kept);
    }
    Some(pruned)
}

fn prune_rule(rule: &IngressRule, prohibited: &[Target]) -> Option<IngressRule> {
    let rule_host = host(rule);
    let paths: Vec<_> = http_paths(rule)?
        .iter()
        .filter(|candidate| {
            let target = Target::new(rule_host, 0, Some(path(candidate)));
            let blocked = prohibited.iter().any(|p| p.covers(&target));
            if blocked {
                debug!("Dropping path {target} of a prohibited target");
            }
            !blocked
        })
        .cloned()
        .collect();

    if paths.is_empty() {
        return None;
    }

    Some(IngressRule {
        host: rule.host.clone(),
        http: Some(HTTPIngressRuleValue { paths }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, IngressBackend, IngressServiceBackend, IngressSpec, ServiceBackendPort,
    };

    fn backend() -> IngressBackend {
        IngressBackend {
            service: Some(IngressServiceBackend {
                name: "web".to_string(),
                port: Some(ServiceBackendPort {
                    number: Some(80),
                    ..ServiceBackendPort::default()
                }),
            }),
            ..IngressBackend::default()
        }
    }

    fn rule(host: &str, paths: &[&str]) -> IngressRule {
        IngressRule {
            host: Some(host.to_string()),
            http: Some(HTTPIngressRuleValue {
                paths: paths
                    .iter()
                    .map(|p| HTTPIngressPath {
                        path: Some((*p).to_string()),
                        path_type: "Prefix".to_string(),
                        backend: backend(),
                    })
                    .collect(),
            }),
        }
    }

    fn ingress(rules: Vec<IngressRule>, default: Option<IngressBackend>) -> Ingress {
        Ingress {
            spec: Some(IngressSpec {
                rules: Some(rules),
                default_backend: default,
                ..IngressSpec::default()
            }),
            ..Ingress::default()
        }
    }

    fn kept_paths(ingress: &Ingress) -> Vec<(String, String)> {
        rules(ingress)
            .iter()
            .flat_map(|rule| {
                http_paths(rule)
                    .unwrap_or_default()
                    .iter()
                    .map(|p| (host(rule).to_string(), path(p).to_string()))
            })
            .collect()
    }

    #[test]
    fn test_prohibited_host_drops_its_rules() {
        let original = ingress(vec![rule("bye.com", &["/"]), rule("foo.baz", &["/a"])], None);
        let pruned = prune_ingress(&original, &[Target::new("bye.com", 0, None)]);

        let pruned = pruned.map(|i| kept_paths(&i));
        assert_eq!(
            pruned,
            Some(vec![("foo.baz".to_string(), "/a".to_string())])
        );
    }

    #[test]
    fn test_prohibited_path_drops_only_that_path() {
        let original = ingress(vec![rule("bye.com", &["/a/b", "/c"])], None);
        let pruned = prune_ingress(&original, &[Target::new("bye.com", 0, Some("/a/*"))]);

        let pruned = pruned.map(|i| kept_paths(&i));
        assert_eq!(
            pruned,
            Some(vec![("bye.com".to_string(), "/c".to_string())])
        );
    }

    #[test]
    fn test_fully_prohibited_ingress_is_dropped() {
        let original = ingress(vec![rule("bye.com", &["/"])], None);
        assert_eq!(prune_ingress(&original, &[Target::new("bye.com", 0, None)]), None);
    }

    #[test]
    fn test_default_backend_keeps_ingress_alive() {
        let original = ingress(vec![rule("bye.com", &["/"])], Some(backend()));
        let pruned = prune_ingress(&original, &[Target::new("bye.com", 0, None)]);

        assert!(pruned.is_some_and(|i| rules(&i).is_empty() && default_backend(&i).is_some()));
    }
}
