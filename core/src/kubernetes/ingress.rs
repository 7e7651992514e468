//! Accessors that flatten the optional layers of the networking/v1 `Ingress` types.

use agic_api::constants::{DEFAULT_INGRESS_CLASS_RESOURCE_NAME, INGRESS_CLASS_ANNOTATION};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, Ingress, IngressBackend, IngressRule, IngressTLS,
};
use kube::ResourceExt;

pub fn is_ingress_for_class(ingress: &Ingress, class: &str) -> bool {
    if ingress
        .annotations()
        .get(INGRESS_CLASS_ANNOTATION)
        .is_some_and(|value| value == class)
    {
        return true;
    }

    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.as_deref())
        .is_some_and(|name| name == class || name == DEFAULT_INGRESS_CLASS_RESOURCE_NAME)
}

pub fn has_rules_or_default_backend(ingress: &Ingress) -> bool {
    !rules(ingress).is_empty() || default_backend(ingress).is_some()
}

pub fn rules(ingress: &Ingress) -> &[IngressRule] {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_deref())
        .unwrap_or_default()
}

pub fn default_backend(ingress: &Ingress) -> Option<&IngressBackend> {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.default_backend.as_ref())
}

pub fn tls(ingress: &Ingress) -> &[IngressTLS] {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_deref())
        .unwrap_or_default()
}

/// Paths of a rule, `None` for a rule without an `http` block.
pub fn http_paths(rule: &IngressRule) -> Option<&[HTTPIngressPath]> {
    rule.http.as_ref().map(|http| http.paths.as_slice())
}

pub fn host(rule: &IngressRule) -> &str {
    rule.host.as_deref().unwrap_or_default()
}

pub fn path(path: &HTTPIngressPath) -> &str {
    path.path.as_deref().unwrap_or_default()
}

/// `""`, `"/"` and `"/*"` all route the whole host.
pub fn is_root_path(path: &str) -> bool {
    matches!(path, "" | "/" | "/*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agic_api::constants::DEFAULT_INGRESS_CLASS;
    use k8s_openapi::api::networking::v1::IngressSpec;
    use rstest::rstest;

    #[rstest]
    #[case(Some("azure-application-gateway"), true)]
    #[case(Some("azure/application-gateway"), true)]
    #[case(Some("nginx"), false)]
    #[case(None, false)]
    fn test_ingress_class_name(#[case] class_name: Option<&str>, #[case] expected: bool) {
        let ingress = Ingress {
            spec: Some(IngressSpec {
                ingress_class_name: class_name.map(str::to_string),
                ..IngressSpec::default()
            }),
            ..Ingress::default()
        };

        assert_eq!(is_ingress_for_class(&ingress, DEFAULT_INGRESS_CLASS), expected);
    }

    #[rstest]
    #[case("", true)]
    #[case("/", true)]
    #[case("/*", true)]
    #[case("/api", false)]
    #[case("/api/*", false)]
    fn test_is_root_path(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_root_path(path), expected);
    }
}
