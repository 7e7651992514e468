use crate::appgw::{SubResource, UrlPathMap};
use crate::builder::BuildError;

/// What a path map or path rule sends its traffic to.
fn disposition(
    pool: Option<&SubResource>,
    settings: Option<&SubResource>,
    redirect: Option<&SubResource>,
) -> (bool, bool) {
    (pool.is_some() && settings.is_some(), redirect.is_some())
}

/// Every path map, and every path rule in it, must either forward to a pool with settings or redirect; never both.
pub fn validate_url_path_maps(maps: &[UrlPathMap]) -> Result<(), BuildError> {
    for map in maps {
        let properties = map.properties();
        match disposition(
            properties.default_backend_address_pool.as_ref(),
            properties.default_backend_http_settings.as_ref(),
            properties.default_redirect_configuration.as_ref(),
        ) {
            (false, false) => return Err(BuildError::NoDefaults(map.name().clone())),
            (true, true) => return Err(BuildError::EitherDefaults(map.name().clone())),
            _ => {}
        }

        for rule in &properties.path_rules {
            let rule_properties = rule.properties();
            match disposition(
                rule_properties.backend_address_pool.as_ref(),
                rule_properties.backend_http_settings.as_ref(),
                rule_properties.redirect_configuration.as_ref(),
            ) {
                (false, false) => {
                    return Err(BuildError::NoBackendOrRedirect(rule.name().clone()));
                }
                (true, true) => {
                    return Err(BuildError::EitherBackendOrRedirect(rule.name().clone()));
                }
                _ => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appgw::{PathRule, PathRuleProperties, UrlPathMapProperties};
    use assertables::{assert_err, assert_ok};
    use rstest::rstest;

    fn sub(id: &str) -> Option<SubResource> {
        Some(SubResource::new(id))
    }

    fn path_map(properties: UrlPathMapProperties) -> UrlPathMap {
        UrlPathMap::new("url-80", "url-80-id", properties)
    }

    fn backend_defaults() -> UrlPathMapProperties {
        UrlPathMapProperties {
            default_backend_address_pool: sub("pool"),
            default_backend_http_settings: sub("settings"),
            ..UrlPathMapProperties::default()
        }
    }

    #[rstest]
    #[case(None, None, None, Some(BuildError::NoDefaults("url-80".to_string())))]
    #[case(sub("pool"), None, None, Some(BuildError::NoDefaults("url-80".to_string())))]
    #[case(sub("pool"), sub("settings"), sub("sslr"), Some(BuildError::EitherDefaults("url-80".to_string())))]
    #[case(sub("pool"), sub("settings"), None, None)]
    #[case(None, None, sub("sslr"), None)]
    fn test_path_map_defaults(
        #[case] pool: Option<SubResource>,
        #[case] settings: Option<SubResource>,
        #[case] redirect: Option<SubResource>,
        #[case] expected: Option<BuildError>,
    ) {
        let map = path_map(UrlPathMapProperties {
            default_backend_address_pool: pool,
            default_backend_http_settings: settings,
            default_redirect_configuration: redirect,
            ..UrlPathMapProperties::default()
        });

        assert_eq!(validate_url_path_maps(&[map]).err(), expected);
    }

    #[test]
    fn test_path_rule_without_backend_or_redirect() {
        let mut properties = backend_defaults();
        properties.path_rules.push(PathRule::new(
            "pr-default-web-0",
            "pr-id",
            PathRuleProperties {
                paths: vec!["/api".to_string()],
                backend_address_pool: sub("pool"),
                ..PathRuleProperties::default()
            },
        ));

        let err = assert_err!(validate_url_path_maps(&[path_map(properties)]));
        assert_eq!(
            err,
            BuildError::NoBackendOrRedirect("pr-default-web-0".to_string())
        );
    }

    #[test]
    fn test_path_rule_with_backend_and_redirect() {
        let mut properties = backend_defaults();
        properties.path_rules.push(PathRule::new(
            "pr-default-web-0",
            "pr-id",
            PathRuleProperties {
                paths: vec!["/api".to_string()],
                backend_address_pool: sub("pool"),
                backend_http_settings: sub("settings"),
                redirect_configuration: sub("sslr"),
                ..PathRuleProperties::default()
            },
        ));

        let err = assert_err!(validate_url_path_maps(&[path_map(properties)]));
        assert_eq!(
            err,
            BuildError::EitherBackendOrRedirect("pr-default-web-0".to_string())
        );
    }

    #[test]
    fn test_valid_path_map() {
        let mut properties = backend_defaults();
        properties.path_rules.push(PathRule::new(
            "pr-default-web-0",
            "pr-id",
            PathRuleProperties {
                paths: vec!["/api".to_string()],
                redirect_configuration: sub("sslr"),
                ..PathRuleProperties::default()
            },
        ));

        assert_ok!(validate_url_path_maps(&[path_map(properties)]));
    }
}
