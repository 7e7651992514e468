//! Typed readers for the `appgw.ingress.kubernetes.io/*` ingress annotations.
//!
//! Every reader returns [`AnnotationError::Missing`] when the key is absent, so callers can tell a
//! defaulted value from a malformed one.

use crate::appgw::Protocol;
use crate::net::Port;
use itertools::Itertools;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

pub const BACKEND_PATH_PREFIX_KEY: &str = "appgw.ingress.kubernetes.io/backend-path-prefix";
pub const BACKEND_HOSTNAME_KEY: &str = "appgw.ingress.kubernetes.io/backend-hostname";
pub const BACKEND_PROTOCOL_KEY: &str = "appgw.ingress.kubernetes.io/backend-protocol";
pub const COOKIE_BASED_AFFINITY_KEY: &str = "appgw.ingress.kubernetes.io/cookie-based-affinity";
pub const REQUEST_TIMEOUT_KEY: &str = "appgw.ingress.kubernetes.io/request-timeout";
pub const CONNECTION_DRAINING_KEY: &str = "appgw.ingress.kubernetes.io/connection-draining";
pub const CONNECTION_DRAINING_TIMEOUT_KEY: &str =
    "appgw.ingress.kubernetes.io/connection-draining-timeout";
pub const SSL_REDIRECT_KEY: &str = "appgw.ingress.kubernetes.io/ssl-redirect";
pub const USE_PRIVATE_IP_KEY: &str = "appgw.ingress.kubernetes.io/use-private-ip";
pub const OVERRIDE_FRONTEND_PORT_KEY: &str = "appgw.ingress.kubernetes.io/override-frontend-port";
pub const HOSTNAME_EXTENSION_KEY: &str = "appgw.ingress.kubernetes.io/hostname-extension";
pub const APPGW_SSL_CERTIFICATE_KEY: &str = "appgw.ingress.kubernetes.io/appgw-ssl-certificate";
pub const APPGW_TRUSTED_ROOT_CERTIFICATE_KEY: &str =
    "appgw.ingress.kubernetes.io/appgw-trusted-root-certificate";
pub const BACKEND_TRUSTED_ROOT_CERTIFICATE_KEY: &str =
    "appgw.ingress.kubernetes.io/backend-trusted-root-certificate";
pub const REWRITE_RULE_SET_CUSTOM_RESOURCE_KEY: &str =
    "appgw.ingress.kubernetes.io/rewrite-rule-set-custom-resource";
pub const WAF_POLICY_FOR_PATH_KEY: &str = "appgw.ingress.kubernetes.io/waf-policy-for-path";
pub const FIREWALL_POLICY_KEY: &str = "appgw.ingress.kubernetes.io/firewall-policy";
pub const HEALTH_PROBE_HOSTNAME_KEY: &str = "appgw.ingress.kubernetes.io/health-probe-hostname";
pub const HEALTH_PROBE_PORT_KEY: &str = "appgw.ingress.kubernetes.io/health-probe-port";
pub const HEALTH_PROBE_PATH_KEY: &str = "appgw.ingress.kubernetes.io/health-probe-path";
pub const HEALTH_PROBE_STATUS_CODES_KEY: &str =
    "appgw.ingress.kubernetes.io/health-probe-status-codes";
pub const HEALTH_PROBE_INTERVAL_KEY: &str = "appgw.ingress.kubernetes.io/health-probe-interval";
pub const HEALTH_PROBE_TIMEOUT_KEY: &str = "appgw.ingress.kubernetes.io/health-probe-timeout";
pub const HEALTH_PROBE_UNHEALTHY_THRESHOLD_KEY: &str =
    "appgw.ingress.kubernetes.io/health-probe-unhealthy-threshold";

pub const DEFAULT_CONNECTION_DRAINING_TIMEOUT: i32 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("the annotation {0} is missing")]
    Missing(String),
    #[error("the annotation {name} does not contain a valid value ({value})")]
    InvalidContent { name: String, value: String },
}

impl AnnotationError {
    pub fn is_missing(&self) -> bool {
        matches!(self, AnnotationError::Missing(_))
    }
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// The annotations of one ingress.
#[derive(Debug, Clone, Copy)]
pub struct Annotations<'a> {
    values: &'a BTreeMap<String, String>,
}

impl<'a> Annotations<'a> {
    pub fn of(ingress: &'a Ingress) -> Self {
        Self::new(ingress.annotations())
    }

    pub fn new(values: &'a BTreeMap<String, String>) -> Self {
        Self { values }
    }

    fn raw(&self, name: &str) -> AnnotationResult<&'a str> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AnnotationError::Missing(name.to_string()))
    }

    fn parse<T: FromStr>(&self, name: &str) -> AnnotationResult<T> {
        let value = self.raw(name)?;
        value
            .trim()
            .parse()
            .map_err(|_| invalid_content(name, value))
    }

    fn parse_bool(&self, name: &str) -> AnnotationResult<bool> {
        let value = self.raw(name)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(invalid_content(name, value)),
        }
    }

    fn parse_non_empty(&self, name: &str) -> AnnotationResult<&'a str> {
        let value = self.raw(name)?;
        if value.trim().is_empty() {
            Err(invalid_content(name, value))
        } else {
            Ok(value.trim())
        }
    }

    fn parse_list(&self, name: &str) -> AnnotationResult<Vec<&'a str>> {
        Ok(self
            .raw(name)?
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .unique()
            .collect())
    }

    pub fn is_ssl_redirect(&self) -> AnnotationResult<bool> {
        self.parse_bool(SSL_REDIRECT_KEY)
    }

    pub fn backend_path_prefix(&self) -> AnnotationResult<&'a str> {
        self.raw(BACKEND_PATH_PREFIX_KEY)
    }

    pub fn backend_hostname(&self) -> AnnotationResult<&'a str> {
        self.parse_non_empty(BACKEND_HOSTNAME_KEY)
    }

    pub fn backend_protocol(&self) -> AnnotationResult<Protocol> {
        self.parse(BACKEND_PROTOCOL_KEY)
    }

    pub fn is_cookie_based_affinity(&self) -> AnnotationResult<bool> {
        self.parse_bool(COOKIE_BASED_AFFINITY_KEY)
    }

    pub fn request_timeout(&self) -> AnnotationResult<i32> {
        self.parse_positive(REQUEST_TIMEOUT_KEY)
    }

    pub fn is_connection_draining(&self) -> AnnotationResult<bool> {
        self.parse_bool(CONNECTION_DRAINING_KEY)
    }

    pub fn connection_draining_timeout(&self) -> AnnotationResult<i32> {
        self.parse_positive(CONNECTION_DRAINING_TIMEOUT_KEY)
    }

    pub fn use_private_ip(&self) -> AnnotationResult<bool> {
        self.parse_bool(USE_PRIVATE_IP_KEY)
    }

    pub fn override_frontend_port(&self) -> AnnotationResult<Port> {
        self.parse(OVERRIDE_FRONTEND_PORT_KEY)
    }

    pub fn hostname_extensions(&self) -> AnnotationResult<Vec<&'a str>> {
        self.parse_list(HOSTNAME_EXTENSION_KEY)
    }

    pub fn appgw_ssl_certificate(&self) -> AnnotationResult<&'a str> {
        self.parse_non_empty(APPGW_SSL_CERTIFICATE_KEY)
    }

    pub fn appgw_trusted_root_certificates(&self) -> AnnotationResult<Vec<&'a str>> {
        self.parse_list(APPGW_TRUSTED_ROOT_CERTIFICATE_KEY)
    }

    pub fn backend_trusted_root_certificate(&self) -> AnnotationResult<&'a str> {
        self.parse_non_empty(BACKEND_TRUSTED_ROOT_CERTIFICATE_KEY)
    }

    pub fn rewrite_rule_set_custom_resource(&self) -> AnnotationResult<&'a str> {
        self.parse_non_empty(REWRITE_RULE_SET_CUSTOM_RESOURCE_KEY)
    }

    /// Firewall policy id for path rules; `waf-policy-for-path` wins over `firewall-policy`.
    pub fn firewall_policy(&self) -> AnnotationResult<&'a str> {
        match self.parse_non_empty(WAF_POLICY_FOR_PATH_KEY) {
            Err(err) if err.is_missing() => self.parse_non_empty(FIREWALL_POLICY_KEY),
            result => result,
        }
    }

    pub fn health_probe_hostname(&self) -> AnnotationResult<&'a str> {
        self.parse_non_empty(HEALTH_PROBE_HOSTNAME_KEY)
    }

    pub fn health_probe_port(&self) -> AnnotationResult<Port> {
        self.parse(HEALTH_PROBE_PORT_KEY)
    }

    pub fn health_probe_path(&self) -> AnnotationResult<&'a str> {
        let path = self.parse_non_empty(HEALTH_PROBE_PATH_KEY)?;
        if path.starts_with('/') {
            Ok(path)
        } else {
            Err(invalid_content(HEALTH_PROBE_PATH_KEY, path))
        }
    }

    /// Accepts single codes and `low-high` ranges, e.g. `200-399, 401`.
    pub fn health_probe_status_codes(&self) -> AnnotationResult<Vec<&'a str>> {
        let codes = self.parse_list(HEALTH_PROBE_STATUS_CODES_KEY)?;
        let valid = !codes.is_empty() && codes.iter().all(|code| is_status_code_range(code));

        if valid {
            Ok(codes)
        } else {
            Err(invalid_content(
                HEALTH_PROBE_STATUS_CODES_KEY,
                self.raw(HEALTH_PROBE_STATUS_CODES_KEY)?,
            ))
        }
    }

    pub fn health_probe_interval(&self) -> AnnotationResult<i32> {
        self.parse_positive(HEALTH_PROBE_INTERVAL_KEY)
    }

    pub fn health_probe_timeout(&self) -> AnnotationResult<i32> {
        self.parse_positive(HEALTH_PROBE_TIMEOUT_KEY)
    }

    pub fn health_probe_unhealthy_threshold(&self) -> AnnotationResult<i32> {
        self.parse_positive(HEALTH_PROBE_UNHEALTHY_THRESHOLD_KEY)
    }

    fn parse_positive(&self, name: &str) -> AnnotationResult<i32> {
        let value: i32 = self.parse(name)?;
        if value > 0 {
            Ok(value)
        } else {
            Err(invalid_content(name, &value.to_string()))
        }
    }
}

fn is_status_code_range(code: &str) -> bool {
    let is_status = |part: &str| part.parse::<u16>().is_ok_and(|c| (100..=599).contains(&c));
    match code.split_once('-') {
        Some((low, high)) => is_status(low) && is_status(high),
        None => is_status(code),
    }
}

fn invalid_content(name: &str, value: &str) -> AnnotationError {
    AnnotationError::InvalidContent {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::{assert_err, assert_ok};
    use rstest::rstest;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[rstest]
    #[case("true", Ok(true))]
    #[case("True", Ok(true))]
    #[case("false", Ok(false))]
    #[case("yes", Err(()))]
    fn test_ssl_redirect(#[case] value: &str, #[case] expected: Result<bool, ()>) {
        let values = annotations(&[(SSL_REDIRECT_KEY, value)]);
        let result = Annotations::new(&values).is_ssl_redirect().map_err(|_| ());
        assert_eq!(result, expected);
    }

    #[test]
    fn test_missing_annotation_is_distinguishable() {
        let values = BTreeMap::new();
        let err = assert_err!(Annotations::new(&values).request_timeout());
        assert!(err.is_missing());
    }

    #[test]
    fn test_invalid_content_message() {
        let values = annotations(&[(REQUEST_TIMEOUT_KEY, "soon")]);
        let err = assert_err!(Annotations::new(&values).request_timeout());

        assert!(!err.is_missing());
        assert_eq!(
            err.to_string(),
            "the annotation appgw.ingress.kubernetes.io/request-timeout does not contain a valid value (soon)"
        );
    }

    #[rstest]
    #[case("HTTPS", Protocol::Https)]
    #[case("http", Protocol::Http)]
    fn test_backend_protocol(#[case] value: &str, #[case] expected: Protocol) {
        let values = annotations(&[(BACKEND_PROTOCOL_KEY, value)]);
        assert_eq!(assert_ok!(Annotations::new(&values).backend_protocol()), expected);
    }

    #[test]
    fn test_lists_are_trimmed_and_unique() {
        let values = annotations(&[(HOSTNAME_EXTENSION_KEY, "a.com, b.com,,a.com ")]);
        assert_eq!(
            assert_ok!(Annotations::new(&values).hostname_extensions()),
            vec!["a.com", "b.com"]
        );
    }

    #[test]
    fn test_firewall_policy_prefers_waf_key() {
        let values = annotations(&[
            (FIREWALL_POLICY_KEY, "/policies/fallback"),
            (WAF_POLICY_FOR_PATH_KEY, "/policies/waf"),
        ]);
        assert_eq!(
            assert_ok!(Annotations::new(&values).firewall_policy()),
            "/policies/waf"
        );

        let values = annotations(&[(FIREWALL_POLICY_KEY, "/policies/fallback")]);
        assert_eq!(
            assert_ok!(Annotations::new(&values).firewall_policy()),
            "/policies/fallback"
        );
    }

    #[rstest]
    #[case("200-399", true)]
    #[case("200, 401", true)]
    #[case("200-399,404", true)]
    #[case("abc", false)]
    #[case("200-", false)]
    #[case("99", false)]
    fn test_health_probe_status_codes(#[case] value: &str, #[case] valid: bool) {
        let values = annotations(&[(HEALTH_PROBE_STATUS_CODES_KEY, value)]);
        assert_eq!(
            Annotations::new(&values).health_probe_status_codes().is_ok(),
            valid
        );
    }

    #[rstest]
    #[case("0")]
    #[case("-5")]
    fn test_timeouts_must_be_positive(#[case] value: &str) {
        let values = annotations(&[(CONNECTION_DRAINING_TIMEOUT_KEY, value)]);
        assert_err!(Annotations::new(&values).connection_draining_timeout());
    }
}
