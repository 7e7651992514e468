//! Stable names for everything the compiler emits.
//!
//! Names only ever depend on the values passed in, never on the order ingresses or rules were
//! visited, so rebuilding the same snapshot always yields the same names.

use crate::appgw::Protocol;
use crate::builder::backends::ServicePortRef;
use crate::builder::listeners::ListenerId;
use crate::kubernetes::{ObjectKey, SecretId, ServiceId};
use crate::net::Port;

pub const DEFAULT_BACKEND_ADDRESS_POOL_NAME: &str = "defaultaddresspool";
pub const DEFAULT_BACKEND_HTTP_SETTINGS_NAME: &str = "defaulthttpsetting";
pub const DEFAULT_PROBE_PREFIX: &str = "defaultprobe-";
pub const PATH_RULE_PREFIX: &str = "pr-";
pub const REWRITE_RULE_SET_PREFIX: &str = "crd-";

/// Prefixes of every name the compiler stamps on a resource.
pub const MANAGED_NAME_PREFIXES: [&str; 13] = [
    "pool-",
    "bp-",
    "pb-",
    "fp-",
    "fl-",
    "rr-",
    "url-",
    "sslr-",
    PATH_RULE_PREFIX,
    DEFAULT_PROBE_PREFIX,
    DEFAULT_BACKEND_ADDRESS_POOL_NAME,
    DEFAULT_BACKEND_HTTP_SETTINGS_NAME,
    REWRITE_RULE_SET_PREFIX,
];

/// Longest name the gateway accepts.
pub const MAX_NAME_LENGTH: usize = 80;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Keeps names within [`MAX_NAME_LENGTH`], replacing the tail of long ones with a hash of the full name.
pub fn format_prop_name(name: String) -> String {
    if name.len() <= MAX_NAME_LENGTH {
        return name;
    }

    let hash = fnv1a32(name.as_bytes());
    // 9 characters for "-" plus eight hex digits
    let mut cut = MAX_NAME_LENGTH - 9;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}-{hash:08x}", &name[..cut])
}

pub fn is_managed_name(name: &str) -> bool {
    MANAGED_NAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

pub fn default_probe_name(protocol: Protocol) -> String {
    format!("{DEFAULT_PROBE_PREFIX}{protocol}")
}

pub fn backend_pool_name(service: &ServiceId, port: &ServicePortRef, backend_port: Port) -> String {
    format_prop_name(format!(
        "pool-{}-{port}-bp-{backend_port}",
        service.full_name()
    ))
}

pub fn http_settings_name(
    service: &ServiceId,
    port: &ServicePortRef,
    backend_port: Port,
    ingress: &str,
) -> String {
    format_prop_name(format!(
        "bp-{}-{port}-{backend_port}-{ingress}",
        service.full_name()
    ))
}

pub fn probe_name(service: &str, port: &ServicePortRef, ingress: &str) -> String {
    format_prop_name(format!("pb-{service}-{port}-{ingress}"))
}

pub fn frontend_port_name(port: Port) -> String {
    format!("fp-{port}")
}

/// Eight lowercase hex digits identifying a listener.
pub fn listener_hash(listener: &ListenerId) -> String {
    let mut canonical = String::new();
    for index in 0..ListenerId::MAX_HOST_NAMES {
        let host = listener
            .host_names()
            .get(index)
            .map_or("", String::as_str);
        canonical.push_str(host);
        canonical.push('|');
    }
    canonical.push_str(&format!(
        "{}|{}",
        listener.frontend_port(),
        listener.use_private_ip()
    ));

    format!("{:08x}", fnv1a32(canonical.as_bytes()))
}

pub fn listener_name(listener: &ListenerId) -> String {
    format!("fl-{}", listener_hash(listener))
}

pub fn routing_rule_name(listener: &ListenerId) -> String {
    format!("rr-{}", listener_hash(listener))
}

/// `url-<port>`, or `url-<port>-<hash>` when several path maps land on the same port.
pub fn url_path_map_name(listener: &ListenerId, shares_port: bool) -> String {
    if shares_port {
        format!("url-{}-{}", listener.frontend_port(), listener_hash(listener))
    } else {
        format!("url-{}", listener.frontend_port())
    }
}

pub fn ssl_redirect_name(https_listener: &ListenerId) -> String {
    format!("sslr-{}", listener_name(https_listener))
}

pub fn path_rule_name(ingress: &ObjectKey, index: usize) -> String {
    format_prop_name(format!(
        "{PATH_RULE_PREFIX}{}-{}-{index}",
        ingress.namespace(),
        ingress.name()
    ))
}

pub fn rewrite_rule_set_name(rewrite: &ObjectKey) -> String {
    format_prop_name(format!("{REWRITE_RULE_SET_PREFIX}{}", rewrite.full_name()))
}

pub fn load_distribution_policy_name(policy: &ObjectKey) -> String {
    format_prop_name(policy.full_name())
}

pub fn ssl_certificate_name(secret: &SecretId) -> String {
    format_prop_name(secret.full_name())
}

pub fn trusted_root_certificate_name(ingress: &ObjectKey) -> String {
    format_prop_name(format!("trc-{}", ingress.full_name()))
}
