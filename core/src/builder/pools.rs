use crate::appgw::{BackendAddress, BackendAddressPool, BackendAddressPoolProperties};
use crate::builder::backends::{BackendId, PortPair, is_tcp};
use crate::builder::names::{DEFAULT_BACKEND_ADDRESS_POOL_NAME, backend_pool_name};
use crate::builder::{BuildError, ConfigBuilder};
use crate::events::EventReason;
use k8s_openapi::api::core::v1::{EndpointSubset, Endpoints};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use tracing::{debug, instrument, warn};

/// Backend address pools and the pool serving each backend.
#[derive(Debug, Default)]
pub struct Pools {
    pools: BTreeMap<String, BackendAddressPool>,
    by_backend: BTreeMap<BackendId, String>,
}

impl Pools {
    pub fn pools(&self) -> impl Iterator<Item = &BackendAddressPool> {
        self.pools.values()
    }

    /// Name of the pool serving the backend; the default pool when there is none of its own.
    pub fn pool_name(&self, backend: &BackendId) -> &str {
        self.by_backend
            .get(backend)
            .map_or(DEFAULT_BACKEND_ADDRESS_POOL_NAME, String::as_str)
    }
}

/// Orders IP addresses before host names, IPs numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortedAddress {
    Ip(IpAddr),
    Fqdn(String),
}

impl From<SortedAddress> for BackendAddress {
    fn from(address: SortedAddress) -> Self {
        match address {
            SortedAddress::Ip(ip) => BackendAddress::ip(ip.to_string()),
            SortedAddress::Fqdn(fqdn) => BackendAddress::fqdn(fqdn),
        }
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn pools(&self) -> Result<&Pools, BuildError> {
        self.memo.pools.get_or_try_init(|| self.build_pools())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_pools")]
    fn build_pools(&self) -> Result<Pools, BuildError> {
        let ports = self.backend_ports()?;
        let mut pools = Pools::default();
        pools.pools.insert(
            DEFAULT_BACKEND_ADDRESS_POOL_NAME.to_string(),
            self.pool(
                DEFAULT_BACKEND_ADDRESS_POOL_NAME,
                BackendAddressPoolProperties::default(),
            ),
        );

        for backend in self.backends().backends() {
            let Some(pair) = ports.resolved(backend) else {
                continue;
            };

            let Some(endpoints) = self.snapshot.endpoints(backend.service()) else {
                debug!(
                    "No endpoints for {}; {backend} uses the default pool",
                    backend.service()
                );
                continue;
            };

            let Some(subset) = matching_subset(endpoints, pair) else {
                self.emit(
                    backend.ingress(),
                    EventReason::BackendPortTargetMatch,
                    format!(
                        "Backend target port {} of service {} does not match any endpoint port",
                        pair.backend(),
                        backend.service()
                    ),
                );
                continue;
            };

            let name = backend_pool_name(backend.service(), backend.port(), pair.backend());
            if !pools.pools.contains_key(&name) {
                let properties = BackendAddressPoolProperties {
                    backend_addresses: addresses(subset),
                };
                pools.pools.insert(name.clone(), self.pool(&name, properties));
            }
            pools.by_backend.insert(backend.clone(), name);
        }

        Ok(pools)
    }

    fn pool(&self, name: &str, properties: BackendAddressPoolProperties) -> BackendAddressPool {
        BackendAddressPool::new(name, self.identifier.address_pool_id(name), properties)
    }
}

/// The first subset exposing the backend port over TCP.
fn matching_subset(endpoints: &Endpoints, pair: PortPair) -> Option<&EndpointSubset> {
    endpoints.subsets.iter().flatten().find(|subset| {
        subset.ports.iter().flatten().any(|port| {
            is_tcp(port.protocol.as_deref()) && i32::from(pair.backend().value()) == port.port
        })
    })
}

/// Ready addresses of the subset, without duplicates.
fn addresses(subset: &EndpointSubset) -> Vec<BackendAddress> {
    let mut sorted = BTreeSet::new();
    for address in subset.addresses.iter().flatten() {
        if !address.ip.is_empty() {
            match address.ip.parse::<IpAddr>() {
                Ok(ip) => {
                    sorted.insert(SortedAddress::Ip(ip));
                }
                Err(_) => warn!("Ignoring endpoint address with invalid IP {}", address.ip),
            }
        } else if let Some(hostname) = address.hostname.as_deref().filter(|h| !h.is_empty()) {
            sorted.insert(SortedAddress::Fqdn(hostname.to_string()));
        }
    }

    sorted.into_iter().map(BackendAddress::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Port;
    use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort};

    fn address(ip: &str, hostname: Option<&str>) -> EndpointAddress {
        EndpointAddress {
            ip: ip.to_string(),
            hostname: hostname.map(str::to_string),
            ..EndpointAddress::default()
        }
    }

    fn subset(port: i32, protocol: Option<&str>, addresses: Vec<EndpointAddress>) -> EndpointSubset {
        EndpointSubset {
            addresses: Some(addresses),
            ports: Some(vec![EndpointPort {
                port,
                protocol: protocol.map(str::to_string),
                ..EndpointPort::default()
            }]),
            ..EndpointSubset::default()
        }
    }

    #[test]
    fn test_addresses_are_unique_and_sorted() {
        let subset = subset(
            1356,
            None,
            vec![
                address("10.0.0.10", None),
                address("10.0.0.9", None),
                address("", Some("b.internal")),
                address("10.0.0.9", None),
                address("", Some("a.internal")),
            ],
        );

        assert_eq!(
            addresses(&subset),
            vec![
                BackendAddress::ip("10.0.0.9"),
                BackendAddress::ip("10.0.0.10"),
                BackendAddress::fqdn("a.internal"),
                BackendAddress::fqdn("b.internal"),
            ]
        );
    }

    #[test]
    fn test_ip_preferred_over_hostname() {
        let subset = subset(80, None, vec![address("1.1.1.1", Some("one.internal"))]);

        assert_eq!(addresses(&subset), vec![BackendAddress::ip("1.1.1.1")]);
    }

    #[test]
    fn test_matching_subset_requires_tcp_port() {
        let endpoints = Endpoints {
            subsets: Some(vec![
                subset(1356, Some("UDP"), vec![address("1.1.1.1", None)]),
                subset(1356, Some("TCP"), vec![address("2.2.2.2", None)]),
            ]),
            ..Endpoints::default()
        };
        let pair = PortPair::new(Port::new(80), Port::new(1356));

        let subset = matching_subset(&endpoints, pair).map(addresses);
        assert_eq!(subset, Some(vec![BackendAddress::ip("2.2.2.2")]));
        assert!(
            matching_subset(&endpoints, PortPair::new(Port::new(80), Port::new(81))).is_none()
        );
    }
}
