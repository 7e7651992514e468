//! Compiles a cluster snapshot into an Application Gateway configuration.
//!
//! [`build`] is a pure function of its [`BuildContext`]. Each kind of gateway resource has its own
//! stage on [`ConfigBuilder`]; stages are computed lazily and memoized for the duration of one
//! build, so a stage may freely ask for the output of the stages it depends on.

mod backends;
mod cleanup;
mod context;
mod errors;
mod ldp;
mod listeners;
pub mod names;
mod pools;
mod probes;
mod redirects;
mod rewrites;
mod routing;
mod settings;
mod trusted_roots;
mod validators;

pub use backends::{BackendId, BackendSite, PortPair, ServicePortRef};
pub use context::{BuildContext, Clock, FixedClock, SystemClock};
pub use errors::BuildError;
pub use listeners::{CERTIFICATE_PASSWORD, ListenerId};
pub use validators::validate_url_path_maps;

use crate::annotations::AnnotationResult;
use crate::appgw::{ApplicationGateway, GatewayProperties, Identifier, Resource};
use crate::brownfield::{self, TargetPolicy, prune_ingress};
use crate::config::CompilerConfiguration;
use crate::events::{Event, EventReason, EventRecorder};
use crate::kubernetes::{ObjectKey, Snapshot};
use backends::{BackendCatalog, BackendPorts};
use chrono::SecondsFormat;
use k8s_openapi::api::networking::v1::Ingress;
use ldp::LoadDistributionPolicies;
use listeners::Listeners;
use once_cell::unsync::OnceCell;
use pools::Pools;
use probes::Probes;
use redirects::Redirects;
use rewrites::Rewrites;
use routing::Routing;
use settings::Settings;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, instrument, warn};
use trusted_roots::TrustedRoots;

pub const MANAGED_BY_TAG: &str = "managed-by-k8s-ingress";
pub const CLUSTER_ID_TAG: &str = "ingress-for-aks-cluster-id";
pub const LAST_UPDATED_TAG: &str = "last-updated-by-k8s-ingress";

/// Compiles the snapshot of `context` into the gateway configuration to deploy.
///
/// Non-fatal findings are reported on the context's recorder; a fatal one aborts the build and no
/// configuration is returned.
#[instrument(skip_all, level = "debug", name = "build")]
pub fn build(context: &BuildContext<'_>) -> Result<ApplicationGateway, BuildError> {
    let builder = ConfigBuilder::new(context);
    match builder.assemble() {
        Ok(gateway) => {
            info!(
                "Built gateway configuration with {} listeners and {} routing rules",
                gateway.properties.http_listeners.len(),
                gateway.properties.request_routing_rules.len()
            );
            Ok(gateway)
        }
        Err(err) => {
            error!("Failed to build gateway configuration: {err}");
            Err(err)
        }
    }
}

/// Outputs of the stages computed so far.
#[derive(Default)]
struct Memo {
    backends: OnceCell<BackendCatalog>,
    backend_ports: OnceCell<BackendPorts>,
    pools: OnceCell<Pools>,
    probes: OnceCell<Probes>,
    trusted_roots: OnceCell<TrustedRoots>,
    settings: OnceCell<Settings>,
    listeners: OnceCell<Listeners>,
    redirects: OnceCell<Redirects>,
    rewrites: OnceCell<Rewrites>,
    load_distribution_policies: OnceCell<LoadDistributionPolicies>,
    routing: OnceCell<Routing>,
}

pub struct ConfigBuilder<'a> {
    configuration: &'a CompilerConfiguration,
    snapshot: &'a dyn Snapshot,
    existing: &'a ApplicationGateway,
    clock: &'a dyn Clock,
    recorder: &'a dyn EventRecorder,
    identifier: Identifier,
    /// The ingresses to compile, with prohibited rules already pruned.
    ingresses: BTreeMap<ObjectKey, Ingress>,
    policy: TargetPolicy,
    memo: Memo,
    emitted: RefCell<BTreeSet<(ObjectKey, EventReason, String)>>,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(context: &BuildContext<'a>) -> Self {
        let configuration = context.configuration();
        let snapshot = context.snapshot();
        let policy = if configuration.brownfield_deployment() {
            TargetPolicy::from_snapshot(snapshot)
        } else {
            TargetPolicy::Unrestricted
        };

        let mut ingresses = BTreeMap::new();
        for ingress in snapshot.http_ingresses() {
            let key = match ObjectKey::for_object(ingress) {
                Ok(key) => key,
                Err(err) => {
                    warn!("Skipping ingress without a usable key: {err}");
                    continue;
                }
            };

            if let TargetPolicy::Prohibit(targets) = &policy {
                match prune_ingress(ingress, targets) {
                    Some(pruned) => ingresses.insert(key, pruned),
                    None => {
                        debug!("Every rule of ingress {key} targets a prohibited target");
                        continue;
                    }
                };
            } else {
                ingresses.insert(key, ingress.clone());
            }
        }

        Self {
            configuration,
            snapshot,
            existing: context.existing(),
            clock: context.clock(),
            recorder: context.recorder(),
            identifier: Identifier::from(configuration),
            ingresses,
            policy,
            memo: Memo::default(),
            emitted: RefCell::new(BTreeSet::new()),
        }
    }

    /// Records a non-fatal finding against an object, once per distinct finding.
    fn emit(&self, object: &ObjectKey, reason: EventReason, message: String) {
        let fresh = self
            .emitted
            .borrow_mut()
            .insert((object.clone(), reason, message.clone()));
        if !fresh {
            return;
        }

        warn!("{reason} on {object}: {message}");
        self.recorder.record(
            Event::builder()
                .object(object.clone())
                .reason(reason)
                .message(message)
                .build(),
        );
    }

    /// The value of an annotation; absent and malformed values both read as `None`, the latter with an event.
    fn annotation<T>(&self, key: &ObjectKey, result: AnnotationResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) if err.is_missing() => None,
            Err(err) => {
                self.emit(key, EventReason::InvalidAnnotation, err.to_string());
                None
            }
        }
    }

    fn ingress(&self, key: &ObjectKey) -> Option<&Ingress> {
        self.ingresses.get(key)
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::assemble")]
    fn assemble(&self) -> Result<ApplicationGateway, BuildError> {
        let routing = self.routing()?;
        let pools = self.pools()?;
        let settings = self.settings()?;
        let probes = self.probes()?;
        let policies = self.load_distribution_policies()?;
        let listeners = self.listeners();

        let mut properties = GatewayProperties {
            backend_address_pools: pools.pools().cloned().collect(),
            backend_http_settings_collection: settings.settings().cloned().collect(),
            frontend_ip_configurations: self
                .existing
                .properties
                .frontend_ip_configurations
                .clone(),
            frontend_ports: listeners.ports().cloned().collect(),
            http_listeners: listeners.listeners().cloned().collect(),
            probes: probes.probes().cloned().collect(),
            redirect_configurations: self.redirects().redirects().cloned().collect(),
            request_routing_rules: routing.rules().cloned().collect(),
            ssl_certificates: listeners.certificates().cloned().collect(),
            url_path_maps: routing.path_maps().cloned().collect(),
            rewrite_rule_sets: self.rewrites().sets().cloned().collect(),
            load_distribution_policies: policies.policies().cloned().collect(),
            trusted_root_certificates: self.trusted_roots().certificates().cloned().collect(),
        };
        cleanup::remove_unreferenced_redirects(&mut properties);
        cleanup::remove_unreferenced_trusted_roots(&mut properties);

        if self.configuration.brownfield_deployment() {
            let mut retained = brownfield::retained_resources(&self.existing.properties, &self.policy);
            cleanup::remove_managed_path_rules(&mut retained.url_path_maps);
            properties = brownfield::merge(retained, properties);
            cleanup::remove_unreferenced_defaults(&mut properties);
        }

        validate_url_path_maps(&properties.url_path_maps)?;
        sort_by_name(&mut properties);

        Ok(ApplicationGateway {
            tags: self.tags(),
            properties,
        })
    }

    fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.existing.tags.clone();
        tags.insert(
            MANAGED_BY_TAG.to_string(),
            self.configuration.version().tag_value(),
        );
        tags.insert(
            CLUSTER_ID_TAG.to_string(),
            self.configuration.cluster_id().clone(),
        );
        tags.insert(
            LAST_UPDATED_TAG.to_string(),
            self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        tags
    }
}

fn sort_resources<P>(resources: &mut [Resource<P>]) {
    resources.sort_by(|a, b| a.name().cmp(b.name()));
}

fn sort_by_name(properties: &mut GatewayProperties) {
    sort_resources(&mut properties.backend_address_pools);
    sort_resources(&mut properties.backend_http_settings_collection);
    sort_resources(&mut properties.frontend_ip_configurations);
    sort_resources(&mut properties.frontend_ports);
    sort_resources(&mut properties.http_listeners);
    sort_resources(&mut properties.probes);
    sort_resources(&mut properties.redirect_configurations);
    sort_resources(&mut properties.request_routing_rules);
    sort_resources(&mut properties.ssl_certificates);
    sort_resources(&mut properties.url_path_maps);
    sort_resources(&mut properties.rewrite_rule_sets);
    sort_resources(&mut properties.load_distribution_policies);
    sort_resources(&mut properties.trusted_root_certificates);
}
