use crate::appgw::{
    LoadDistributionAlgorithm, LoadDistributionPolicy, LoadDistributionPolicyProperties,
    LoadDistributionTarget, LoadDistributionTargetProperties, SubResource,
};
use crate::builder::backends::{BackendSite, PolicyTarget, SiteBackend};
use crate::builder::names::load_distribution_policy_name;
use crate::builder::pools::Pools;
use crate::builder::{BuildError, ConfigBuilder};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Load distribution policies and the policy serving each backend site.
#[derive(Debug, Default)]
pub struct LoadDistributionPolicies {
    policies: BTreeMap<String, LoadDistributionPolicy>,
    by_site: BTreeMap<BackendSite, String>,
}

impl LoadDistributionPolicies {
    pub fn policies(&self) -> impl Iterator<Item = &LoadDistributionPolicy> {
        self.policies.values()
    }

    pub fn policy_for(&self, site: &BackendSite) -> Option<&LoadDistributionPolicy> {
        self.by_site
            .get(site)
            .and_then(|name| self.policies.get(name))
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn load_distribution_policies(&self) -> Result<&LoadDistributionPolicies, BuildError> {
        self.memo
            .load_distribution_policies
            .get_or_try_init(|| self.build_load_distribution_policies())
    }

    #[instrument(
        skip_all,
        level = "debug",
        name = "ConfigBuilder::build_load_distribution_policies"
    )]
    fn build_load_distribution_policies(&self) -> Result<LoadDistributionPolicies, BuildError> {
        let pools = self.pools()?;
        let mut policies = LoadDistributionPolicies::default();

        for (site, backend) in self.backends().sites() {
            let SiteBackend::Policy { policy, targets } = backend else {
                continue;
            };

            let name = load_distribution_policy_name(policy);
            if !policies.policies.contains_key(&name) {
                debug!("Created load distribution policy {name} from {policy}");
                let properties = LoadDistributionPolicyProperties {
                    load_distribution_algorithm: LoadDistributionAlgorithm::RoundRobin,
                    load_distribution_targets: targets
                        .iter()
                        .enumerate()
                        .map(|(position, target)| self.policy_target(&name, position, target, pools))
                        .collect(),
                };
                policies.policies.insert(
                    name.clone(),
                    LoadDistributionPolicy::new(
                        &name,
                        self.identifier.load_distribution_policy_id(&name),
                        properties,
                    ),
                );
            }
            policies.by_site.insert(site.clone(), name);
        }

        Ok(policies)
    }

    fn policy_target(
        &self,
        policy: &str,
        position: usize,
        target: &PolicyTarget,
        pools: &Pools,
    ) -> LoadDistributionTarget {
        let index = target.backend().target().unwrap_or(position);
        let name = format!("target-{index}");
        let pool = pools.pool_name(target.backend());

        LoadDistributionTarget::new(
            &name,
            self.identifier.load_distribution_target_id(policy, &name),
            LoadDistributionTargetProperties {
                weight_per_server: target.weight(),
                backend_address_pool: Some(SubResource::new(self.identifier.address_pool_id(pool))),
            },
        )
    }
}
