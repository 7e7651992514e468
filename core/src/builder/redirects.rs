use crate::appgw::{
    Protocol, RedirectConfiguration, RedirectConfigurationProperties, RedirectType, SubResource,
};
use crate::builder::ConfigBuilder;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// HTTP to HTTPS redirect configurations.
#[derive(Debug, Default)]
pub struct Redirects {
    redirects: BTreeMap<String, RedirectConfiguration>,
}

impl Redirects {
    pub fn redirects(&self) -> impl Iterator<Item = &RedirectConfiguration> {
        self.redirects.values()
    }

    pub fn redirect(&self, name: &str) -> Option<&RedirectConfiguration> {
        self.redirects.get(name)
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn redirects(&self) -> &Redirects {
        self.memo.redirects.get_or_init(|| self.build_redirects())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_redirects")]
    fn build_redirects(&self) -> Redirects {
        let listeners = self.listeners();
        let mut redirects = Redirects::default();

        for (id, config) in listeners.configs() {
            let Some(name) = config.ssl_redirect() else {
                continue;
            };
            if config.protocol() != Protocol::Https || redirects.redirects.contains_key(name) {
                continue;
            }
            let Some(target) = listeners.listener(id) else {
                continue;
            };

            debug!(
                "Created redirect {name} to listener {}; not yet linked to a routing rule",
                target.name()
            );
            redirects.redirects.insert(
                name.clone(),
                RedirectConfiguration::new(
                    name,
                    self.identifier.redirect_configuration_id(name),
                    RedirectConfigurationProperties {
                        redirect_type: RedirectType::Permanent,
                        target_listener: Some(SubResource::new(target.id().clone())),
                        target_url: None,
                        include_path: Some(true),
                        include_query_string: Some(true),
                    },
                ),
            );
        }

        redirects
    }
}
