mod serde;

pub use self::serde::{ReadError, WriteError, read_configuration, write_configuration};

use agic_api::constants::DEFAULT_INGRESS_CLASS;
use getset::{CopyGetters, Getters};
use schemars::JsonSchema;
use ::serde::{Deserialize, Serialize};
use serde_valid::Validate;
use typed_builder::TypedBuilder;

/// Everything the compiler needs to know about the gateway and the cluster that owns it.
#[derive(
    Validate,
    TypedBuilder,
    Getters,
    CopyGetters,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfiguration {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    #[validate(min_length = 1)]
    subscription_id: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    #[validate(min_length = 1)]
    #[validate(max_length = 90)]
    resource_group: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    #[validate(min_length = 1)]
    #[validate(max_length = 80)]
    gateway_name: String,

    #[getset(get = "pub")]
    #[builder(default, setter(into))]
    #[serde(default)]
    cluster_id: String,

    /// Share the gateway with resources the compiler does not own.
    #[getset(get_copy = "pub")]
    #[builder(default)]
    #[serde(default)]
    brownfield_deployment: bool,

    /// Bind listeners to the private frontend IP unless an ingress says otherwise.
    #[getset(get_copy = "pub")]
    #[builder(default)]
    #[serde(default)]
    use_private_ip: bool,

    #[getset(get = "pub")]
    #[builder(default = DEFAULT_INGRESS_CLASS.to_string(), setter(into))]
    #[serde(default = "default_ingress_class")]
    #[validate(min_length = 1)]
    ingress_class: String,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default)]
    #[validate]
    version: VersionInfo,
}

fn default_ingress_class() -> String {
    DEFAULT_INGRESS_CLASS.to_string()
}

#[derive(
    Validate,
    TypedBuilder,
    Getters,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    version: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    git_commit: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    build_date: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_commit: "unknown".to_string(),
            build_date: "unknown".to_string(),
        }
    }
}

impl VersionInfo {
    /// `<version>/<commit>/<build date>`, the value of the managed-by tag.
    pub fn tag_value(&self) -> String {
        format!("{}/{}/{}", self.version, self.git_commit, self.build_date)
    }
}
