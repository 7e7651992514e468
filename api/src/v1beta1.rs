use derive_builder::Builder;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Header and URL rewrite rules attached to an ingress by annotation.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "AzureApplicationGatewayRewrite",
    group = "appgw.ingress.azure.io",
    version = "v1beta1",
    namespaced,
    singular = "azureapplicationgatewayrewrite",
    plural = "azureapplicationgatewayrewrites"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct AzureApplicationGatewayRewriteSpec {
    #[serde(default)]
    pub rewrite_rules: Vec<RewriteRule>,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct RewriteRule {
    pub name: String,
    pub rule_sequence: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Actions,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct Condition {
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub negate: bool,
    pub variable: String,
    pub pattern: String,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct Actions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_header_configurations: Vec<HeaderConfiguration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_header_configurations: Vec<HeaderConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_configuration: Option<UrlConfiguration>,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct HeaderConfiguration {
    /// `set` or `delete`; a delete emits the header with an empty value.
    pub action_type: String,
    pub header_name: String,
    #[serde(default)]
    pub header_value: String,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct UrlConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_query_string: Option<String>,
    #[serde(default)]
    pub reroute: bool,
}
