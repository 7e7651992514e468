use derive_builder::Builder;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

/// A hostname, port and path set on the gateway that the compiler must never modify.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "AzureIngressProhibitedTarget",
    group = "appgw.ingress.k8s.io",
    version = "v1",
    namespaced,
    singular = "azureingressprohibitedtarget",
    plural = "azureingressprohibitedtargets"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct AzureIngressProhibitedTargetSpec {
    #[serde(flatten)]
    pub target: TargetSpec,
}

/// A hostname, port and path set on the gateway that the compiler owns.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "AzureIngressManagedTarget",
    group = "appgw.ingress.k8s.io",
    version = "v1",
    namespaced,
    singular = "azureingressmanagedtarget",
    plural = "azureingressmanagedtargets"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct AzureIngressManagedTargetSpec {
    #[serde(flatten)]
    pub target: TargetSpec,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct TargetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

/// Weighted spread of traffic over several services.
#[derive(Default, CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "AzureApplicationGatewayLoadDistributionPolicy",
    group = "appgw.ingress.azure.io",
    version = "v1",
    namespaced,
    singular = "azureapplicationgatewayloaddistributionpolicy",
    plural = "azureapplicationgatewayloaddistributionpolicies"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct AzureApplicationGatewayLoadDistributionPolicySpec {
    #[serde(default, alias = "Targets")]
    pub targets: Vec<LoadDistributionTarget>,
}

#[derive(
    Default, Deserialize, Serialize, Copy, Clone, Debug, JsonSchema, PartialEq, IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TargetRole {
    #[default]
    Active,
    Standby,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into))]
pub struct LoadDistributionTarget {
    #[serde(default)]
    #[builder(default)]
    pub role: TargetRole,
    #[serde(default)]
    #[builder(default)]
    pub weight: i32,
    pub service: ServiceBackend,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into))]
pub struct ServiceBackend {
    pub name: String,
    #[serde(default)]
    #[builder(default)]
    pub port: ServiceBackendPort,
}

#[derive(Default, Builder, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into, strip_option), default)]
pub struct ServiceBackendPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
}
