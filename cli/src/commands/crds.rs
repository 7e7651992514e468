use agic_api::v1::{
    AzureApplicationGatewayLoadDistributionPolicy, AzureIngressManagedTarget,
    AzureIngressProhibitedTarget,
};
use agic_api::v1beta1::AzureApplicationGatewayRewrite;
use anyhow::Result;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

fn definitions() -> Vec<CustomResourceDefinition> {
    vec![
        AzureIngressProhibitedTarget::crd(),
        AzureIngressManagedTarget::crd(),
        AzureApplicationGatewayLoadDistributionPolicy::crd(),
        AzureApplicationGatewayRewrite::crd(),
    ]
}

/// Prints every definition as one multi-document YAML stream.
pub fn handle_crds_command() -> Result<()> {
    for crd in definitions() {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
