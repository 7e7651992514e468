pub const GROUP: &str = "appgw.ingress.azure.io";
pub const PROHIBITED_TARGET_GROUP: &str = "appgw.ingress.k8s.io";

pub const PROHIBITED_TARGET_CRD_KIND: &str = "AzureIngressProhibitedTarget";
pub const MANAGED_TARGET_CRD_KIND: &str = "AzureIngressManagedTarget";
pub const LOAD_DISTRIBUTION_POLICY_CRD_KIND: &str = "AzureApplicationGatewayLoadDistributionPolicy";
pub const REWRITE_CRD_KIND: &str = "AzureApplicationGatewayRewrite";

pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
pub const DEFAULT_INGRESS_CLASS: &str = "azure/application-gateway";
pub const DEFAULT_INGRESS_CLASS_RESOURCE_NAME: &str = "azure-application-gateway";
