use thiserror::Error;

/// Failures that stop a build. Nothing is emitted when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("unable to resolve backend port for {backend}")]
    ResolveBackendPortForService { backend: String },

    #[error("more than one service-backend port binding is not allowed: {backend} resolves to {pairs}")]
    MultipleBackendPortBinding { backend: String, pairs: String },

    #[error(
        "url path map {0}: either a DefaultRedirectConfiguration or (DefaultBackendAddressPool + DefaultBackendHTTPSettings) must be configured"
    )]
    NoDefaults(String),

    #[error(
        "url path map {0} must have either DefaultRedirectConfiguration or (DefaultBackendAddressPool + DefaultBackendHTTPSettings) but not both"
    )]
    EitherDefaults(String),

    #[error(
        "path rule {0} must have one of RedirectConfiguration or (BackendAddressPool + BackendHTTPSettings)"
    )]
    NoBackendOrRedirect(String),

    #[error(
        "path rule {0} must have either RedirectConfiguration or (BackendAddressPool + BackendHTTPSettings) but not both"
    )]
    EitherBackendOrRedirect(String),
}
