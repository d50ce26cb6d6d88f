//! Top-level lifecycle dispatch: configure, install, uninstall.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{FlowError, FlowErrorKind},
    inputs::{resolve_inputs, validate_return_to},
    model::{HttpRequest, Response},
    response::{complete_with_error, complete_with_success},
    settings::SettingsManager,
};

/// Initial state used when no configuration flow is registered; the
/// `configure` phase then completes immediately with the resolved inputs.
const NO_CONFIGURE_STATE: &str = "none";

/// Handler for the install or uninstall phase.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    async fn handle(&self, request: HttpRequest) -> Result<Response, FlowError>;
}

/// Adapter letting a plain async function act as a [`LifecycleHandler`].
pub struct FnLifecycleHandler<F>(pub F);

#[async_trait]
impl<F, Fut> LifecycleHandler for FnLifecycleHandler<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, FlowError>> + Send + 'static,
{
    async fn handle(&self, request: HttpRequest) -> Result<Response, FlowError> {
        (self.0)(request).await
    }
}

/// Builder for [`LifecycleManager`].
#[derive(Default)]
pub struct LifecycleManagerBuilder {
    configure: Option<SettingsManager>,
    install: Option<Arc<dyn LifecycleHandler>>,
    uninstall: Option<Arc<dyn LifecycleHandler>>,
}

impl LifecycleManagerBuilder {
    pub fn configure(mut self, settings: SettingsManager) -> Self {
        self.configure = Some(settings);
        self
    }

    pub fn install(mut self, handler: impl LifecycleHandler + 'static) -> Self {
        self.install = Some(Arc::new(handler));
        self
    }

    pub fn install_fn<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, FlowError>> + Send + 'static,
    {
        self.install(FnLifecycleHandler(handler))
    }

    pub fn uninstall(mut self, handler: impl LifecycleHandler + 'static) -> Self {
        self.uninstall = Some(Arc::new(handler));
        self
    }

    pub fn uninstall_fn<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, FlowError>> + Send + 'static,
    {
        self.uninstall(FnLifecycleHandler(handler))
    }

    pub fn build(self) -> LifecycleManager {
        LifecycleManager {
            configure: self.configure,
            install: self.install,
            uninstall: self.uninstall,
        }
    }
}

/// Routes requests to the configuration flow, install, or uninstall phase
/// by the last non-empty path segment.
pub struct LifecycleManager {
    configure: Option<SettingsManager>,
    install: Option<Arc<dyn LifecycleHandler>>,
    uninstall: Option<Arc<dyn LifecycleHandler>>,
}

impl LifecycleManager {
    pub fn builder() -> LifecycleManagerBuilder {
        LifecycleManagerBuilder::default()
    }

    /// Handles one lifecycle request. Errors from every branch funnel
    /// through the same error-completion path as the settings machine.
    pub async fn handle(&self, request: &HttpRequest) -> Response {
        debug!(
            method = %request.method,
            path = %request.path,
            "lifecycle request"
        );
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(error) => complete_with_error(request, &error),
        }
    }

    async fn dispatch(&self, request: &HttpRequest) -> Result<Response, FlowError> {
        let segment = request
            .path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default();
        match segment {
            "configure" => match &self.configure {
                Some(settings) => Ok(settings.handle(request).await),
                None => {
                    // No configuration stage: validate the destination and
                    // redirect straight back to the caller with success.
                    validate_return_to(request)?;
                    let (state, data) = resolve_inputs(request, Some(NO_CONFIGURE_STATE))?;
                    Ok(complete_with_success(&state, &data))
                }
            },
            "install" => match &self.install {
                Some(handler) => handler.handle(request.clone()).await,
                None => Err(FlowErrorKind::NotFound.into()),
            },
            "uninstall" => match &self.uninstall {
                Some(handler) => handler.handle(request.clone()).await,
                None => Err(FlowErrorKind::NotFound.into()),
            },
            _ => Err(FlowErrorKind::NotFound.into()),
        }
    }
}
