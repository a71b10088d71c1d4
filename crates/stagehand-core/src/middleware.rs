//! The two-phase gate that runs before a view renders.
//!
//! A [`MiddlewareRunner`] holds two [`Pipeline`]s: **security** and
//! **data**.  Each pipeline runs its global middleware (configured on the
//! director) followed by the view's own list, strictly in order.  Every
//! middleware receives a [`Request`] and resolves with the (possibly
//! transformed) data, or rejects with a [`MiddlewareError`].
//!
//! Security always runs first and its output is discarded: it only decides
//! whether the view may render.  The data pipeline then runs on the original
//! data and its output is merged into the view's store before the adapter is
//! called.
//!
//! Failures are reported as a [`Rejection`] tagged with the pipeline that
//! produced them, so the view can treat a security rejection as an expected
//! outcome and a data rejection as a diagnosable one without ever inspecting
//! the error payload.
//!
//! # Example
//!
//! ```rust,ignore
//! use stagehand_core::middleware::{from_fn, MiddlewareError};
//!
//! let logged_in = from_fn(|req| async move {
//!     if req.data()["session"]["user"].is_null() {
//!         return Err(MiddlewareError::new("not logged in"));
//!     }
//!     Ok(req.into_data())
//! });
//! ```

use crate::error::Error;
use crate::view::WeakView;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Opaque failure produced by a middleware.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct MiddlewareError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + 'static>>,
}

impl MiddlewareError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Which pipeline a middleware belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Decides whether a view may render at all.
    Security,
    /// Resolves the data a view renders with.
    Data,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Security => f.write_str("security"),
            Stage::Data => f.write_str("data"),
        }
    }
}

/// Input handed to each middleware.
pub struct Request {
    view: String,
    stage: Stage,
    data: Value,
    syncer: Option<Syncer>,
}

impl Request {
    /// Name of the view being rendered.
    pub fn view_name(&self) -> &str {
        &self.view
    }

    /// Pipeline this request is running in.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Current data, as produced by the previous middleware.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Take ownership of the data, typically to resolve with it unchanged.
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Handle for pushing later data into the view.  Only present in the data
    /// pipeline.
    pub fn syncer(&self) -> Option<&Syncer> {
        self.syncer.as_ref()
    }
}

/// Future returned by a middleware.
pub type MiddlewareFuture = LocalBoxFuture<'static, Result<Value, MiddlewareError>>;

/// A single step in a pipeline.
///
/// Implemented for every `Fn(Request) -> impl Future<Output = Result<Value,
/// MiddlewareError>>`, so plain async closures work.
pub trait Middleware {
    /// Run this step.
    fn call(&self, request: Request) -> MiddlewareFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<Value, MiddlewareError>> + 'static,
{
    fn call(&self, request: Request) -> MiddlewareFuture {
        Box::pin(self(request))
    }
}

/// Shared middleware handle.
pub type MiddlewareRef = Rc<dyn Middleware>;

/// Wrap an async closure as a [`MiddlewareRef`].
pub fn from_fn<F, Fut>(f: F) -> MiddlewareRef
where
    F: Fn(Request) -> Fut + 'static,
    Fut: Future<Output = Result<Value, MiddlewareError>> + 'static,
{
    Rc::new(f)
}

/// A handle that syncs data into a view after its render has completed.
///
/// Data middleware can keep the handle (for example alongside a push
/// subscription) and call [`sync`](Syncer::sync) whenever fresh data
/// arrives.  Once the view is dropped the handle does nothing.
#[derive(Clone)]
pub struct Syncer {
    view: WeakView,
}

impl Syncer {
    pub(crate) fn new(view: WeakView) -> Self {
        Self { view }
    }

    /// Whether the target view is still alive.
    pub fn is_alive(&self) -> bool {
        self.view.upgrade().is_some()
    }

    /// Merge `data` into the view and sync it.
    pub fn sync(&self, data: Value) -> LocalBoxFuture<'static, Result<(), Error>> {
        match self.view.upgrade() {
            Some(view) => view.sync(data),
            None => Box::pin(futures::future::ready(Ok(()))),
        }
    }
}

/// An ordered list of global middleware for one [`Stage`].
#[derive(Clone)]
pub struct Pipeline {
    stage: Stage,
    global: Vec<MiddlewareRef>,
}

impl Pipeline {
    /// An empty pipeline.
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            global: Vec::new(),
        }
    }

    /// Append a global middleware.
    pub fn push(&mut self, middleware: MiddlewareRef) {
        self.global.push(middleware);
    }

    /// Number of global middleware.
    pub fn len(&self) -> usize {
        self.global.len()
    }

    /// Whether there are no global middleware.
    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    /// Run the global middleware followed by `route`, threading the data
    /// through each step.
    pub async fn run(
        &self,
        route: &[MiddlewareRef],
        view: &str,
        data: Value,
        syncer: Option<Syncer>,
    ) -> Result<Value, MiddlewareError> {
        let chain: Vec<MiddlewareRef> = self.global.iter().chain(route).cloned().collect();
        let mut data = data;
        for (step, middleware) in chain.iter().enumerate() {
            tracing::trace!(view, stage = %self.stage, step, "running middleware");
            data = middleware
                .call(Request {
                    view: view.to_string(),
                    stage: self.stage,
                    data,
                    syncer: syncer.clone(),
                })
                .await?;
        }
        Ok(data)
    }
}

/// Why a render did not go through, tagged by where it failed.
#[derive(Debug)]
pub enum Rejection {
    /// The security pipeline rejected; the view must stay hidden.
    Security(MiddlewareError),
    /// The data pipeline rejected; the view is hidden and the failure logged.
    Data(MiddlewareError),
    /// Anything else.  Propagated to the caller.
    Unexpected(Error),
}

impl From<Error> for Rejection {
    fn from(err: Error) -> Self {
        Rejection::Unexpected(err)
    }
}

/// Security and data pipelines shared by every view of a registry.
#[derive(Clone)]
pub struct MiddlewareRunner {
    security: Pipeline,
    data: Pipeline,
}

impl MiddlewareRunner {
    /// A runner with empty pipelines.
    pub fn new() -> Self {
        Self {
            security: Pipeline::new(Stage::Security),
            data: Pipeline::new(Stage::Data),
        }
    }

    /// Add a global security middleware.
    pub fn security(mut self, middleware: MiddlewareRef) -> Self {
        self.security.push(middleware);
        self
    }

    /// Add a global data middleware.
    pub fn data(mut self, middleware: MiddlewareRef) -> Self {
        self.data.push(middleware);
        self
    }

    /// The security pipeline.
    pub fn security_pipeline(&self) -> &Pipeline {
        &self.security
    }

    /// The data pipeline.
    pub fn data_pipeline(&self) -> &Pipeline {
        &self.data
    }

    /// Run security then data for one view.  Resolves with the data
    /// pipeline's output.
    pub async fn run(
        &self,
        view: &str,
        security: &[MiddlewareRef],
        data_middleware: &[MiddlewareRef],
        data: Value,
        syncer: Syncer,
    ) -> Result<Value, Rejection> {
        self.security
            .run(security, view, data.clone(), None)
            .await
            .map_err(Rejection::Security)?;
        self.data
            .run(data_middleware, view, data, Some(syncer))
            .await
            .map_err(Rejection::Data)
    }
}

impl Default for MiddlewareRunner {
    fn default() -> Self {
        Self::new()
    }
}
