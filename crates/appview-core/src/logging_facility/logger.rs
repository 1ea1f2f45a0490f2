//! Injected operation logger

use crate::errors::ExError;
use appview_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use appview_core_types::RequestId;
use std::future::Future;
use std::time::Instant;
use tracing::Dispatch;

/// Logger handle owned by a component
///
/// Without a dispatch the events go to whatever subscriber is current for
/// the calling thread (normally the one installed by `init`). With a
/// dispatch every event emitted through the handle goes to that subscriber
/// only.
#[derive(Clone)]
pub struct OpLogger {
    component: &'static str,
    request_id: Option<RequestId>,
    dispatch: Option<Dispatch>,
}

impl OpLogger {
    /// Logger writing to the ambient subscriber
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            request_id: None,
            dispatch: None,
        }
    }

    /// Logger writing to an explicit subscriber
    pub fn with_dispatch(component: &'static str, dispatch: Dispatch) -> Self {
        Self {
            component,
            request_id: None,
            dispatch: Some(dispatch),
        }
    }

    /// Tag every event with a request id
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Same sink and request id, different component name
    pub fn child(&self, component: &'static str) -> Self {
        Self {
            component,
            request_id: self.request_id.clone(),
            dispatch: self.dispatch.clone(),
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    fn request_id(&self) -> Option<&str> {
        self.request_id.as_ref().map(RequestId::as_str)
    }

    /// Run `f` with this logger's subscriber as the default
    ///
    /// Components use this for ad hoc `tracing` events so they reach the
    /// same sink as the boundary events.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    /// Log the start of an operation
    pub fn op_start(&self, op: &str) {
        self.in_scope(|| {
            tracing::info!(
                component = self.component,
                op = op,
                event = EVENT_START,
                request_id = self.request_id(),
            );
        });
    }

    /// Log the successful end of an operation
    pub fn op_end(&self, op: &str, duration_ms: u64) {
        self.in_scope(|| {
            tracing::info!(
                component = self.component,
                op = op,
                event = EVENT_END,
                duration_ms = duration_ms,
                request_id = self.request_id(),
            );
        });
    }

    /// Log the failed end of an operation
    pub fn op_error(&self, op: &str, err: &ExError, duration_ms: u64) {
        self.in_scope(|| {
            tracing::error!(
                component = self.component,
                op = op,
                event = EVENT_END_ERROR,
                duration_ms = duration_ms,
                err.kind = ?err.kind(),
                err.code = err.code(),
                request_id = self.request_id(),
                "{}",
                err
            );
        });
    }

    /// Await `fut` between a `start` and an `end`/`end_error` event
    pub async fn instrument<T, F>(&self, op: &str, fut: F) -> Result<T, ExError>
    where
        F: Future<Output = Result<T, ExError>>,
    {
        let started = Instant::now();
        self.op_start(op);
        let result = fut.await;
        let duration_ms = elapsed_ms(started);
        match &result {
            Ok(_) => self.op_end(op, duration_ms),
            Err(err) => self.op_error(op, err, duration_ms),
        }
        result
    }
}

/// Milliseconds since `started`, saturating
pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for OpLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpLogger")
            .field("component", &self.component)
            .field("request_id", &self.request_id)
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}
