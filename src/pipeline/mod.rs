//! Request-handling pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → stage 1 .. stage N (handle: Continue | Respond | Fail)
//!     → terminal router (handlers + not-found fallback)
//!     → translator.rs (on Fail, or a handler's ErrorSignal)
//!     → on_response hooks, reverse order, entered stages only
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Stages are trait objects in a fixed order chosen at startup
//! - `Fail` skips every remaining stage and the router
//! - Exactly one of handler, fallback or translator produces the final body

pub mod translator;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use futures_util::FutureExt;
use tower::ServiceExt;

use crate::http::error::{ApiError, ErrorSignal};
use crate::http::request::RequestContext;

/// Outcome of a single stage.
#[derive(Debug)]
pub enum Flow {
    /// Hand the (possibly annotated) request to the next stage.
    Continue(Request),
    /// Short-circuit with this response.
    Respond(Response),
    /// Jump to the error translator.
    Fail(ApiError),
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name for logs.
    fn name(&self) -> &'static str;

    /// Request phase.
    async fn handle(&self, request: Request, ctx: &mut RequestContext) -> Flow;

    /// Response phase. Runs for every stage whose `handle` ran, in reverse order.
    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// Ordered stages in front of a terminal router.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    terminal: Router,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Names of the configured stages, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run a request through every stage and the router.
    pub async fn dispatch(&self, request: Request) -> Response {
        let mut ctx = RequestContext::from_request(&request);
        let mut entered = 0;
        let mut request = request;

        let outcome = 'stages: {
            for stage in &self.stages {
                entered += 1;
                match stage.handle(request, &mut ctx).await {
                    Flow::Continue(next) => request = next,
                    Flow::Respond(response) => break 'stages Ok(response),
                    Flow::Fail(err) => {
                        tracing::debug!(
                            request_id = %ctx.request_id,
                            stage = stage.name(),
                            "Stage failed"
                        );
                        break 'stages Err(err);
                    }
                }
            }
            self.call_terminal(request).await
        };

        let mut response = match outcome {
            Ok(mut response) => match response.extensions_mut().remove::<ErrorSignal>() {
                Some(ErrorSignal(err)) => translator::translate(&ctx, &err),
                None => response,
            },
            Err(err) => translator::translate(&ctx, &err),
        };

        for stage in self.stages[..entered].iter().rev() {
            stage.on_response(&ctx, &mut response);
        }

        response
    }

    async fn call_terminal(&self, request: Request) -> Result<Response, ApiError> {
        let call = self.terminal.clone().oneshot(request);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(infallible)) => match infallible {},
            Err(_) => Err(ApiError::Internal("handler panicked".to_string())),
        }
    }

    /// Wrap the pipeline in an axum router that sends every request through it.
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(Arc::new(self))
    }
}

async fn dispatch_handler(State(pipeline): State<Arc<Pipeline>>, request: Request) -> Response {
    pipeline.dispatch(request).await
}

/// Collects stages in declaration order.
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Add a stage only when `enabled`.
    pub fn stage_if(self, enabled: bool, stage: impl FnOnce() -> Box<dyn Stage>) -> Self {
        if enabled {
            let mut this = self;
            this.stages.push(Arc::from(stage()));
            this
        } else {
            self
        }
    }

    pub fn build(self, terminal: Router) -> Pipeline {
        Pipeline {
            stages: self.stages,
            terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, StatusCode},
        response::IntoResponse,
        routing::get,
    };
    use std::sync::Mutex;

    /// Records its name on both phases.
    struct Recorder {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        action: RecorderAction,
    }

    #[derive(Clone, Copy)]
    enum RecorderAction {
        Pass,
        Respond,
        Fail,
    }

    #[async_trait]
    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, request: Request, _ctx: &mut RequestContext) -> Flow {
            self.journal.lock().unwrap().push(format!("{}:handle", self.name));
            match self.action {
                RecorderAction::Pass => Flow::Continue(request),
                RecorderAction::Respond => Flow::Respond((StatusCode::ACCEPTED, "short").into_response()),
                RecorderAction::Fail => Flow::Fail(ApiError::BadRequest("stage failed".into())),
            }
        }

        fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
            self.journal.lock().unwrap().push(format!("{}:response", self.name));
            response
                .headers_mut()
                .append("x-recorder", HeaderValue::from_static(self.name));
        }
    }

    fn recorder(name: &'static str, journal: &Arc<Mutex<Vec<String>>>, action: RecorderAction) -> Recorder {
        Recorder {
            name,
            journal: journal.clone(),
            action,
        }
    }

    fn terminal(journal: &Arc<Mutex<Vec<String>>>) -> Router {
        let journal = journal.clone();
        Router::new()
            .route(
                "/",
                get(move || {
                    let journal = journal.clone();
                    async move {
                        journal.lock().unwrap().push("handler".into());
                        "ok"
                    }
                }),
            )
            .route("/fail", get(|| async { Err::<&str, _>(ApiError::Internal("secret".into())) }))
            .route("/panic", get(panicking))
    }

    async fn panicking() -> &'static str {
        panic!("boom")
    }

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_order_then_unwind() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(recorder("a", &journal, RecorderAction::Pass))
            .stage(recorder("b", &journal, RecorderAction::Pass))
            .build(terminal(&journal));

        let response = pipeline.dispatch(request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:handle", "b:handle", "handler", "b:response", "a:response"]
        );
    }

    #[tokio::test]
    async fn test_respond_short_circuits() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(recorder("a", &journal, RecorderAction::Respond))
            .stage(recorder("b", &journal, RecorderAction::Pass))
            .build(terminal(&journal));

        let response = pipeline.dispatch(request("/")).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(*journal.lock().unwrap(), vec!["a:handle", "a:response"]);
    }

    #[tokio::test]
    async fn test_fail_jumps_to_translator() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(recorder("a", &journal, RecorderAction::Pass))
            .stage(recorder("b", &journal, RecorderAction::Fail))
            .stage(recorder("c", &journal, RecorderAction::Pass))
            .build(terminal(&journal));

        let response = pipeline.dispatch(request("/?x=1")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let recorded: Vec<_> = response.headers().get_all("x-recorder").iter().collect();
        assert_eq!(recorded, vec!["b", "a"]);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:handle", "b:handle", "b:response", "a:response"]
        );

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "stage failed");
        assert_eq!(body["error"]["status"], 400);
        assert_eq!(body["error"]["path"], "/?x=1");
    }

    #[tokio::test]
    async fn test_handler_error_is_translated() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder().build(terminal(&journal));

        let response = pipeline.dispatch(request("/fail")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorSignal>().is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Internal Server Error");
        assert_eq!(body["error"]["path"], "/fail");
    }

    #[tokio::test]
    async fn test_handler_panic_is_translated() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(recorder("a", &journal, RecorderAction::Pass))
            .build(terminal(&journal));

        let response = pipeline.dispatch(request("/panic")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get("x-recorder").unwrap(), "a");
    }

    #[tokio::test]
    async fn test_conditional_stage() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let j = journal.clone();
        let pipeline = Pipeline::builder()
            .stage_if(false, move || Box::new(recorder("skipped", &j, RecorderAction::Fail)))
            .build(terminal(&journal));

        assert!(pipeline.stage_names().is_empty());
        let response = pipeline.dispatch(request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
