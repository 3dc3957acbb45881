//! Short-circuiting middleware chain.
//!
//! A stage receives the request and a [`Next`] for the remainder of the
//! chain. Calling `next.run(req)` continues; returning [`Flow::Halt`] with a
//! response stops the chain and the handler is never invoked.

use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::http::request::RequestContext;
use crate::http::response::Response;

/// Outcome of running a chain.
#[derive(Debug)]
pub enum Flow {
    /// Every stage passed; dispatch proceeds to the handler.
    Continue,
    /// A stage vetoed the request and produced the response itself.
    Halt(Response),
}

impl Flow {
    pub fn is_continue(&self) -> bool {
        matches!(self, Flow::Continue)
    }
}

/// A request-processing stage run before the target action.
pub trait Middleware: Send + Sync {
    fn handle<'a>(&'a self, req: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Flow>;
}

/// The rest of the chain after the current stage.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub fn run(self, req: &'a mut RequestContext) -> BoxFuture<'a, Flow> {
        match self.chain.split_first() {
            Some((stage, rest)) => stage.handle(req, Next { chain: rest }),
            None => Box::pin(async { Flow::Continue }),
        }
    }
}

/// Ordered stages: global first, then the route's own, each in declaration order.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Append one stage.
    pub fn with(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    /// This pipeline followed by `other`.
    pub fn then(&self, other: Pipeline) -> Pipeline {
        let mut stages = Vec::with_capacity(self.stages.len() + other.stages.len());
        stages.extend(self.stages.iter().cloned());
        stages.extend(other.stages);
        Pipeline { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn run(&self, req: &mut RequestContext) -> Flow {
        Next { chain: &self.stages[..] }.run(req).await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stages.len()).finish()
    }
}

/// Synchronous middleware from a closure. Returning `Flow::Continue` passes
/// the request on; anything else halts.
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> Flow + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> Flow + Send + Sync,
{
    fn handle<'a>(&'a self, req: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Flow> {
        match (self.f)(req) {
            Flow::Continue => next.run(req),
            halt => Box::pin(async move { halt }),
        }
    }
}
