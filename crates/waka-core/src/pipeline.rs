//! Dispatch pipeline: ordered stages wrapped around a terminal send.
//!
//! A [`Handle`] takes a batch of heartbeats and returns aligned results. A
//! [`Stage`] turns one handle into another. [`Pipeline`] keeps stages in
//! registration order and composes them at build time so that the first
//! registered stage is outermost: it sees the batch first and the outcome last.

use crate::error::DispatchError;
use crate::heartbeat::{Heartbeat, HeartbeatResult};

pub type DispatchResult = Result<Vec<HeartbeatResult>, DispatchError>;

/// A callable dispatch step.
pub trait Handle {
    fn handle(&self, batch: Vec<Heartbeat>) -> DispatchResult;
}

impl<F> Handle for F
where
    F: Fn(Vec<Heartbeat>) -> DispatchResult,
{
    fn handle(&self, batch: Vec<Heartbeat>) -> DispatchResult {
        self(batch)
    }
}

/// Middleware around the next handle.
///
/// A stage may forward the batch unchanged or transformed, short-circuit with
/// an error without calling `next`, and observe the outcome of `next`.
pub trait Stage {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn wrap(self: Box<Self>, next: Box<dyn Handle>) -> Box<dyn Handle>;
}

/// Ordered list of stages, composed around a terminal handle by [`Pipeline::build`].
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; it will sit inside every stage registered before it.
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Compose all stages around `terminal`, innermost last-registered.
    pub fn build<H: Handle + 'static>(self, terminal: H) -> Box<dyn Handle> {
        tracing::debug!(stages = ?self.stage_names(), "building dispatch pipeline");
        let mut handle: Box<dyn Handle> = Box::new(terminal);
        for stage in self.stages.into_iter().rev() {
            handle = stage.wrap(handle);
        }
        handle
    }
}
