use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::types::{BuildContext, Termination};
use crate::{Error, Result};

/// One unit of work in a build.
///
/// `cleanup` runs for every step that started, in reverse order, once the
/// build has ended; it receives how the build ended.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut BuildContext) -> Result<()>;

    async fn cleanup(&self, ctx: &BuildContext, termination: Termination) -> Result<()>;
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub termination: Termination,
    /// The error that halted the build, if any.
    pub error: Option<Error>,
    /// Failures raised while unwinding. Reported only.
    pub cleanup_errors: Vec<(&'static str, Error)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.termination == Termination::Success
    }
}

/// Runs steps sequentially against one build context.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Run every step, then unwind.
    ///
    /// `cancel` is polled before and after each step; a step already
    /// running is never interrupted.
    pub async fn run(&self, ctx: &mut BuildContext, cancel: &AtomicBool) -> RunReport {
        let mut started = 0;
        let mut termination = Termination::Success;
        let mut failure = None;

        for step in &self.steps {
            if cancel.load(Ordering::SeqCst) {
                warn!(step = step.name(), "build cancelled");
                termination = Termination::Cancelled;
                break;
            }

            started += 1;
            info!(step = step.name(), "running step");
            if let Err(e) = step.run(ctx).await {
                error!(step = step.name(), error = %e, "step failed, halting build");
                termination = Termination::Halted;
                failure = Some(e);
                break;
            }

            if cancel.load(Ordering::SeqCst) {
                warn!(step = step.name(), "build cancelled");
                termination = Termination::Cancelled;
                break;
            }
        }

        let mut cleanup_errors = Vec::new();
        for step in self.steps[..started].iter().rev() {
            if let Err(e) = step.cleanup(ctx, termination).await {
                error!(step = step.name(), error = %e, "cleanup failed");
                cleanup_errors.push((step.name(), e));
            }
        }

        RunReport {
            termination,
            error: failure,
            cleanup_errors,
        }
    }
}
