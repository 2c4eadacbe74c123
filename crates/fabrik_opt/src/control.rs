//! Host-facing run control: progress reporting, cooperative cancellation,
//! and the deep-mode wall-clock deadline.
//!
//! The optimizer is single-threaded and cooperative. It polls the stop
//! predicate and the deadline only at batch and phase boundaries, so every
//! observable state is a complete, consistent layout.

use std::time::Instant;

/// A progress report emitted after each outer annealing batch.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Phase label (`"seeds"`, `"phase1"`, `"phase2"`, `"ports"`,
    /// `"polish"`).
    pub phase: &'static str,
    /// Best weighted total seen so far.
    pub best_total: f64,
    /// Inner iterations executed so far.
    pub iterations: u64,
}

/// Callbacks controlling a run. All optional.
#[derive(Default)]
pub struct OptimizeControl<'a> {
    /// Invoked after every outer batch with the current best.
    pub on_progress: Option<Box<dyn FnMut(&Progress) + 'a>>,
    /// Polled at batch boundaries; returning `true` stops the run with the
    /// best-so-far result.
    pub should_stop: Option<Box<dyn FnMut() -> bool + 'a>>,
}

impl<'a> OptimizeControl<'a> {
    /// Control with a progress callback only.
    pub fn with_progress(f: impl FnMut(&Progress) + 'a) -> Self {
        Self {
            on_progress: Some(Box::new(f)),
            should_stop: None,
        }
    }
}

/// Internal run state threaded through every phase.
pub(crate) struct ControlState<'a> {
    control: OptimizeControl<'a>,
    deadline: Option<Instant>,
    stopped: bool,
    /// Total inner iterations executed.
    pub iterations: u64,
}

impl<'a> ControlState<'a> {
    pub(crate) fn new(control: OptimizeControl<'a>, deadline: Option<Instant>) -> Self {
        Self {
            control,
            deadline,
            stopped: false,
            iterations: 0,
        }
    }

    /// Emits a progress report.
    pub(crate) fn emit(&mut self, phase: &'static str, best_total: f64) {
        if let Some(cb) = self.control.on_progress.as_mut() {
            cb(&Progress {
                phase,
                best_total,
                iterations: self.iterations,
            });
        }
    }

    /// Polls the stop predicate and deadline. Once false, stays false.
    pub(crate) fn should_continue(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.stopped = true;
                return false;
            }
        }
        if let Some(pred) = self.control.should_stop.as_mut() {
            if pred() {
                self.stopped = true;
                return false;
            }
        }
        true
    }
}
