//! Compute cost models.
//!
//! A [`ComputeModel`] prices Compute tasks. Tasks carrying a fixed
//! duration ([`Work::Time`]) are never priced: they finish exactly that
//! many ticks after they start, whatever the model. Tasks carrying a size
//! go through [`ComputeModel::duration`].

use crate::error::{SimError, SimResult};
use crate::noise::NoiseModel;
use crate::task::{Task, TaskKind, Work};
use crate::time::Time;

/// Prices the local computation of a task.
pub trait ComputeModel {
    /// Short model name, used in error messages.
    fn name(&self) -> &'static str;

    /// Ticks needed to process `size` units of work for `task`.
    fn duration(&mut self, task: &Task, size: u64) -> u64;

    /// Completion time of `task` when it starts at `time`.
    ///
    /// Fails with [`SimError::UnsupportedTaskType`] for anything but a
    /// Compute task.
    fn evaluate(&mut self, time: Time, task: &Task) -> SimResult<Time> {
        match task.kind() {
            TaskKind::Compute {
                work: Work::Time(ticks),
            } => Ok(time.plus(*ticks)),
            TaskKind::Compute {
                work: Work::Size(size),
            } => {
                let ticks = self.duration(task, *size);
                Ok(time.plus(ticks))
            }
            _ => Err(SimError::UnsupportedTaskType {
                task: task.name().to_string(),
                model: self.name(),
            }),
        }
    }
}

impl<M: ComputeModel + ?Sized> ComputeModel for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn duration(&mut self, task: &Task, size: u64) -> u64 {
        (**self).duration(task, size)
    }

    fn evaluate(&mut self, time: Time, task: &Task) -> SimResult<Time> {
        (**self).evaluate(time, task)
    }
}

// ── FixedTime ─────────────────────────────────────────────────────────

/// Every sized Compute task takes the same number of ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedTime {
    ticks: u64,
}

impl FixedTime {
    pub fn new(ticks: u64) -> Self {
        FixedTime { ticks }
    }
}

impl ComputeModel for FixedTime {
    fn name(&self) -> &'static str {
        "FixedTime"
    }

    fn duration(&mut self, _task: &Task, _size: u64) -> u64 {
        self.ticks
    }
}

// ── Linear ────────────────────────────────────────────────────────────

/// Duration grows linearly with size: `floor(size * gamma)` ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    gamma: f64,
}

impl Linear {
    /// `gamma` is the cost of one unit of work in ticks. Must be finite
    /// and non-negative.
    pub fn new(gamma: f64) -> SimResult<Self> {
        if !gamma.is_finite() || gamma < 0.0 {
            return Err(SimError::InvalidModel(format!(
                "linear compute rate must be non-negative, got {}",
                gamma
            )));
        }
        Ok(Linear { gamma })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl ComputeModel for Linear {
    fn name(&self) -> &'static str {
        "Linear"
    }

    fn duration(&mut self, _task: &Task, size: u64) -> u64 {
        (size as f64 * self.gamma).floor() as u64
    }
}

// ── NoisyCompute ──────────────────────────────────────────────────────

/// Wraps another compute model and adds sampled noise to each priced
/// duration. Fixed-duration tasks are left untouched.
#[derive(Debug, Clone)]
pub struct NoisyCompute<M, N> {
    inner: M,
    noise: N,
}

impl<M: ComputeModel, N: NoiseModel> NoisyCompute<M, N> {
    pub fn new(inner: M, noise: N) -> Self {
        NoisyCompute { inner, noise }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: ComputeModel, N: NoiseModel> ComputeModel for NoisyCompute<M, N> {
    fn name(&self) -> &'static str {
        "NoisyCompute"
    }

    fn duration(&mut self, task: &Task, size: u64) -> u64 {
        let base = self.inner.duration(task, size);
        base.saturating_add(self.noise.sample(base))
    }
}
