//! Repeated runs of one program for statistics over stochastic models.
//!
//! Every sample runs on a freshly built machine: the factory receives the
//! sample index and is expected to seed its noise models from it, so a
//! batch is reproducible and its samples are independent.

use tracing::debug;

use crate::error::SimResult;
use crate::machine::Machine;
use crate::program::Program;
use crate::time::Time;

/// Maximum times of a batch of runs, in sample order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Samples {
    times: Vec<Time>,
}

impl Samples {
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn min(&self) -> Option<Time> {
        self.times.iter().copied().min()
    }

    pub fn max(&self) -> Option<Time> {
        self.times.iter().copied().max()
    }

    /// Arithmetic mean in ticks.
    pub fn mean(&self) -> Option<f64> {
        if self.times.is_empty() {
            return None;
        }
        let total: f64 = self.times.iter().map(|t| t.ticks() as f64).sum();
        Some(total / self.times.len() as f64)
    }
}

impl FromIterator<Time> for Samples {
    fn from_iter<I: IntoIterator<Item = Time>>(iter: I) -> Self {
        Samples {
            times: iter.into_iter().collect(),
        }
    }
}

/// Run `program` `samples` times, each on `factory(index)`.
///
/// Stops at the first failing build or run.
pub fn sample<F>(program: &Program, samples: usize, mut factory: F) -> SimResult<Samples>
where
    F: FnMut(u64) -> SimResult<Machine>,
{
    let mut times = Vec::with_capacity(samples);
    for index in 0..samples as u64 {
        let mut machine = factory(index)?;
        let report = machine.run(program)?;
        debug!(sample = index, maximum_time = %report.maximum_time, "sample done");
        times.push(report.maximum_time);
    }
    Ok(Samples { times })
}
