//! Per-run bookkeeping: the node×process time grid and the dependency
//! and quorum records of tasks waiting on their predecessors.
//!
//! A `RunState` is built at the top of [`Machine::run`](super::Machine::run)
//! and dropped when it returns; nothing in it outlives one run.

use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};
use crate::task::{NodeIndex, Trigger};
use crate::time::Time;

use super::RunReport;

/// Arrivals recorded for a task that is not ready yet.
#[derive(Debug, Default)]
struct Pending {
    fulfilled: usize,
    arrivals: Vec<Time>,
}

/// A successor that just became ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ready {
    pub trigger_time: Time,
    pub arrivals: Vec<Time>,
}

#[derive(Debug)]
pub(crate) struct RunState<'p> {
    node_times: Vec<Vec<Time>>,
    pending: BTreeMap<&'p str, Pending>,
    /// Predecessors still expected by tasks an `AnyOf` quorum already
    /// loaded. Their completions are absorbed here.
    residual: BTreeMap<&'p str, usize>,
    maximum: Time,
    pub events_processed: u64,
    pub tasks_executed: u64,
    pub delays: u64,
}

impl<'p> RunState<'p> {
    pub fn new(nodes: usize, processes: usize) -> Self {
        RunState {
            node_times: vec![vec![Time::ZERO; processes]; nodes],
            pending: BTreeMap::new(),
            residual: BTreeMap::new(),
            maximum: Time::ZERO,
            events_processed: 0,
            tasks_executed: 0,
            delays: 0,
        }
    }

    /// When a task on `node` could start, and on which process.
    ///
    /// Concurrent tasks take the earliest free slot (lowest index on
    /// ties). Other tasks need the whole node and run on process 0.
    pub fn availability(&self, node: NodeIndex, concurrent: bool) -> (Time, usize) {
        let slots = &self.node_times[node];
        if concurrent {
            let mut best = (slots[0], 0);
            for (process, &slot) in slots.iter().enumerate().skip(1) {
                if slot < best.0 {
                    best = (slot, process);
                }
            }
            best
        } else {
            let latest = slots.iter().copied().max().unwrap_or(Time::ZERO);
            (latest, 0)
        }
    }

    pub fn slot(&self, node: NodeIndex, process: usize) -> Time {
        self.node_times[node][process]
    }

    /// Commit a completion time to a slot.
    pub fn commit(&mut self, node: NodeIndex, process: usize, time: Time) {
        self.node_times[node][process] = time;
        self.raise(time);
    }

    /// Raise the run's maximum time without touching any slot.
    pub fn raise(&mut self, time: Time) {
        self.maximum = self.maximum.max(time);
    }

    pub fn maximum(&self) -> Time {
        self.maximum
    }

    /// Record that one predecessor of `task` completed at `time`.
    ///
    /// Returns the trigger time and the recorded arrivals once the
    /// trigger policy is satisfied; the task's records are dropped then.
    pub fn arrive(
        &mut self,
        task: &'p str,
        in_degree: usize,
        trigger: Trigger,
        time: Time,
    ) -> SimResult<Option<Ready>> {
        if let Some(left) = self.residual.get_mut(task) {
            *left -= 1;
            if *left == 0 {
                self.residual.remove(task);
            }
            return Ok(None);
        }

        let pending = self.pending.entry(task).or_default();
        pending.fulfilled += 1;
        pending.arrivals.push(time);
        if pending.fulfilled > in_degree {
            return Err(SimError::DependencyOverflow {
                task: task.to_string(),
                fulfilled: pending.fulfilled,
                in_degree,
            });
        }

        let trigger_time = match trigger {
            Trigger::All if pending.fulfilled == in_degree => {
                pending.arrivals.iter().copied().max()
            }
            Trigger::AnyOf(k) if k > 0 && pending.fulfilled >= k => {
                let mut sorted = pending.arrivals.clone();
                sorted.sort_unstable();
                sorted.get(k - 1).copied()
            }
            _ => None,
        };
        let Some(trigger_time) = trigger_time else {
            return Ok(None);
        };

        let fulfilled = pending.fulfilled;
        let arrivals = self
            .pending
            .remove(task)
            .map(|p| p.arrivals)
            .unwrap_or_default();
        if fulfilled < in_degree {
            self.residual.insert(task, in_degree - fulfilled);
        }
        Ok(Some(Ready {
            trigger_time,
            arrivals,
        }))
    }

    /// Tasks that received some but not enough arrivals.
    pub fn starved(&self) -> impl Iterator<Item = &'p str> + '_ {
        self.pending.keys().copied()
    }

    pub fn into_report(self) -> RunReport {
        RunReport {
            maximum_time: self.maximum,
            events_processed: self.events_processed,
            tasks_executed: self.tasks_executed,
            delays: self.delays,
            node_times: self.node_times,
        }
    }
}
