//! The machine: runs a [`Program`] on `nodes × processes` simulated
//! process slots under pluggable cost models.
//!
//! [`Machine::run`] seeds the queue with every Start task at time zero,
//! then repeatedly pops the earliest planned task, checks whether its
//! node has a free slot, and either re-plans it for when the slot frees
//! up or executes it. Executing a task commits its completion time to
//! the chosen slot and plans a completion entry at that time; popping
//! the completion releases the successors whose trigger policy is now
//! satisfied. The loop is synchronous and single-threaded, so equal
//! inputs always produce equal schedules.

mod builder;
mod run_state;


pub use builder::MachineBuilder;

use tracing::{debug, info, trace, warn};

use crate::canvas::Canvas;
use crate::compute::ComputeModel;
use crate::error::{SimError, SimResult};
use crate::instrument::{Instrument, InstrumentId, InstrumentSet};
use crate::network::NetworkModel;
use crate::program::Program;
use crate::queue::{PlannedTask, PriorityQueue, Stage};
use crate::task::{NodeIndex, SleepSpec, Task, TaskEvent, TaskKind};
use crate::time::Time;

use run_state::RunState;

// ── Configuration ─────────────────────────────────────────────────────

/// Shape of the simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MachineConfig {
    /// Number of nodes (hosts).
    pub nodes: usize,
    /// Process slots per node.
    pub processes: usize,
}

impl MachineConfig {
    pub fn new(nodes: usize, processes: usize) -> Self {
        MachineConfig { nodes, processes }
    }

    /// Both dimensions must be at least one.
    pub fn validate(&self) -> SimResult<()> {
        if self.nodes == 0 {
            return Err(SimError::InvalidConfig("machine needs at least one node".into()));
        }
        if self.processes == 0 {
            return Err(SimError::InvalidConfig(
                "machine needs at least one process per node".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig::new(1, 1)
    }
}

// ── RunReport ─────────────────────────────────────────────────────────

/// Outcome of one [`Machine::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    /// Latest time anything happened: every committed slot time and the
    /// arrival of every non-blocking Put.
    pub maximum_time: Time,
    /// Execution pops, delayed ones included. Completion pops are not
    /// counted.
    pub events_processed: u64,
    pub tasks_executed: u64,
    /// Times a task was re-planned because its node was busy.
    pub delays: u64,
    /// Final `node_times[node][process]` grid.
    pub node_times: Vec<Vec<Time>>,
}

// ── Machine ───────────────────────────────────────────────────────────

/// Discrete-event executor for dataflow programs.
///
/// # Example
///
/// ```rust
/// use collsim::compute::FixedTime;
/// use collsim::machine::Machine;
/// use collsim::network::LatencyBandwidth;
/// use collsim::generators;
///
/// let program = generators::pingpong(0, 1).unwrap();
/// let mut machine = Machine::builder()
///     .nodes(2)
///     .compute(FixedTime::new(0))
///     .network(LatencyBandwidth::new(1000, 0.0).unwrap())
///     .build()
///     .unwrap();
/// let report = machine.run(&program).unwrap();
/// assert_eq!(report.maximum_time.ticks(), 2000);
/// ```
pub struct Machine {
    config: MachineConfig,
    compute: Box<dyn ComputeModel>,
    network: Box<dyn NetworkModel>,
    canvas: Option<Box<dyn Canvas>>,
    instruments: InstrumentSet,
    last_report: Option<RunReport>,
}

impl Machine {
    /// Create a machine with the given shape and cost models.
    pub fn new(
        config: MachineConfig,
        compute: impl ComputeModel + 'static,
        network: impl NetworkModel + 'static,
    ) -> SimResult<Self> {
        Self::from_parts(config, Box::new(compute), Box::new(network))
    }

    /// Start a fluent [`MachineBuilder`].
    pub fn builder() -> MachineBuilder {
        MachineBuilder::new()
    }

    pub(crate) fn from_parts(
        config: MachineConfig,
        compute: Box<dyn ComputeModel>,
        network: Box<dyn NetworkModel>,
    ) -> SimResult<Self> {
        config.validate()?;
        Ok(Machine {
            config,
            compute,
            network,
            canvas: None,
            instruments: InstrumentSet::new(),
            last_report: None,
        })
    }

    // ── Collaborators ─────────────────────────────────────────────

    /// Attach a canvas; it replaces any previous one.
    pub fn set_canvas(&mut self, canvas: Box<dyn Canvas>) {
        self.canvas = Some(canvas);
    }

    /// Downcast the attached canvas.
    pub fn canvas<T: Canvas + 'static>(&self) -> Option<&T> {
        self.canvas.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Detach and return the canvas.
    pub fn take_canvas(&mut self) -> Option<Box<dyn Canvas>> {
        self.canvas.take()
    }

    /// Register an instrument for the given lifecycle events.
    pub fn register_instrument<I>(
        &mut self,
        events: I,
        instrument: Box<dyn Instrument>,
    ) -> InstrumentId
    where
        I: IntoIterator<Item = TaskEvent>,
    {
        self.instruments.register(events, instrument)
    }

    /// Downcast a registered instrument.
    pub fn instrument<T: Instrument + 'static>(&self, id: InstrumentId) -> Option<&T> {
        self.instruments.get::<T>(id)
    }

    /// Downcast a registered instrument mutably (e.g. to clear it
    /// between runs).
    pub fn instrument_mut<T: Instrument + 'static>(&mut self, id: InstrumentId) -> Option<&mut T> {
        self.instruments.get_mut::<T>(id)
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn config(&self) -> MachineConfig {
        self.config
    }

    pub fn nodes(&self) -> usize {
        self.config.nodes
    }

    pub fn processes(&self) -> usize {
        self.config.processes
    }

    /// Report of the most recent successful run.
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Maximum time of the most recent successful run, zero before any.
    pub fn maximum_time(&self) -> Time {
        self.last_report
            .as_ref()
            .map_or(Time::ZERO, |report| report.maximum_time)
    }

    /// Final slot time of `process` on `node` after the most recent run.
    pub fn node_process_time(&self, node: NodeIndex, process: usize) -> Option<Time> {
        self.last_report
            .as_ref()?
            .node_times
            .get(node)?
            .get(process)
            .copied()
    }

    // ── Run ───────────────────────────────────────────────────────

    /// Execute `program` to completion.
    ///
    /// All run bookkeeping is created here and dropped on return, so
    /// repeated runs are independent as far as the machine is concerned.
    /// Cost models and instruments keep whatever state they own.
    pub fn run(&mut self, program: &Program) -> SimResult<RunReport> {
        let MachineConfig { nodes, processes } = self.config;

        let required = program.process_count();
        if required > nodes {
            return Err(SimError::InsufficientNodes { required, nodes });
        }
        program.validate(nodes)?;

        info!(
            tasks = program.len(),
            edges = program.edge_count(),
            nodes,
            processes,
            "starting run"
        );

        let mut state = RunState::new(nodes, processes);
        let mut queue = PriorityQueue::new();
        queue.push_batch(Time::ZERO, program.start_tasks());

        while let Some(PlannedTask { time, stage, task }) = queue.pop() {
            if stage == Stage::Completion {
                self.propagate(&mut state, &mut queue, program, task, time)?;
                continue;
            }
            state.events_processed += 1;

            let (earliest, process) = state.availability(task.node(), task.is_concurrent());
            if earliest > time && !task.is_proxy() {
                trace!(task = task.name(), %time, %earliest, "node busy, delaying");
                state.delays += 1;
                queue.push(earliest, task);
                self.instruments.delayed(task, time, earliest);
                continue;
            }

            self.instruments.executed(task, time);
            let completion = self.execute(&mut state, time, task, process)?;
            state.tasks_executed += 1;
            debug!(
                task = task.name(),
                kind = task.kind().name(),
                node = task.node(),
                process,
                %time,
                %completion,
                "executed"
            );
            self.instruments.completed(task, completion);

            if program.out_degree(task.name()) == 0 {
                if !task.is_proxy() {
                    return Err(SimError::NonProxySink(task.name().to_string()));
                }
            } else {
                queue.push_completion(completion, task);
            }
        }

        for name in state.starved() {
            warn!(task = name, "task never became ready");
        }

        let report = state.into_report();
        info!(
            maximum_time = %report.maximum_time,
            tasks_executed = report.tasks_executed,
            delays = report.delays,
            "run finished"
        );
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Record that `task` completed at `time` with each of its successors
    /// and plan the ones whose trigger policy is now satisfied.
    ///
    /// Completions pop in time order, so the arrivals a quorum sees are
    /// always the earliest ones.
    fn propagate<'p>(
        &mut self,
        state: &mut RunState<'p>,
        queue: &mut PriorityQueue<'p>,
        program: &'p Program,
        task: &'p Task,
        time: Time,
    ) -> SimResult<()> {
        for name in program.successors(task.name()) {
            let successor = program.task(name)?;
            let ready = state.arrive(
                successor.name(),
                program.in_degree(name),
                program.trigger(name),
                time,
            )?;
            if let Some(ready) = ready {
                debug!(task = name.as_str(), time = %ready.trigger_time, "loaded");
                self.instruments
                    .loaded(successor, ready.trigger_time, &ready.arrivals);
                queue.push(ready.trigger_time, successor);
            }
        }
        Ok(())
    }

    /// Run the handler for `task`, commit its slot time and return the
    /// completion time propagated to its successors.
    fn execute(
        &mut self,
        state: &mut RunState<'_>,
        time: Time,
        task: &Task,
        process: usize,
    ) -> SimResult<Time> {
        let node = task.node();
        let canvas = match self.canvas.as_deref_mut() {
            Some(canvas) if task.is_drawable() => Some(canvas),
            _ => None,
        };

        let completion = match *task.kind() {
            TaskKind::Start { skew } => {
                let start = time.plus(skew);
                state.commit(node, process, start);
                if let Some(canvas) = canvas {
                    canvas.draw_start_task(node, start);
                }
                start
            }

            TaskKind::Proxy => {
                let slot = state.slot(node, process).max(time);
                state.commit(node, process, slot);
                time
            }

            TaskKind::Sleep(spec) => {
                let end = match spec {
                    SleepSpec::Delay(delay) => time.plus(delay),
                    SleepSpec::Until(until) if until > time => until,
                    SleepSpec::Until(until) => {
                        return Err(SimError::NonCausalEvent {
                            task: task.name().to_string(),
                            requested: until,
                            current: time,
                        })
                    }
                };
                state.commit(node, process, end);
                if let Some(canvas) = canvas {
                    canvas.draw_sleep_task(node, time, end);
                }
                end
            }

            TaskKind::Compute { .. } => {
                let end = self.compute.evaluate(time, task)?;
                state.commit(node, process, end);
                if let Some(canvas) = canvas {
                    canvas.draw_compute_task(node, time, end);
                }
                end
            }

            TaskKind::Put {
                target, blocking, ..
            } => {
                let times = self.network.evaluate(time, task)?;
                if blocking {
                    state.commit(node, process, times.remote);
                    if let Some(canvas) = canvas {
                        canvas.draw_blocking_put_task(node, target, time, times.remote);
                    }
                    times.remote
                } else {
                    state.commit(node, process, times.local);
                    state.raise(times.remote);
                    if let Some(canvas) = canvas {
                        canvas.draw_non_blocking_put_task(
                            node,
                            target,
                            time,
                            times.local,
                            times.remote,
                        );
                    }
                    times.local
                }
            }

            TaskKind::Get { blocking, .. } => {
                let times = self.network.evaluate(time, task)?;
                if blocking {
                    state.commit(node, process, times.remote);
                    times.remote
                } else {
                    state.commit(node, process, times.local);
                    state.raise(times.remote);
                    times.local
                }
            }
        };

        Ok(completion)
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("compute", &self.compute.name())
            .field("network", &self.network.name())
            .field("canvas", &self.canvas.is_some())
            .field("instruments", &self.instruments)
            .field("last_report", &self.last_report)
            .finish()
    }
}
