//! Observers of task lifecycle events.
//!
//! An [`Instrument`] is told about every lifecycle event it registered for
//! (see [`TaskEvent`]). Hooks only receive shared references to the task,
//! so an instrument can record whatever it wants but cannot steer the
//! schedule. The machine owns its instruments; read them back after a
//! run with [`Machine::instrument`](crate::machine::Machine::instrument).

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use crate::task::{Task, TaskEvent, TaskId};
use crate::time::Time;

/// Observer hooks. Every hook defaults to a no-op.
///
/// # Example
///
/// ```rust
/// use collsim::instrument::Instrument;
/// use collsim::task::Task;
/// use collsim::time::Time;
///
/// #[derive(Default)]
/// struct CountExecuted(usize);
///
/// impl Instrument for CountExecuted {
///     fn on_executed(&mut self, _task: &Task, _time: Time) {
///         self.0 += 1;
///     }
///     fn as_any(&self) -> &dyn std::any::Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
/// }
/// ```
pub trait Instrument {
    /// `task` became ready at `time`; `arrivals` are the completion times
    /// of the predecessors that made it ready, in arrival order.
    fn on_loaded(&mut self, _task: &Task, _time: Time, _arrivals: &[Time]) {}

    /// `task` was popped at `time` but its node is busy until `earliest`.
    fn on_delayed(&mut self, _task: &Task, _time: Time, _earliest: Time) {}

    /// `task` starts executing at `time`.
    fn on_executed(&mut self, _task: &Task, _time: Time) {}

    /// `task` finished; `time` is the completion propagated to successors.
    fn on_completed(&mut self, _task: &Task, _time: Time) {}

    /// Downcast support for [`InstrumentSet::get`].
    fn as_any(&self) -> &dyn Any;
    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Handle returned when an instrument is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrumentId(usize);

impl InstrumentId {
    /// The id of the `index`-th registered instrument.
    pub fn from_index(index: usize) -> Self {
        InstrumentId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

// ── InstrumentSet ─────────────────────────────────────────────────────

struct Registration {
    events: BTreeSet<TaskEvent>,
    instrument: Box<dyn Instrument>,
}

/// Instruments in registration order, each with the events it observes.
#[derive(Default)]
pub struct InstrumentSet {
    registered: Vec<Registration>,
}

impl InstrumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instrument` for `events`.
    pub fn register<I>(&mut self, events: I, instrument: Box<dyn Instrument>) -> InstrumentId
    where
        I: IntoIterator<Item = TaskEvent>,
    {
        let id = InstrumentId(self.registered.len());
        self.registered.push(Registration {
            events: events.into_iter().collect(),
            instrument,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Downcast a registered instrument.
    ///
    /// Returns `None` for an unknown id or the wrong type.
    pub fn get<T: Instrument + 'static>(&self, id: InstrumentId) -> Option<&T> {
        self.registered
            .get(id.0)?
            .instrument
            .as_any()
            .downcast_ref::<T>()
    }

    /// Downcast a registered instrument mutably.
    pub fn get_mut<T: Instrument + 'static>(&mut self, id: InstrumentId) -> Option<&mut T> {
        self.registered
            .get_mut(id.0)?
            .instrument
            .as_any_mut()
            .downcast_mut::<T>()
    }

    fn observers(&mut self, event: TaskEvent) -> impl Iterator<Item = &mut Box<dyn Instrument>> {
        self.registered
            .iter_mut()
            .filter(move |r| r.events.contains(&event))
            .map(|r| &mut r.instrument)
    }

    pub(crate) fn loaded(&mut self, task: &Task, time: Time, arrivals: &[Time]) {
        for instrument in self.observers(TaskEvent::Loaded) {
            instrument.on_loaded(task, time, arrivals);
        }
    }

    pub(crate) fn delayed(&mut self, task: &Task, time: Time, earliest: Time) {
        for instrument in self.observers(TaskEvent::Delayed) {
            instrument.on_delayed(task, time, earliest);
        }
    }

    pub(crate) fn executed(&mut self, task: &Task, time: Time) {
        for instrument in self.observers(TaskEvent::Executed) {
            instrument.on_executed(task, time);
        }
    }

    pub(crate) fn completed(&mut self, task: &Task, time: Time) {
        for instrument in self.observers(TaskEvent::Completed) {
            instrument.on_completed(task, time);
        }
    }
}

impl std::fmt::Debug for InstrumentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.registered.iter().map(|r| &r.events))
            .finish()
    }
}

// ── Recorder ──────────────────────────────────────────────────────────

/// Records when each task started and completed, keyed by task name.
///
/// Register it for [`TaskEvent::Executed`] and [`TaskEvent::Completed`].
/// Values from earlier runs are overwritten by later ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recorder {
    started: BTreeMap<String, Time>,
    completed: BTreeMap<String, Time>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self, task: &str) -> Option<Time> {
        self.started.get(task).copied()
    }

    pub fn completed(&self, task: &str) -> Option<Time> {
        self.completed.get(task).copied()
    }

    /// All completion times in task-name order.
    pub fn completions(&self) -> &BTreeMap<String, Time> {
        &self.completed
    }

    pub fn clear(&mut self) {
        self.started.clear();
        self.completed.clear();
    }
}

impl Instrument for Recorder {
    fn on_executed(&mut self, task: &Task, time: Time) {
        self.started.insert(task.name().to_string(), time);
    }

    fn on_completed(&mut self, task: &Task, time: Time) {
        self.completed.insert(task.name().to_string(), time);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── BandwidthInstrument ───────────────────────────────────────────────

/// Measures achieved bandwidth over Put and Get tasks: bytes moved per
/// tick spent transferring them.
///
/// Register it for [`TaskEvent::Executed`] and [`TaskEvent::Completed`].
#[derive(Debug, Clone, Default)]
pub struct BandwidthInstrument {
    in_flight: BTreeMap<TaskId, Time>,
    bytes: u64,
    ticks: u64,
    transfers: usize,
}

impl BandwidthInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes moved by completed transfers.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Total ticks spent in completed transfers.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn transfers(&self) -> usize {
        self.transfers
    }

    /// Bytes per tick, or `None` before any transfer took time.
    pub fn bandwidth(&self) -> Option<f64> {
        if self.ticks == 0 {
            return None;
        }
        Some(self.bytes as f64 / self.ticks as f64)
    }
}

impl Instrument for BandwidthInstrument {
    fn on_executed(&mut self, task: &Task, time: Time) {
        if task.target().is_some() {
            self.in_flight.insert(task.id(), time);
        }
    }

    fn on_completed(&mut self, task: &Task, time: Time) {
        if let Some(start) = self.in_flight.remove(&task.id()) {
            self.bytes += task.transferred_bytes();
            self.ticks += time.duration_since(start).unwrap_or(0);
            self.transfers += 1;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── EventTrace ────────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// One observed lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub event: TaskEvent,
    pub task: TaskId,
    pub name: String,
    pub time: Time,
}

/// Append-only log of every observed lifecycle event.
///
/// Two runs of the same program with the same models produce identical
/// traces and therefore identical [`EventTrace::trace_hash`] values.
#[derive(Debug, Clone, Default)]
pub struct EventTrace {
    entries: Vec<TraceEntry>,
}

impl EventTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one kind, in observation order.
    pub fn of(&self, event: TaskEvent) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.event == event)
    }

    /// Deterministic hash of the whole trace.
    pub fn trace_hash(&self) -> u64 {
        self.entries.iter().fold(0, |h, e| {
            let h = hash_combine(h, e.event as u64);
            let h = hash_combine(h, e.task.raw());
            hash_combine(h, e.time.ticks())
        })
    }

    fn push(&mut self, event: TaskEvent, task: &Task, time: Time) {
        self.entries.push(TraceEntry {
            event,
            task: task.id(),
            name: task.name().to_string(),
            time,
        });
    }
}

impl Instrument for EventTrace {
    fn on_loaded(&mut self, task: &Task, time: Time, _arrivals: &[Time]) {
        self.push(TaskEvent::Loaded, task, time);
    }

    fn on_delayed(&mut self, task: &Task, _time: Time, earliest: Time) {
        self.push(TaskEvent::Delayed, task, earliest);
    }

    fn on_executed(&mut self, task: &Task, time: Time) {
        self.push(TaskEvent::Executed, task, time);
    }

    fn on_completed(&mut self, task: &Task, time: Time) {
        self.push(TaskEvent::Completed, task, time);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;

    fn tasks() -> Program {
        let mut prog = Program::new();
        prog.add_node(Task::start("s0", 0));
        prog.add_node(Task::put("p", 0, 1, 100));
        prog
    }

    #[test]
    fn test_only_registered_events_are_delivered() {
        let prog = tasks();
        let p = prog.get("p").unwrap();
        let mut set = InstrumentSet::new();
        let id = set.register([TaskEvent::Executed], Box::new(EventTrace::new()));

        set.loaded(p, Time::ZERO, &[Time::ZERO]);
        set.executed(p, Time::new(1));
        set.completed(p, Time::new(2));

        let trace = set.get::<EventTrace>(id).unwrap();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.entries()[0].event, TaskEvent::Executed);
    }

    #[test]
    fn test_downcast_wrong_type_is_none() {
        let mut set = InstrumentSet::new();
        let id = set.register(TaskEvent::ALL, Box::new(Recorder::new()));
        assert!(set.get::<EventTrace>(id).is_none());
        assert!(set.get::<Recorder>(id).is_some());
        assert!(set.get_mut::<Recorder>(id).is_some());
        assert!(set.get::<Recorder>(InstrumentId(9)).is_none());
    }

    #[test]
    fn test_multiple_instruments_per_event() {
        let prog = tasks();
        let s0 = prog.get("s0").unwrap();
        let mut set = InstrumentSet::new();
        let a = set.register([TaskEvent::Completed], Box::new(Recorder::new()));
        let b = set.register(TaskEvent::ALL, Box::new(Recorder::new()));
        set.completed(s0, Time::new(4));
        assert_eq!(set.get::<Recorder>(a).unwrap().completed("s0"), Some(Time::new(4)));
        assert_eq!(set.get::<Recorder>(b).unwrap().completed("s0"), Some(Time::new(4)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_bandwidth_counts_transfers_only() {
        let prog = tasks();
        let mut bw = BandwidthInstrument::new();
        assert!(bw.bandwidth().is_none());

        let s0 = prog.get("s0").unwrap();
        bw.on_executed(s0, Time::ZERO);
        bw.on_completed(s0, Time::new(10));
        assert_eq!(bw.transfers(), 0);

        let p = prog.get("p").unwrap();
        bw.on_executed(p, Time::new(10));
        bw.on_completed(p, Time::new(60));
        assert_eq!(bw.bytes(), 100);
        assert_eq!(bw.ticks(), 50);
        assert_eq!(bw.bandwidth(), Some(2.0));
    }

    #[test]
    fn test_trace_hash_is_order_sensitive() {
        let prog = tasks();
        let s0 = prog.get("s0").unwrap();
        let p = prog.get("p").unwrap();

        let mut a = EventTrace::new();
        a.on_executed(s0, Time::ZERO);
        a.on_executed(p, Time::ZERO);

        let mut b = EventTrace::new();
        b.on_executed(p, Time::ZERO);
        b.on_executed(s0, Time::ZERO);

        assert_ne!(a.trace_hash(), b.trace_hash());
        assert_eq!(a.of(TaskEvent::Executed).count(), 2);
    }

    #[test]
    fn test_hash_combine_deterministic() {
        assert_eq!(hash_combine(1, 2), hash_combine(1, 2));
        assert_ne!(hash_combine(1, 2), hash_combine(2, 1));
    }
}
