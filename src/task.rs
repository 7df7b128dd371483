//! Task model for the dataflow program.
//!
//! Every unit of simulated work or communication is a `Task`. Tasks are
//! immutable once added to a [`Program`](crate::program::Program); the
//! program stamps each one with a [`TaskId`] that the priority queue uses
//! to break ties between events scheduled at the same time.

use crate::time::Time;

/// Index of a simulated node (host) inside the machine.
pub type NodeIndex = usize;

/// Default size of the request message a Get sends before the retrieval.
pub const DEFAULT_COMMAND_SIZE: u64 = 8;

// ── Task ID ───────────────────────────────────────────────────────────

/// A strictly increasing task identifier, unique within one program.
///
/// Two tasks planned at the same [`Time`] are ordered by their `TaskId`,
/// which corresponds to the order they were added to the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw u64 into a `TaskId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        TaskId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Task ID Generator ────────────────────────────────────────────────

/// Deterministic, strictly increasing task-ID generator.
///
/// Each `Program` owns exactly one of these; there is no process-wide
/// counter, so building the same program twice yields the same ids.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskIdGen {
    next: u64,
}

impl TaskIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        TaskIdGen { next: 0 }
    }

    /// Mint the next task ID.
    pub fn next_id(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next += 1;
        id
    }
}

// ── Payloads ──────────────────────────────────────────────────────────

/// How much work a Compute or Put task carries: either a size the cost
/// model prices, or a fixed duration that bypasses the model's rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Work {
    /// Amount of data (bytes, flops, ...) priced by the cost model.
    Size(u64),
    /// Fixed duration in ticks.
    Time(u64),
}

/// How long a Sleep task suspends its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SleepSpec {
    /// Sleep for a relative number of ticks.
    Delay(u64),
    /// Sleep until an absolute point in time.
    Until(Time),
}

/// The closed set of task variants and their payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskKind {
    /// Entry point of a logical process; `skew` delays its start.
    Start { skew: u64 },

    /// Local computation priced by the compute model.
    Compute { work: Work },

    /// One-sided send to `target`, priced by the network model.
    Put {
        target: NodeIndex,
        work: Work,
        blocking: bool,
    },

    /// One-sided fetch from `target`: a command leg followed by a
    /// retrieval leg.
    Get {
        target: NodeIndex,
        command_size: u64,
        retrieval_size: u64,
        blocking: bool,
    },

    /// Suspends the process for a delay or until a time.
    Sleep(SleepSpec),

    /// Zero-cost synchronization point; every sink of a program is one.
    Proxy,
}

impl TaskKind {
    /// Short variant name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Start { .. } => "start",
            TaskKind::Compute { .. } => "compute",
            TaskKind::Put { .. } => "put",
            TaskKind::Get { .. } => "get",
            TaskKind::Sleep(_) => "sleep",
            TaskKind::Proxy => "proxy",
        }
    }
}

// ── Task ──────────────────────────────────────────────────────────────

/// A single node of the program DAG.
///
/// Constructed with one of the variant constructors and refined with the
/// chainable modifiers:
///
/// ```rust
/// use collsim::task::Task;
///
/// let put = Task::put("p0", 0, 1, 1024).non_blocking().concurrent();
/// assert!(put.is_concurrent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    id: TaskId,
    name: String,
    node: NodeIndex,
    concurrent: bool,
    drawable: bool,
    kind: TaskKind,
}

impl Task {
    fn with_kind(name: impl Into<String>, node: NodeIndex, kind: TaskKind) -> Self {
        Task {
            id: TaskId::default(),
            name: name.into(),
            node,
            concurrent: false,
            drawable: true,
            kind,
        }
    }

    /// A Start task with no skew.
    pub fn start(name: impl Into<String>, node: NodeIndex) -> Self {
        Self::with_kind(name, node, TaskKind::Start { skew: 0 })
    }

    /// A Compute task whose duration the compute model derives from `size`.
    pub fn compute(name: impl Into<String>, node: NodeIndex, size: u64) -> Self {
        Self::with_kind(name, node, TaskKind::Compute { work: Work::Size(size) })
    }

    /// A Compute task with a fixed duration.
    pub fn compute_for(name: impl Into<String>, node: NodeIndex, time: u64) -> Self {
        Self::with_kind(name, node, TaskKind::Compute { work: Work::Time(time) })
    }

    /// A blocking Put of `size` bytes to `target`.
    pub fn put(name: impl Into<String>, node: NodeIndex, target: NodeIndex, size: u64) -> Self {
        Self::with_kind(
            name,
            node,
            TaskKind::Put {
                target,
                work: Work::Size(size),
                blocking: true,
            },
        )
    }

    /// A blocking Put whose transfer takes a fixed `time`.
    pub fn put_for(
        name: impl Into<String>,
        node: NodeIndex,
        target: NodeIndex,
        time: u64,
    ) -> Self {
        Self::with_kind(
            name,
            node,
            TaskKind::Put {
                target,
                work: Work::Time(time),
                blocking: true,
            },
        )
    }

    /// A blocking Get retrieving `retrieval_size` bytes from `target`.
    pub fn get(
        name: impl Into<String>,
        node: NodeIndex,
        target: NodeIndex,
        retrieval_size: u64,
    ) -> Self {
        Self::with_kind(
            name,
            node,
            TaskKind::Get {
                target,
                command_size: DEFAULT_COMMAND_SIZE,
                retrieval_size,
                blocking: true,
            },
        )
    }

    /// Sleep for `delay` ticks.
    pub fn sleep(name: impl Into<String>, node: NodeIndex, delay: u64) -> Self {
        Self::with_kind(name, node, TaskKind::Sleep(SleepSpec::Delay(delay)))
    }

    /// Sleep until the absolute time `until`.
    pub fn sleep_until(name: impl Into<String>, node: NodeIndex, until: Time) -> Self {
        Self::with_kind(name, node, TaskKind::Sleep(SleepSpec::Until(until)))
    }

    /// A zero-cost Proxy task.
    pub fn proxy(name: impl Into<String>, node: NodeIndex) -> Self {
        Self::with_kind(name, node, TaskKind::Proxy)
    }

    // ── Modifiers ─────────────────────────────────────────────────

    /// Allow this task to run on any free process slot of its node.
    pub fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }

    /// Exclude this task from canvas drawing.
    pub fn hidden(mut self) -> Self {
        self.drawable = false;
        self
    }

    /// Set the start skew. No effect on other variants.
    pub fn with_skew(mut self, skew: u64) -> Self {
        if let TaskKind::Start { skew: s } = &mut self.kind {
            *s = skew;
        }
        self
    }

    /// Make a Put or Get non-blocking. No effect on other variants.
    pub fn non_blocking(mut self) -> Self {
        match &mut self.kind {
            TaskKind::Put { blocking, .. } | TaskKind::Get { blocking, .. } => *blocking = false,
            _ => {}
        }
        self
    }

    /// Set the request size of a Get. No effect on other variants.
    pub fn with_command_size(mut self, size: u64) -> Self {
        if let TaskKind::Get { command_size, .. } = &mut self.kind {
            *command_size = size;
        }
        self
    }

    pub(crate) fn assign_id(&mut self, id: TaskId) {
        self.id = id;
    }

    // ── Accessors ─────────────────────────────────────────────────

    /// Sequence id assigned by the owning program.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node this task executes on.
    #[inline]
    pub fn node(&self) -> NodeIndex {
        self.node
    }

    #[inline]
    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.drawable
    }

    #[inline]
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn is_start(&self) -> bool {
        matches!(self.kind, TaskKind::Start { .. })
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, TaskKind::Proxy)
    }

    /// The work carried by a Compute or Put task.
    pub fn work(&self) -> Option<Work> {
        match self.kind {
            TaskKind::Compute { work } | TaskKind::Put { work, .. } => Some(work),
            _ => None,
        }
    }

    /// The remote node of a Put or Get.
    pub fn target(&self) -> Option<NodeIndex> {
        match self.kind {
            TaskKind::Put { target, .. } | TaskKind::Get { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Bytes moved over the network by this task (0 for local tasks and
    /// for fixed-time transfers).
    pub fn transferred_bytes(&self) -> u64 {
        match self.kind {
            TaskKind::Put {
                work: Work::Size(size),
                ..
            } => size,
            TaskKind::Get {
                command_size,
                retrieval_size,
                ..
            } => command_size + retrieval_size,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}@N{}", self.kind.name(), self.name, self.node)
    }
}

// ── Trigger policy ────────────────────────────────────────────────────

/// When a task becomes ready, given how many of its predecessors have
/// completed. Attached to the consuming task, not to the edges' sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Trigger {
    /// Ready once every predecessor has completed; starts at the latest
    /// arrival.
    #[default]
    All,
    /// Ready once `k` predecessors have completed; starts at the k-th
    /// smallest arrival.
    AnyOf(usize),
}

// ── Lifecycle events ──────────────────────────────────────────────────

/// Points in a task's lifecycle that instruments can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskEvent {
    /// Dependencies satisfied; the task was planned into the queue.
    Loaded,
    /// The task's resources were busy; it was re-planned later.
    Delayed,
    /// The task started executing.
    Executed,
    /// The task finished; its completion is being propagated.
    Completed,
}

impl TaskEvent {
    /// Every lifecycle event, in lifecycle order.
    pub const ALL: [TaskEvent; 4] = [
        TaskEvent::Loaded,
        TaskEvent::Delayed,
        TaskEvent::Executed,
        TaskEvent::Completed,
    ];
}

impl std::fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskEvent::Loaded => "loaded",
            TaskEvent::Delayed => "delayed",
            TaskEvent::Executed => "executed",
            TaskEvent::Completed => "completed",
        };
        f.write_str(name)
    }
}
