//! Deterministic task queue.
//!
//! Uses a `BinaryHeap` with reversed `Ord` on `PlannedTask` to act as a
//! min-heap keyed by `(time, stage, task id)`. Task ids are assigned by the
//! program in insertion order, so two runs of the same program pop
//! equal-time entries in the same order regardless of how the program's
//! maps happen to iterate.
//!
//! A task enters the queue twice: once to be executed and once, at its
//! completion time, to release its successors. Completions pop before
//! executions planned for the same time, so every arrival up to `t` is
//! known before anything starts at `t`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::task::Task;
use crate::time::Time;

// ── Stage ─────────────────────────────────────────────────────────────

/// What popping a [`PlannedTask`] means for its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// The task finished at `time`; propagate to its successors.
    Completion,
    /// The task may start at `time` if its node has room.
    Execution,
}

// ── PlannedTask ───────────────────────────────────────────────────────

/// A queue entry: a task, the stage it is in and when that stage is due.
///
/// Borrows the task from the program being run.
#[derive(Debug, Clone, Copy)]
pub struct PlannedTask<'p> {
    pub time: Time,
    pub stage: Stage,
    pub task: &'p Task,
}

impl<'p> PlannedTask<'p> {
    pub fn new(time: Time, stage: Stage, task: &'p Task) -> Self {
        PlannedTask { time, stage, task }
    }

    fn key(&self) -> (Time, Stage, u64) {
        (self.time, self.stage, self.task.id().raw())
    }
}

impl PartialEq for PlannedTask<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PlannedTask<'_> {}

/// Ordering: smallest `(time, stage, id)` first.
///
/// Rust's `BinaryHeap` is a *max*-heap, so the natural ordering is
/// reversed here to turn it into a min-heap.
impl Ord for PlannedTask<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for PlannedTask<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── PriorityQueue ─────────────────────────────────────────────────────

/// Min-heap of planned tasks.
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue<'p> {
    heap: BinaryHeap<PlannedTask<'p>>,
}

impl<'p> PriorityQueue<'p> {
    /// Create a new, empty queue.
    pub fn new() -> Self {
        PriorityQueue {
            heap: BinaryHeap::new(),
        }
    }

    /// Plan `task` for execution at `time`.
    pub fn push(&mut self, time: Time, task: &'p Task) {
        self.heap.push(PlannedTask::new(time, Stage::Execution, task));
    }

    /// Plan every task in `tasks` for execution at the same `time`.
    pub fn push_batch<I>(&mut self, time: Time, tasks: I)
    where
        I: IntoIterator<Item = &'p Task>,
    {
        for task in tasks {
            self.push(time, task);
        }
    }

    /// Insert already planned entries.
    pub fn push_planned<I>(&mut self, planned: I)
    where
        I: IntoIterator<Item = PlannedTask<'p>>,
    {
        self.heap.extend(planned);
    }

    /// Announce that `task` completes at `time`.
    pub fn push_completion(&mut self, time: Time, task: &'p Task) {
        self.heap.push(PlannedTask::new(time, Stage::Completion, task));
    }

    /// Pop the next entry (earliest time, completions first, lowest id).
    ///
    /// Returns `None` when the queue is empty.
    pub fn pop(&mut self) -> Option<PlannedTask<'p>> {
        self.heap.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of planned entries.
    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;

    fn program(names: &[&str]) -> Program {
        let mut prog = Program::new();
        for name in names {
            prog.add_node(Task::proxy(*name, 0));
        }
        prog
    }

    fn drain<'p>(queue: &mut PriorityQueue<'p>) -> Vec<PlannedTask<'p>> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn test_fifo_at_same_time() {
        let prog = program(&["first", "second", "third"]);
        let mut queue = PriorityQueue::new();

        // Pushed out of id order on purpose.
        queue.push(Time::new(10), prog.get("third").unwrap());
        queue.push(Time::new(10), prog.get("first").unwrap());
        queue.push(Time::new(10), prog.get("second").unwrap());

        let names: Vec<&str> = drain(&mut queue).iter().map(|p| p.task.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_time_ordering() {
        let prog = program(&["a", "b", "c"]);
        let mut queue = PriorityQueue::new();

        queue.push(Time::new(30), prog.get("a").unwrap());
        queue.push(Time::new(10), prog.get("b").unwrap());
        queue.push(Time::new(20), prog.get("c").unwrap());

        assert_eq!(queue.pop().unwrap().time, Time::new(10));
        assert_eq!(queue.pop().unwrap().time, Time::new(20));
        assert_eq!(queue.pop().unwrap().time, Time::new(30));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_completions_pop_before_executions() {
        let prog = program(&["a", "b", "c"]);
        let mut queue = PriorityQueue::new();

        queue.push(Time::new(5), prog.get("a").unwrap());
        queue.push_completion(Time::new(5), prog.get("c").unwrap());
        queue.push_completion(Time::new(5), prog.get("b").unwrap());
        queue.push_completion(Time::new(4), prog.get("a").unwrap());

        let order: Vec<(u64, Stage, &str)> = drain(&mut queue)
            .iter()
            .map(|p| (p.time.ticks(), p.stage, p.task.name()))
            .collect();
        assert_eq!(
            order,
            vec![
                (4, Stage::Completion, "a"),
                (5, Stage::Completion, "b"),
                (5, Stage::Completion, "c"),
                (5, Stage::Execution, "a"),
            ]
        );
    }

    #[test]
    fn test_batch_and_planned_pushes() {
        let prog = program(&["a", "b", "c", "d"]);
        let mut queue = PriorityQueue::new();

        queue.push_batch(Time::ZERO, prog.tasks().take(2));
        queue.push_planned(vec![
            PlannedTask::new(Time::new(5), Stage::Execution, prog.get("d").unwrap()),
            PlannedTask::new(Time::new(1), Stage::Completion, prog.get("c").unwrap()),
        ]);
        assert_eq!(queue.len(), 4);

        let planned = drain(&mut queue);
        for window in planned.windows(2) {
            assert!(
                window[0].key() <= window[1].key(),
                "tasks out of order: {:?} vs {:?}",
                window[0],
                window[1]
            );
        }
        assert_eq!(planned.last().unwrap().task.name(), "d");
    }

    #[test]
    fn test_empty_queue() {
        let mut queue: PriorityQueue<'_> = PriorityQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_determinism_across_queues() {
        let prog = program(&["a", "b", "c", "d", "e"]);
        let build = || {
            let mut queue = PriorityQueue::new();
            let times = [5, 3, 5, 1, 3];
            for (task, t) in prog.tasks().zip(times) {
                queue.push(Time::new(t), task);
            }
            drain(&mut queue)
                .iter()
                .map(|p| (p.time, p.task.id()))
                .collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
