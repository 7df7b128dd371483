//! Program: a named DAG of tasks.
//!
//! A `Program` is built once by a generator through [`Program::add_node`],
//! [`Program::add_edge`] and [`Program::set_trigger`], then handed to
//! [`Machine::run`](crate::machine::Machine::run) any number of times. The
//! machine never mutates it.
//!
//! All maps are ordered (`BTreeMap`/`BTreeSet`) so iteration, and anything
//! derived from it, is identical across runs and platforms.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{SimError, SimResult};
use crate::task::{SleepSpec, Task, TaskId, TaskIdGen, TaskKind, Trigger};

static NO_NEIGHBOURS: BTreeSet<String> = BTreeSet::new();

/// An immutable-after-construction DAG over named tasks.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    tasks: BTreeMap<String, Task>,
    successors: BTreeMap<String, BTreeSet<String>>,
    predecessors: BTreeMap<String, BTreeSet<String>>,
    triggers: BTreeMap<String, Trigger>,
    id_gen: TaskIdGen,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ──────────────────────────────────────────────

    /// Add a task, keyed by its name, and stamp it with the next sequence id.
    ///
    /// Adding a task under an existing name replaces the old task (edges
    /// are kept); the replacement gets a fresh id.
    pub fn add_node(&mut self, mut task: Task) -> TaskId {
        let id = self.id_gen.next_id();
        task.assign_id(id);
        self.tasks.insert(task.name().to_string(), task);
        id
    }

    /// Add a dependency edge `from -> to`. Both endpoints must already exist.
    /// Adding the same edge twice has no further effect.
    pub fn add_edge(&mut self, from: &str, to: &str) -> SimResult<()> {
        for endpoint in [from, to] {
            if !self.tasks.contains_key(endpoint) {
                return Err(SimError::DanglingEdge {
                    from: from.to_string(),
                    to: to.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }

        self.successors
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.predecessors
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
        Ok(())
    }

    /// Attach a trigger policy to the edges feeding `name`.
    pub fn set_trigger(&mut self, name: &str, trigger: Trigger) -> SimResult<()> {
        if !self.tasks.contains_key(name) {
            return Err(SimError::TaskNotFound(name.to_string()));
        }
        self.triggers.insert(name.to_string(), trigger);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Look up a task by name, failing with [`SimError::TaskNotFound`].
    pub fn task(&self, name: &str) -> SimResult<&Task> {
        self.get(name)
            .ok_or_else(|| SimError::TaskNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All tasks in name order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Names of the tasks depending on `name` (empty if none).
    pub fn successors(&self, name: &str) -> &BTreeSet<String> {
        self.successors.get(name).unwrap_or(&NO_NEIGHBOURS)
    }

    /// Names of the tasks `name` depends on (empty if none).
    pub fn predecessors(&self, name: &str) -> &BTreeSet<String> {
        self.predecessors.get(name).unwrap_or(&NO_NEIGHBOURS)
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.predecessors(name).len()
    }

    pub fn out_degree(&self, name: &str) -> usize {
        self.successors(name).len()
    }

    /// Trigger policy of `name`; [`Trigger::All`] unless set otherwise.
    pub fn trigger(&self, name: &str) -> Trigger {
        self.triggers.get(name).copied().unwrap_or_default()
    }

    /// All Start tasks, in name order.
    pub fn start_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|task| task.is_start())
    }

    /// Number of logical processes the program requires (its Start tasks).
    pub fn process_count(&self) -> usize {
        self.start_tasks().count()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.successors.values().map(BTreeSet::len).sum()
    }

    // ── Validation ────────────────────────────────────────────────

    /// Check that the program can run on a machine with `nodes` nodes.
    ///
    /// Verifies node placement, Put/Get targets, Sleep payloads, that
    /// Start tasks have no predecessors and quorum sizes. Sink and dependency checks happen during the run.
    pub fn validate(&self, nodes: usize) -> SimResult<()> {
        for task in self.tasks.values() {
            let placements = std::iter::once(task.node()).chain(task.target());
            for node in placements {
                if node >= nodes {
                    return Err(SimError::NodeOutOfRange {
                        task: task.name().to_string(),
                        node,
                        nodes,
                    });
                }
            }

            match task.kind() {
                TaskKind::Sleep(SleepSpec::Delay(0)) => {
                    return Err(invalid(task, "sleep delay must be positive"));
                }
                TaskKind::Sleep(SleepSpec::Until(until)) if until.ticks() == 0 => {
                    return Err(invalid(task, "sleep-until time must be positive"));
                }
                TaskKind::Start { .. } if self.in_degree(task.name()) > 0 => {
                    return Err(invalid(task, "start tasks cannot have predecessors"));
                }
                _ => {}
            }
        }

        for (name, trigger) in &self.triggers {
            if let Trigger::AnyOf(k) = *trigger {
                let in_degree = self.in_degree(name);
                if k == 0 || k > in_degree {
                    let task = self.task(name)?;
                    return Err(invalid(
                        task,
                        &format!("quorum {} outside 1..={}", k, in_degree),
                    ));
                }
            }
        }

        Ok(())
    }

    // ── Serialization ─────────────────────────────────────────────

    /// Encode the program as JSON for distribution to batch samplers.
    #[cfg(feature = "serialize")]
    pub fn to_json(&self) -> SimResult<String> {
        serde_json::to_string(self).map_err(|e| SimError::Serialization(e.to_string()))
    }

    /// Decode a program produced by [`Program::to_json`].
    #[cfg(feature = "serialize")]
    pub fn from_json(json: &str) -> SimResult<Self> {
        serde_json::from_str(json).map_err(|e| SimError::Serialization(e.to_string()))
    }
}

fn invalid(task: &Task, reason: &str) -> SimError {
    SimError::InvalidTask {
        task: task.name().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Time;

    fn diamond() -> Program {
        let mut prog = Program::new();
        prog.add_node(Task::start("s0", 0));
        prog.add_node(Task::compute_for("a", 0, 10));
        prog.add_node(Task::compute_for("b", 0, 20));
        prog.add_node(Task::proxy("x", 0));
        prog.add_edge("s0", "a").unwrap();
        prog.add_edge("s0", "b").unwrap();
        prog.add_edge("a", "x").unwrap();
        prog.add_edge("b", "x").unwrap();
        prog
    }

    #[test]
    fn test_degrees_and_neighbours() {
        let prog = diamond();
        assert_eq!(prog.out_degree("s0"), 2);
        assert_eq!(prog.in_degree("x"), 2);
        assert_eq!(prog.in_degree("s0"), 0);
        assert_eq!(prog.out_degree("x"), 0);
        assert!(prog.successors("x").is_empty());
        assert!(prog.predecessors("missing").is_empty());
        let preds: Vec<&str> = prog.predecessors("x").iter().map(String::as_str).collect();
        assert_eq!(preds, vec!["a", "b"]);
        assert_eq!(prog.edge_count(), 4);
    }

    #[test]
    fn test_duplicate_edge_collapses() {
        let mut prog = diamond();
        prog.add_edge("a", "x").unwrap();
        assert_eq!(prog.in_degree("x"), 2);
    }

    #[test]
    fn test_edge_to_missing_task_fails() {
        let mut prog = diamond();
        let err = prog.add_edge("a", "nope").unwrap_err();
        assert_eq!(
            err,
            SimError::DanglingEdge {
                from: "a".into(),
                to: "nope".into(),
                missing: "nope".into()
            }
        );
        assert!(prog.add_edge("ghost", "x").is_err());
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let prog = diamond();
        let ids: Vec<u64> = ["s0", "a", "b", "x"]
            .iter()
            .map(|n| prog.get(n).unwrap().id().raw())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_overwrite_keeps_edges_and_reassigns_id() {
        let mut prog = diamond();
        let id = prog.add_node(Task::compute_for("a", 0, 99));
        assert_eq!(id.raw(), 4);
        assert_eq!(prog.len(), 4);
        assert_eq!(prog.in_degree("a"), 1);
        assert_eq!(prog.get("a").unwrap().id(), id);
    }

    #[test]
    fn test_process_count_counts_starts() {
        let mut prog = diamond();
        assert_eq!(prog.process_count(), 1);
        prog.add_node(Task::start("s1", 1));
        assert_eq!(prog.process_count(), 2);
        assert_eq!(prog.start_tasks().count(), 2);
    }

    #[test]
    fn test_task_lookup() {
        let prog = diamond();
        assert!(prog.task("a").is_ok());
        assert_eq!(
            prog.task("zz").unwrap_err(),
            SimError::TaskNotFound("zz".into())
        );
    }

    #[test]
    fn test_trigger_defaults_and_validation() {
        let mut prog = diamond();
        assert_eq!(prog.trigger("x"), Trigger::All);
        prog.set_trigger("x", Trigger::AnyOf(1)).unwrap();
        assert_eq!(prog.trigger("x"), Trigger::AnyOf(1));
        assert!(prog.validate(1).is_ok());

        prog.set_trigger("x", Trigger::AnyOf(3)).unwrap();
        assert!(matches!(
            prog.validate(1),
            Err(SimError::InvalidTask { .. })
        ));

        prog.set_trigger("x", Trigger::AnyOf(0)).unwrap();
        assert!(prog.validate(1).is_err());

        assert!(prog.set_trigger("nope", Trigger::All).is_err());
    }

    #[test]
    fn test_validate_node_range() {
        let mut prog = diamond();
        prog.add_node(Task::put("p", 0, 4, 8));
        assert_eq!(
            prog.validate(2).unwrap_err(),
            SimError::NodeOutOfRange {
                task: "p".into(),
                node: 4,
                nodes: 2
            }
        );
        assert!(prog.validate(5).is_ok());
    }

    #[test]
    fn test_validate_sleep_payloads() {
        let mut prog = Program::new();
        prog.add_node(Task::sleep("z", 0, 0));
        assert!(prog.validate(1).is_err());

        let mut prog = Program::new();
        prog.add_node(Task::sleep_until("z", 0, Time::ZERO));
        assert!(prog.validate(1).is_err());

        let mut prog = Program::new();
        prog.add_node(Task::sleep_until("z", 0, Time::new(5)));
        assert!(prog.validate(1).is_ok());
    }

    #[test]
    fn test_validate_start_without_predecessors() {
        let mut prog = diamond();
        prog.add_node(Task::start("s1", 1));
        assert!(prog.validate(2).is_ok());

        prog.add_edge("s0", "s1").unwrap();
        let err = prog.validate(2).unwrap_err();
        assert!(matches!(err, SimError::InvalidTask { ref task, .. } if task == "s1"));
        assert_eq!(err.kind(), crate::error::ErrorKind::Structural);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_json_preserves_structure() {
        let mut prog = diamond();
        prog.set_trigger("x", Trigger::AnyOf(1)).unwrap();
        let json = prog.to_json().unwrap();
        let back = Program::from_json(&json).unwrap();
        assert_eq!(back.len(), prog.len());
        assert_eq!(back.in_degree("x"), 2);
        assert_eq!(back.trigger("x"), Trigger::AnyOf(1));
        assert_eq!(back.get("b"), prog.get("b"));
    }
}
