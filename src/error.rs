//! Structured error types for the simulator.
//!
//! All fallible public APIs return `Result<T, SimError>`. Every error is
//! fatal to the run that raised it: the machine is a synchronous kernel,
//! so nothing is retried and no partial result is returned. Callers that
//! need the coarse category (configuration vs. malformed program) use
//! [`SimError::kind`].

use crate::task::NodeIndex;
use crate::time::Time;

/// Coarse classification of a [`SimError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The machine cannot host the program, or a model was mis-parameterised.
    Configuration,
    /// The program DAG is malformed.
    Structural,
    /// Internal bookkeeping went out of bounds; indicates a broken builder.
    InvariantViolation,
    /// A cost model was asked to price a task kind it does not handle.
    UnsupportedTaskType,
    /// Program (de)serialization failed.
    Serialization,
}

/// The top-level error type for the simulation kernel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    // ── Configuration errors ──────────────────────────────

    /// The program has more Start tasks than the machine has nodes.
    #[error("program requires {required} processes but the machine has only {nodes} nodes")]
    InsufficientNodes { required: usize, nodes: usize },

    /// A machine parameter is out of range (e.g. zero processes per node).
    #[error("invalid machine configuration: {0}")]
    InvalidConfig(String),

    /// A task is placed on (or targets) a node the machine does not have.
    #[error("task {task} references node {node} but the machine has {nodes} nodes")]
    NodeOutOfRange {
        task: String,
        node: NodeIndex,
        nodes: usize,
    },

    /// A cost or noise model was constructed with an invalid parameter.
    #[error("invalid model parameter: {0}")]
    InvalidModel(String),

    // ── Structural errors ─────────────────────────────────

    /// An edge endpoint is not a task of the program.
    #[error("edge {from} -> {to} references unknown task {missing}")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },

    /// A named task was looked up but is not part of the program.
    #[error("task {0} not found")]
    TaskNotFound(String),

    /// A task without successors that is not a Proxy task.
    #[error("all programs must end with proxy tasks: {0} has no successors")]
    NonProxySink(String),

    /// A task payload or trigger policy is inconsistent with the program.
    #[error("invalid task {task}: {reason}")]
    InvalidTask { task: String, reason: String },

    /// A task asked to complete before the time it was executed at.
    #[error("task {task} cannot complete at {requested} when executed at {current}")]
    NonCausalEvent {
        task: String,
        requested: Time,
        current: Time,
    },

    // ── Invariant violations ──────────────────────────────

    /// More dependencies of a task completed than it has predecessors.
    #[error("task {task} has {fulfilled} fulfilled dependencies but in-degree {in_degree}")]
    DependencyOverflow {
        task: String,
        fulfilled: usize,
        in_degree: usize,
    },

    // ── Dispatch errors ───────────────────────────────────

    /// A cost model has no rule for this kind of task.
    #[error("{model} cannot evaluate task {task}")]
    UnsupportedTaskType { task: String, model: &'static str },

    // ── Serialization errors ──────────────────────────────

    /// A program could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// The taxonomy class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::InsufficientNodes { .. }
            | SimError::InvalidConfig(_)
            | SimError::NodeOutOfRange { .. }
            | SimError::InvalidModel(_) => ErrorKind::Configuration,
            SimError::DanglingEdge { .. }
            | SimError::TaskNotFound(_)
            | SimError::NonProxySink(_)
            | SimError::InvalidTask { .. }
            | SimError::NonCausalEvent { .. } => ErrorKind::Structural,
            SimError::DependencyOverflow { .. } => ErrorKind::InvariantViolation,
            SimError::UnsupportedTaskType { .. } => ErrorKind::UnsupportedTaskType,
            SimError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_insufficient_nodes() {
        let e = SimError::InsufficientNodes { required: 3, nodes: 2 };
        assert_eq!(
            e.to_string(),
            "program requires 3 processes but the machine has only 2 nodes"
        );
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_display_non_causal() {
        let e = SimError::NonCausalEvent {
            task: "sleep".into(),
            requested: Time::new(3),
            current: Time::new(10),
        };
        assert!(e.to_string().contains("T=3"));
        assert!(e.to_string().contains("T=10"));
        assert_eq!(e.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SimError::NonProxySink("c0".into()).kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            SimError::DependencyOverflow {
                task: "x".into(),
                fulfilled: 3,
                in_degree: 2
            }
            .kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(
            SimError::UnsupportedTaskType {
                task: "s0".into(),
                model: "Linear"
            }
            .kind(),
            ErrorKind::UnsupportedTaskType
        );
    }

    #[test]
    fn test_error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(SimError::TaskNotFound("a".into()));
        assert_eq!(e.to_string(), "task a not found");
    }
}
