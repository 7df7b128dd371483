//! # collsim: Deterministic Dataflow Machine Simulator
//!
//! Estimates the completion time of collective-communication algorithms
//! by running their dataflow DAG on a simulated `nodes × processes`
//! machine. No threads, no wall-clock time: a priority queue of planned
//! tasks, a grid of per-process completion times, and pluggable cost
//! models for computation and network transfer.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │            Machine            │ ← event loop, resource checks
//! │  ┌─────────────────────────┐  │
//! │  │        RunState         │  │ ← node×process grid, quorums
//! │  └─────────────────────────┘  │
//! │  ┌─────────────────────────┐  │
//! │  │     PriorityQueue       │  │ ← min-heap on (time, task id)
//! │  └─────────────────────────┘  │
//! │  ┌──────────┐ ┌──────────┐    │
//! │  │ Compute  │ │ Network  │    │ ← cost models (+ noise)
//! │  └──────────┘ └──────────┘    │
//! │  ┌──────────┐ ┌──────────┐    │
//! │  │Instrument│ │  Canvas  │    │ ← observers, never steer
//! │  └──────────┘ └──────────┘    │
//! └───────────────────────────────┘
//!               ▲
//!        Program (DAG of Tasks) ← generators
//! ```

pub mod canvas;
pub mod compute;
pub mod error;
pub mod generators;
pub mod instrument;
pub mod machine;
pub mod network;
pub mod noise;
pub mod program;
pub mod queue;
pub mod sampling;
pub mod task;
pub mod time;

// Re-exports for convenience.
pub use canvas::{Canvas, DrawCommand, DrawRecorder};
pub use compute::{ComputeModel, FixedTime, Linear, NoisyCompute};
pub use error::{ErrorKind, SimError, SimResult};
pub use instrument::{BandwidthInstrument, EventTrace, Instrument, InstrumentId, Recorder};
pub use machine::{Machine, MachineBuilder, MachineConfig, RunReport};
pub use network::{LatencyBandwidth, NetworkModel, NetworkTimes, NoisyNetwork, Pipelined};
pub use noise::{GammaNoise, NoNoise, NoiseModel, UniformNoise};
pub use program::Program;
pub use queue::{PlannedTask, PriorityQueue, Stage};
pub use task::{NodeIndex, SleepSpec, Task, TaskEvent, TaskId, TaskKind, Trigger, Work};
pub use time::Time;
