//! Fluent construction of a [`Machine`].

use crate::canvas::Canvas;
use crate::compute::{ComputeModel, FixedTime};
use crate::error::SimResult;
use crate::instrument::Instrument;
use crate::network::{LatencyBandwidth, NetworkModel};
use crate::task::TaskEvent;

use super::{Machine, MachineConfig};

/// Fluent builder for [`Machine`].
///
/// Hides the boxing of cost models and the instrument registry behind a
/// chainable API. Unset cost models default to zero cost.
///
/// # Example
/// ```rust
/// use collsim::compute::Linear;
/// use collsim::instrument::Recorder;
/// use collsim::machine::MachineBuilder;
/// use collsim::network::Pipelined;
/// use collsim::task::TaskEvent;
///
/// let machine = MachineBuilder::new()
///     .nodes(4)
///     .processes(2)
///     .compute(Linear::new(0.5).unwrap())
///     .network(Pipelined::new(1000, 0.09, 400).unwrap())
///     .instrument(TaskEvent::ALL, Recorder::new())
///     .build()
///     .unwrap();
/// assert_eq!(machine.nodes(), 4);
/// ```
pub struct MachineBuilder {
    config: MachineConfig,
    compute: Option<Box<dyn ComputeModel>>,
    network: Option<Box<dyn NetworkModel>>,
    canvas: Option<Box<dyn Canvas>>,
    instruments: Vec<(Vec<TaskEvent>, Box<dyn Instrument>)>,
}

impl MachineBuilder {
    /// Create a builder for a 1×1 machine.
    pub fn new() -> Self {
        MachineBuilder {
            config: MachineConfig::default(),
            compute: None,
            network: None,
            canvas: None,
            instruments: Vec::new(),
        }
    }

    // ── Shape ─────────────────────────────────────────────────

    pub fn nodes(mut self, nodes: usize) -> Self {
        self.config.nodes = nodes;
        self
    }

    /// Process slots per node.
    pub fn processes(mut self, processes: usize) -> Self {
        self.config.processes = processes;
        self
    }

    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    // ── Models ────────────────────────────────────────────────

    pub fn compute(mut self, model: impl ComputeModel + 'static) -> Self {
        self.compute = Some(Box::new(model));
        self
    }

    pub fn network(mut self, model: impl NetworkModel + 'static) -> Self {
        self.network = Some(Box::new(model));
        self
    }

    // ── Observers ─────────────────────────────────────────────

    pub fn canvas(mut self, canvas: impl Canvas + 'static) -> Self {
        self.canvas = Some(Box::new(canvas));
        self
    }

    /// Register an instrument for `events`.
    ///
    /// Instruments get ids in registration order, starting at index 0;
    /// see [`InstrumentId::index`](crate::instrument::InstrumentId::index).
    pub fn instrument<E>(mut self, events: E, instrument: impl Instrument + 'static) -> Self
    where
        E: IntoIterator<Item = TaskEvent>,
    {
        self.instruments
            .push((events.into_iter().collect(), Box::new(instrument)));
        self
    }

    // ── Build ─────────────────────────────────────────────────

    /// Validate the configuration and assemble the machine.
    pub fn build(self) -> SimResult<Machine> {
        let compute = match self.compute {
            Some(compute) => compute,
            None => Box::new(FixedTime::default()),
        };
        let network = match self.network {
            Some(network) => network,
            None => Box::new(LatencyBandwidth::new(0, 0.0)?),
        };

        let mut machine = Machine::from_parts(self.config, compute, network)?;
        if let Some(canvas) = self.canvas {
            machine.set_canvas(canvas);
        }
        for (events, instrument) in self.instruments {
            machine.register_instrument(events, instrument);
        }
        Ok(machine)
    }
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DrawRecorder;
    use crate::error::SimError;
    use crate::instrument::{EventTrace, Recorder};

    #[test]
    fn test_builder_defaults() {
        let machine = MachineBuilder::new().build().unwrap();
        assert_eq!(machine.config(), MachineConfig::new(1, 1));
        assert!(machine.last_report().is_none());
        assert!(machine.canvas::<DrawRecorder>().is_none());
    }

    #[test]
    fn test_builder_rejects_empty_machine() {
        let err = MachineBuilder::new().nodes(0).build().unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
        assert!(MachineBuilder::new().processes(0).build().is_err());
    }

    #[test]
    fn test_builder_registers_in_order() {
        let machine = MachineBuilder::new()
            .nodes(2)
            .canvas(DrawRecorder::new())
            .instrument([TaskEvent::Completed], Recorder::new())
            .instrument(TaskEvent::ALL, EventTrace::new())
            .build()
            .unwrap();

        assert!(machine.canvas::<DrawRecorder>().is_some());
        let ids: Vec<_> = (0..2).map(crate::instrument::InstrumentId::from_index).collect();
        assert!(machine.instrument::<Recorder>(ids[0]).is_some());
        assert!(machine.instrument::<EventTrace>(ids[1]).is_some());
    }
}
