//! Network cost models.
//!
//! A [`NetworkModel`] prices Put and Get tasks. Each message *leg* yields
//! two times: `local`, when the sending process is free again, and
//! `remote`, when the message has arrived at the target. A Put is one leg;
//! a Get is a request leg followed by a retrieval leg that starts when
//! the request arrives. For a Get, `local` is when the request was
//! injected and `remote` is when the data is back at the requester. All models are deterministic for a given seed.

use crate::error::{SimError, SimResult};
use crate::noise::NoiseModel;
use crate::task::{Task, TaskKind, Work};
use crate::time::Time;

// ── NetworkTimes ──────────────────────────────────────────────────────

/// Outcome of pricing one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkTimes {
    /// The sending process becomes free again.
    pub local: Time,
    /// The message is observed at the target.
    pub remote: Time,
}

impl NetworkTimes {
    /// Both sides complete at the same time.
    pub fn symmetric(time: Time) -> Self {
        NetworkTimes {
            local: time,
            remote: time,
        }
    }
}

// ── NetworkModel ──────────────────────────────────────────────────────

/// Prices communication tasks.
pub trait NetworkModel {
    /// Short model name, used in error messages.
    fn name(&self) -> &'static str;

    /// Price one leg of `size` bytes sent by `task` at `time`.
    fn transfer(&mut self, time: Time, task: &Task, size: u64) -> NetworkTimes;

    /// Price one leg with a fixed transfer duration.
    fn transfer_for(&mut self, time: Time, _task: &Task, ticks: u64) -> NetworkTimes {
        NetworkTimes::symmetric(time.plus(ticks))
    }

    /// Price `task` when it starts at `time`.
    ///
    /// Fails with [`SimError::UnsupportedTaskType`] for anything but a
    /// Put or a Get.
    fn evaluate(&mut self, time: Time, task: &Task) -> SimResult<NetworkTimes> {
        match *task.kind() {
            TaskKind::Put {
                work: Work::Size(size),
                ..
            } => Ok(self.transfer(time, task, size)),
            TaskKind::Put {
                work: Work::Time(ticks),
                ..
            } => Ok(self.transfer_for(time, task, ticks)),
            TaskKind::Get {
                command_size,
                retrieval_size,
                ..
            } => {
                let request = self.transfer(time, task, command_size);
                let retrieval = self.transfer(request.remote, task, retrieval_size);
                Ok(NetworkTimes {
                    local: request.local,
                    remote: retrieval.remote,
                })
            }
            _ => Err(SimError::UnsupportedTaskType {
                task: task.name().to_string(),
                model: self.name(),
            }),
        }
    }
}

impl<M: NetworkModel + ?Sized> NetworkModel for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn transfer(&mut self, time: Time, task: &Task, size: u64) -> NetworkTimes {
        (**self).transfer(time, task, size)
    }

    fn transfer_for(&mut self, time: Time, task: &Task, ticks: u64) -> NetworkTimes {
        (**self).transfer_for(time, task, ticks)
    }

    fn evaluate(&mut self, time: Time, task: &Task) -> SimResult<NetworkTimes> {
        (**self).evaluate(time, task)
    }
}

fn check_bandwidth(bandwidth: f64) -> SimResult<()> {
    if !bandwidth.is_finite() || bandwidth < 0.0 {
        return Err(SimError::InvalidModel(format!(
            "bandwidth cost must be non-negative, got {}",
            bandwidth
        )));
    }
    Ok(())
}

fn wire_ticks(latency: u64, bandwidth: f64, size: u64) -> u64 {
    latency.saturating_add((size as f64 * bandwidth).floor() as u64)
}

// ── LatencyBandwidth ──────────────────────────────────────────────────

/// Classic latency/bandwidth (Hockney) model.
///
/// One leg costs `latency + floor(size * bandwidth)` ticks, where
/// `bandwidth` is the inverse bandwidth (ticks per byte). The sender is
/// busy for the whole transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyBandwidth {
    latency: u64,
    bandwidth: f64,
}

impl LatencyBandwidth {
    pub fn new(latency: u64, bandwidth: f64) -> SimResult<Self> {
        check_bandwidth(bandwidth)?;
        Ok(LatencyBandwidth { latency, bandwidth })
    }

    pub fn latency(&self) -> u64 {
        self.latency
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

impl NetworkModel for LatencyBandwidth {
    fn name(&self) -> &'static str {
        "LatencyBandwidth"
    }

    fn transfer(&mut self, time: Time, _task: &Task, size: u64) -> NetworkTimes {
        NetworkTimes::symmetric(time.plus(wire_ticks(self.latency, self.bandwidth, size)))
    }
}

// ── Pipelined ─────────────────────────────────────────────────────────

/// Latency/bandwidth with a pipelined injection stage.
///
/// The sender is released after `pipeline` ticks; the message then
/// arrives `latency + floor(size * bandwidth)` ticks later.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pipelined {
    latency: u64,
    bandwidth: f64,
    pipeline: u64,
}

impl Pipelined {
    pub fn new(latency: u64, bandwidth: f64, pipeline: u64) -> SimResult<Self> {
        check_bandwidth(bandwidth)?;
        Ok(Pipelined {
            latency,
            bandwidth,
            pipeline,
        })
    }
}

impl NetworkModel for Pipelined {
    fn name(&self) -> &'static str {
        "Pipelined"
    }

    fn transfer(&mut self, time: Time, _task: &Task, size: u64) -> NetworkTimes {
        let local = time.plus(self.pipeline);
        NetworkTimes {
            local,
            remote: local.plus(wire_ticks(self.latency, self.bandwidth, size)),
        }
    }
}

// ── NoisyNetwork ──────────────────────────────────────────────────────

/// Wraps another network model and delays each arrival by sampled noise.
///
/// Only `remote` moves; the sender is released as the inner model says.
#[derive(Debug, Clone)]
pub struct NoisyNetwork<M, N> {
    inner: M,
    noise: N,
}

impl<M: NetworkModel, N: NoiseModel> NoisyNetwork<M, N> {
    pub fn new(inner: M, noise: N) -> Self {
        NoisyNetwork { inner, noise }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: NetworkModel, N: NoiseModel> NetworkModel for NoisyNetwork<M, N> {
    fn name(&self) -> &'static str {
        "NoisyNetwork"
    }

    fn transfer(&mut self, time: Time, task: &Task, size: u64) -> NetworkTimes {
        let times = self.inner.transfer(time, task, size);
        let extra = self
            .noise
            .sample(times.remote.duration_since(time).unwrap_or(0));
        NetworkTimes {
            local: times.local,
            remote: times.remote.plus(extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::noise::{NoNoise, UniformNoise};

    fn lb(latency: u64, bandwidth: f64) -> LatencyBandwidth {
        LatencyBandwidth::new(latency, bandwidth).unwrap()
    }

    #[test]
    fn test_latency_only_put() {
        let mut net = lb(1000, 0.0);
        let put = Task::put("p", 0, 1, 4096);
        let times = net.evaluate(Time::new(10), &put).unwrap();
        assert_eq!(times, NetworkTimes::symmetric(Time::new(1010)));
    }

    #[test]
    fn test_bandwidth_term_floors() {
        let mut net = lb(5, 0.25);
        let put = Task::put("p", 0, 1, 10);
        assert_eq!(net.evaluate(Time::ZERO, &put).unwrap().remote, Time::new(7));
    }

    #[test]
    fn test_fixed_time_put() {
        let mut net = lb(1000, 1.0);
        let put = Task::put_for("p", 0, 1, 3);
        assert_eq!(net.evaluate(Time::new(2), &put).unwrap().remote, Time::new(5));
    }

    #[test]
    fn test_get_is_two_legs() {
        let mut net = lb(100, 1.0);
        let get = Task::get("g", 0, 1, 50).with_command_size(10);
        // request: 100 + 10, retrieval: 100 + 50
        let times = net.evaluate(Time::ZERO, &get).unwrap();
        assert_eq!(times.local, Time::new(110));
        assert_eq!(times.remote, Time::new(260));
    }

    #[test]
    fn test_pipelined_releases_sender_early() {
        let mut net = Pipelined::new(100, 1.0, 5).unwrap();
        let put = Task::put("p", 0, 1, 20).non_blocking();
        let times = net.evaluate(Time::new(10), &put).unwrap();
        assert_eq!(times.local, Time::new(15));
        assert_eq!(times.remote, Time::new(135));
    }

    #[test]
    fn test_pipelined_get_chains_on_arrival() {
        let mut net = Pipelined::new(10, 0.0, 1).unwrap();
        let get = Task::get("g", 0, 1, 0);
        // request leaves at 1 and arrives at 11, retrieval leaves at 12
        // and arrives at 22.
        let times = net.evaluate(Time::ZERO, &get).unwrap();
        assert_eq!(times.local, Time::new(1));
        assert_eq!(times.remote, Time::new(22));
    }

    #[test]
    fn test_invalid_bandwidth() {
        let err = LatencyBandwidth::new(1, -0.5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(Pipelined::new(1, f64::NAN, 0).is_err());
    }

    #[test]
    fn test_unsupported_task() {
        let mut net = lb(1, 0.0);
        let err = net
            .evaluate(Time::ZERO, &Task::compute("c", 0, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedTaskType);
    }

    #[test]
    fn test_noisy_network_delays_remote_only() {
        let mut net = NoisyNetwork::new(Pipelined::new(10, 0.0, 2).unwrap(), UniformNoise::new(5, 1));
        let put = Task::put("p", 0, 1, 0);
        for _ in 0..20 {
            let times = net.evaluate(Time::ZERO, &put).unwrap();
            assert_eq!(times.local, Time::new(2));
            assert!((12..=17).contains(&times.remote.ticks()));
        }
    }

    #[test]
    fn test_noisy_network_is_reproducible() {
        let run = |seed| {
            let mut net = NoisyNetwork::new(lb(10, 0.0), UniformNoise::new(100, seed));
            let put = Task::put("p", 0, 1, 0);
            (0..10)
                .map(|_| net.evaluate(Time::ZERO, &put).unwrap().remote)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(3), run(3));

        let mut quiet = NoisyNetwork::new(lb(10, 0.0), NoNoise);
        let put = Task::put("p", 0, 1, 0);
        assert_eq!(quiet.evaluate(Time::ZERO, &put).unwrap().remote, Time::new(10));
    }
}
