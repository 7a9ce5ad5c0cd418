//! Host clock and per-client latency tracking

use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

/// Blend factor for new round-trip samples
const RTT_SMOOTHING: f32 = 0.25;

/// Monotonic host clock, seconds since session start. All recorded frame
/// timestamps and adjusted claim times live on this clock.
#[derive(Debug, Clone)]
pub struct HostClock {
    started: Instant,
}

impl HostClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn now(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }
}

/// Externally measured round-trip times per client. The measurement
/// protocol lives outside this subsystem; smoothed samples arrive over the
/// session input channel.
#[derive(Debug, Default)]
pub struct RttTracker {
    rtts: HashMap<Uuid, f32>,
}

impl RttTracker {
    pub fn new() -> Self {
        Self {
            rtts: HashMap::new(),
        }
    }

    pub fn record_sample(&mut self, client: Uuid, rtt: f32) {
        let smoothed = match self.rtts.get(&client) {
            Some(previous) => previous + (rtt - previous) * RTT_SMOOTHING,
            None => rtt,
        };
        self.rtts.insert(client, smoothed);
    }

    /// Measured round trip for the client; zero until a sample arrives
    pub fn round_trip(&self, client: Uuid) -> f32 {
        self.rtts.get(&client).copied().unwrap_or(0.0)
    }

    /// Estimated one-way delay (half of the measured round trip)
    pub fn one_way_delay(&self, client: Uuid) -> f32 {
        self.round_trip(client) * 0.5
    }

    pub fn forget(&mut self, client: Uuid) {
        self.rtts.remove(&client);
    }
}
