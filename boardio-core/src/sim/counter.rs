use std::sync::Arc;

use boardio_hal::counter::Edge;
use boardio_hal::{DeviceId, Level, Result};

use super::Channels;
use crate::driver::{CounterDriver, EdgeSink};
use crate::irq;

/// Simulated counter inputs
pub struct SimCounter {
    inputs: Channels<Option<Arc<dyn EdgeSink>>>,
}

impl SimCounter {
    pub fn new(count: usize) -> Self {
        Self {
            inputs: Channels::new(count),
        }
    }

    /// Present one edge on `channel`
    pub fn edge(&self, channel: DeviceId, edge: Edge) -> Result<()> {
        let sink = self.inputs.with(channel, |s| s.clone())?;
        if let Some(sink) = sink {
            let (from, to) = match edge {
                Edge::Rising => (Level::Low, Level::High),
                Edge::Falling => (Level::High, Level::Low),
            };
            irq::isr(|| sink.on_level(from, to));
        }
        Ok(())
    }

    /// Present `n` full pulses (rising then falling) on `channel`
    pub fn pulse(&self, channel: DeviceId, n: u32) -> Result<()> {
        for _ in 0..n {
            self.edge(channel, Edge::Rising)?;
            self.edge(channel, Edge::Falling)?;
        }
        Ok(())
    }
}

impl CounterDriver for SimCounter {
    fn attach(&self, channel: DeviceId, sink: Arc<dyn EdgeSink>) -> Result<()> {
        self.inputs.with(channel, |s| *s = Some(sink))
    }

    fn detach(&self, channel: DeviceId) {
        // Out-of-range channels have nothing attached
        let _ = self.inputs.with(channel, |s| *s = None);
    }
}
