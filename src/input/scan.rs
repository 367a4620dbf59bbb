use crate::device::InputBus;
use crate::event::Button;
use crate::input::EdgeProducer;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Rising-edge detector over sampled button levels.
#[derive(Debug, Default)]
pub struct ButtonScanner {
    last_levels: [bool; 4],
}

impl ButtonScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample of all button levels; returns the buttons whose level
    /// went from low to high since the previous sample.
    pub fn sample(&mut self, levels: [bool; 4]) -> impl Iterator<Item = Button> + '_ {
        let previous = std::mem::replace(&mut self.last_levels, levels);
        Button::ALL
            .into_iter()
            .filter(move |b| levels[b.index()] && !previous[b.index()])
    }
}

/// Sample the buttons every `period` and push rising edges into the queue.
pub async fn run(
    bus: Arc<dyn InputBus>,
    producer: EdgeProducer,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut scanner = ButtonScanner::new();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("button scan running every {}ms", period.as_millis());

    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let levels = Button::ALL.map(|b| bus.button_level(b));
        for button in scanner.sample(levels) {
            debug!("button {button:?} edge");
            producer.button(button);
        }
    }
}
