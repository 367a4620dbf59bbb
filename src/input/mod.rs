pub mod scan;

use crate::event::{Button, InputEvent, RawEdge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Debounce windows and direction mapping.
#[derive(Debug, Clone, Copy)]
pub struct DebounceConfig {
    pub step: Duration,
    pub press: Duration,
    pub invert_direction: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(60),
            press: Duration::from_millis(50),
            invert_direction: false,
        }
    }
}

/// Create the bounded edge queue: a cloneable producer for edge handlers and
/// the single consumer that yields debounced events.
pub fn edge_queue(capacity: usize, config: DebounceConfig) -> (EdgeProducer, InputSource) {
    let (tx, rx) = mpsc::channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let producer = EdgeProducer {
        tx,
        dropped: Arc::clone(&dropped),
    };
    let source = InputSource {
        rx,
        debouncer: Debouncer::new(config),
        dropped,
        reported_drops: 0,
    };
    (producer, source)
}

/// Producer side of the edge queue, safe to call from interrupt-like context:
/// it never blocks, and a full queue drops the edge.
///
/// `push` is not allocation-free. tokio's bounded channel stores values in
/// linked blocks of 32 slots and `try_send` may allocate the next block when
/// the tail crosses a block boundary; drained blocks are recycled, so in
/// steady state this is an occasional allocation, not one per edge. On a
/// target whose interrupt handlers must not touch the allocator, replace the
/// channel with a preallocated ring signalled through `tokio::sync::Notify`.
#[derive(Debug, Clone)]
pub struct EdgeProducer {
    tx: mpsc::Sender<RawEdge>,
    dropped: Arc<AtomicU64>,
}

impl EdgeProducer {
    /// Rotary clock edge; `dt_high` is the level of the direction pin.
    pub fn rotary_clock(&self, dt_high: bool) {
        self.push(RawEdge::RotaryClock {
            dt_high,
            at: Instant::now(),
        });
    }

    /// Rotary push-switch edge.
    pub fn rotary_switch(&self) {
        self.push(RawEdge::RotarySwitch { at: Instant::now() });
    }

    /// Rising edge of a scanned button.
    pub fn button(&self, which: Button) {
        self.push(RawEdge::Button {
            which,
            at: Instant::now(),
        });
    }

    /// Enqueue `edge` without waiting. See the type docs for allocation.
    pub fn push(&self, edge: RawEdge) {
        if self.tx.try_send(edge).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Edges dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side: yields clean, rate-limited events.
#[derive(Debug)]
pub struct InputSource {
    rx: mpsc::Receiver<RawEdge>,
    debouncer: Debouncer,
    dropped: Arc<AtomicU64>,
    reported_drops: u64,
}

impl InputSource {
    /// Wait until an edge passes the debounce filter.
    ///
    /// Returns `None` once every producer has been dropped.
    pub async fn poll_or_wait(&mut self) -> Option<InputEvent> {
        loop {
            let edge = self.rx.recv().await?;
            self.report_drops();
            if let Some(event) = self.debouncer.accept(&edge) {
                return Some(event);
            }
        }
    }

    fn report_drops(&mut self) {
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped != self.reported_drops {
            debug!(
                "input queue overflow: {} edges dropped",
                dropped - self.reported_drops
            );
            self.reported_drops = dropped;
        }
    }
}

/// Per-source debounce filter.
///
/// Each source keeps its own timer: steps, the switch, and every button.
/// Rejected edges are dropped, never replayed.
#[derive(Debug)]
pub struct Debouncer {
    config: DebounceConfig,
    last_step: Option<Instant>,
    last_switch: Option<Instant>,
    last_button: [Option<Instant>; 4],
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            last_step: None,
            last_switch: None,
            last_button: [None; 4],
        }
    }

    /// Turn a raw edge into an event, or `None` if it falls inside its
    /// source's debounce window.
    pub fn accept(&mut self, edge: &RawEdge) -> Option<InputEvent> {
        let at = edge.at();
        match *edge {
            RawEdge::RotaryClock { dt_high, .. } => {
                settle(&mut self.last_step, at, self.config.step)?;
                // direction pin low on the clock edge = clockwise
                let forward = dt_high == self.config.invert_direction;
                let direction = if forward { 1 } else { -1 };
                Some(InputEvent::RotaryStep { direction })
            }
            RawEdge::RotarySwitch { .. } => {
                settle(&mut self.last_switch, at, self.config.press)?;
                Some(InputEvent::RotarySwitch)
            }
            RawEdge::Button { which, .. } => {
                settle(&mut self.last_button[which.index()], at, self.config.press)?;
                Some(InputEvent::ButtonPress(which))
            }
        }
    }
}

fn settle(last: &mut Option<Instant>, at: Instant, window: Duration) -> Option<()> {
    if let Some(prev) = *last {
        if at.saturating_duration_since(prev) < window {
            return None;
        }
    }
    *last = Some(at);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, n: u64) -> Instant {
        base + Duration::from_millis(n)
    }

    #[test]
    fn step_burst_collapses_to_one() {
        let mut debouncer = Debouncer::new(DebounceConfig::default());
        let base = Instant::now();
        let accepted: Vec<_> = (0..10)
            .filter_map(|i| {
                debouncer.accept(&RawEdge::RotaryClock {
                    dt_high: false,
                    at: ms(base, i * 5),
                })
            })
            .collect();
        assert_eq!(accepted, vec![InputEvent::RotaryStep { direction: 1 }]);

        let next = debouncer.accept(&RawEdge::RotaryClock {
            dt_high: true,
            at: ms(base, 60),
        });
        assert_eq!(next, Some(InputEvent::RotaryStep { direction: -1 }));
    }

    #[test]
    fn direction_can_be_inverted() {
        let mut debouncer = Debouncer::new(DebounceConfig {
            invert_direction: true,
            ..DebounceConfig::default()
        });
        let event = debouncer.accept(&RawEdge::RotaryClock {
            dt_high: false,
            at: Instant::now(),
        });
        assert_eq!(event, Some(InputEvent::RotaryStep { direction: -1 }));
    }

    #[test]
    fn timers_are_per_source() {
        let mut debouncer = Debouncer::new(DebounceConfig::default());
        let base = Instant::now();

        assert!(debouncer
            .accept(&RawEdge::Button { which: Button::VolUp, at: base })
            .is_some());
        // different button, same instant
        assert!(debouncer
            .accept(&RawEdge::Button { which: Button::VolDown, at: base })
            .is_some());
        assert!(debouncer
            .accept(&RawEdge::RotarySwitch { at: ms(base, 1) })
            .is_some());
        assert!(debouncer
            .accept(&RawEdge::RotaryClock { dt_high: false, at: ms(base, 2) })
            .is_some());

        // same button inside its window
        assert!(debouncer
            .accept(&RawEdge::Button { which: Button::VolUp, at: ms(base, 49) })
            .is_none());
        assert!(debouncer
            .accept(&RawEdge::Button { which: Button::VolUp, at: ms(base, 50) })
            .is_some());
        assert!(debouncer
            .accept(&RawEdge::RotarySwitch { at: ms(base, 30) })
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn queue_delivers_in_order_and_debounces() {
        let (producer, mut source) = edge_queue(16, DebounceConfig::default());

        for _ in 0..5 {
            producer.rotary_clock(false);
        }
        producer.rotary_switch();
        producer.button(Button::Home);

        assert_eq!(
            source.poll_or_wait().await,
            Some(InputEvent::RotaryStep { direction: 1 })
        );
        assert_eq!(source.poll_or_wait().await, Some(InputEvent::RotarySwitch));
        assert_eq!(
            source.poll_or_wait().await,
            Some(InputEvent::ButtonPress(Button::Home))
        );

        tokio::time::advance(Duration::from_millis(60)).await;
        producer.rotary_clock(true);
        assert_eq!(
            source.poll_or_wait().await,
            Some(InputEvent::RotaryStep { direction: -1 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_drops_without_blocking() {
        let (producer, mut source) = edge_queue(16, DebounceConfig::default());
        for i in 0..40 {
            // spread steps so none are debounced away
            producer.push(RawEdge::RotaryClock {
                dt_high: false,
                at: Instant::now() + Duration::from_millis(i * 100),
            });
        }
        assert_eq!(producer.dropped(), 24);

        drop(producer);
        let mut received = 0;
        while source.poll_or_wait().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 16);
    }

    #[tokio::test]
    async fn queue_keeps_accepting_across_block_boundaries() {
        let (producer, mut source) = edge_queue(16, DebounceConfig::default());
        let mut at = Instant::now();
        // many fill/drain rounds walk the channel tail through recycled blocks
        for _ in 0..20 {
            for _ in 0..16 {
                at += Duration::from_millis(100);
                producer.push(RawEdge::RotaryClock { dt_high: true, at });
            }
            for _ in 0..16 {
                assert!(source.poll_or_wait().await.is_some());
            }
        }
        assert_eq!(producer.dropped(), 0);
    }
}
