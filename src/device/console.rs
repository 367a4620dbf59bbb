use crate::device::InputBus;
use crate::event::Button;
use crate::input::EdgeProducer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Keyboard stand-in for the GPIO bus on a development host.
///
/// Rotary edges are fired straight into the edge queue, the way the clock
/// and switch interrupts do on hardware. Button presses are latched high
/// until the next scan samples them.
#[derive(Debug, Default)]
pub struct ConsoleBus {
    dt_high: AtomicBool,
    buttons: [AtomicBool; 4],
}

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Rotate(i8),
    Switch,
    Press(Button),
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let cmd = match line.trim() {
            "+" | "r" | "right" => ConsoleCommand::Rotate(1),
            "-" | "l" | "left" => ConsoleCommand::Rotate(-1),
            "s" | "switch" => ConsoleCommand::Switch,
            "p" | "play" => ConsoleCommand::Press(Button::PlayPause),
            "h" | "home" => ConsoleCommand::Press(Button::Home),
            "u" | "up" => ConsoleCommand::Press(Button::VolUp),
            "d" | "down" => ConsoleCommand::Press(Button::VolDown),
            "q" | "quit" => ConsoleCommand::Quit,
            _ => return None,
        };
        Some(cmd)
    }
}

impl ConsoleBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one command. Returns `false` when the user asked to quit.
    pub fn apply(&self, cmd: ConsoleCommand, producer: &EdgeProducer) -> bool {
        match cmd {
            ConsoleCommand::Rotate(direction) => {
                self.dt_high.store(direction < 0, Ordering::Relaxed);
                producer.rotary_clock(self.rotary_direction_level());
            }
            ConsoleCommand::Switch => producer.rotary_switch(),
            ConsoleCommand::Press(button) => {
                self.buttons[button.index()].store(true, Ordering::Relaxed);
            }
            ConsoleCommand::Quit => return false,
        }
        true
    }
}

impl InputBus for ConsoleBus {
    fn rotary_direction_level(&self) -> bool {
        self.dt_high.load(Ordering::Relaxed)
    }

    fn button_level(&self, button: Button) -> bool {
        self.buttons[button.index()].swap(false, Ordering::Relaxed)
    }
}

/// Read commands from stdin until EOF, quit, or cancellation.
pub async fn read_input_loop(
    bus: Arc<ConsoleBus>,
    producer: EdgeProducer,
    cancel: CancellationToken,
) {
    info!("console input: +/- rotate, s switch, p play/pause, h home, u/d volume, q quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                Some(cmd) => {
                    debug!("console: {cmd:?}");
                    if !bus.apply(cmd, &producer) {
                        info!("quit requested from console");
                        cancel.cancel();
                        return;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!("unknown console command: {}", line.trim()),
            },
            Ok(None) => {
                debug!("console input closed");
                return;
            }
            Err(e) => {
                warn!("console read error: {e}");
                return;
            }
        }
    }
}
