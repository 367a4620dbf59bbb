use tokio::time::Instant;

/// One of the four scanned push buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    PlayPause,
    Home,
    VolUp,
    VolDown,
}

impl Button {
    pub const ALL: [Button; 4] = [
        Button::PlayPause,
        Button::Home,
        Button::VolUp,
        Button::VolDown,
    ];

    /// Stable slot index, used for per-button debounce timers.
    pub const fn index(self) -> usize {
        match self {
            Button::PlayPause => 0,
            Button::Home => 1,
            Button::VolUp => 2,
            Button::VolDown => 3,
        }
    }
}

/// Debounced user input, consumed by the navigation task in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// One detent of the rotary encoder; `direction` is +1 or -1.
    RotaryStep { direction: i8 },

    /// The rotary encoder's push switch.
    RotarySwitch,

    /// A push button press (rising edge).
    ButtonPress(Button),
}

/// Raw edge record pushed from interrupt-like context.
///
/// Fixed-size and `Copy` so producers never allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEdge {
    /// Rotary clock edge with the level of the direction pin at that moment.
    RotaryClock { dt_high: bool, at: Instant },

    /// Rotary switch edge.
    RotarySwitch { at: Instant },

    /// Rising edge observed by the button scan.
    Button { which: Button, at: Instant },
}

impl RawEdge {
    pub fn at(&self) -> Instant {
        match *self {
            RawEdge::RotaryClock { at, .. }
            | RawEdge::RotarySwitch { at }
            | RawEdge::Button { at, .. } => at,
        }
    }
}
