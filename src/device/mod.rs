pub mod console;

use crate::event::Button;

/// Raw input bus capabilities.
///
/// Rotary clock and switch edges are delivered by the bus itself through an
/// [`EdgeProducer`](crate::input::EdgeProducer); only levels are polled.
pub trait InputBus: Send + Sync {
    /// Level of the rotary direction pin, sampled on a clock edge.
    fn rotary_direction_level(&self) -> bool;

    /// Current level of a push button (high = pressed).
    fn button_level(&self, button: Button) -> bool;
}
