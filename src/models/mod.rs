//! Domain models shared across the whole bridge.

pub mod position;
pub mod signal;
pub mod symbol;

pub use position::{GlobalPosition, PositionSnapshot, PositionState, Side};
pub use signal::{ColorPalette, Signal, SignalEvent, WebhookPayload};
pub use symbol::Symbol;
