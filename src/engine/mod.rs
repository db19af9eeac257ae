//! # engine
//!
//! Signal → decision → broker.  [`dispatcher::SignalDispatcher`] is the only
//! entry point the HTTP layer uses.

pub mod dispatcher;
pub mod machine;
pub mod outcome;
pub mod reconciler;

pub use dispatcher::SignalDispatcher;
pub use outcome::SignalStatus;
