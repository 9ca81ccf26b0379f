//! Surface-side chat state
//!
//! Implements the Elm Architecture: [`reduce`] folds [`Action`]s into the
//! [`Transcript`] and returns [`Effect`]s for the driver (the terminal UI)
//! to execute. Stream events are applied one at a time in arrival order.

mod effect;
pub mod format;
#[cfg(test)]
mod proptests;
mod reducer;
mod transcript;

pub use effect::{Action, Effect, COLLAPSE_AFTER};
pub use reducer::{reduce, reduce_at};
pub use transcript::{InputLock, Node, NodeIndex, ToolCard, Transcript};
