//! Reducer inputs and outputs

use super::transcript::NodeIndex;
use crate::event::StreamEvent;
use std::time::Duration;

/// Delay between a card receiving its result and collapsing
pub const COLLAPSE_AFTER: Duration = Duration::from_secs(3);

/// Inputs to the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The user pressed send
    Submit(String),
    /// An event arrived on `stream-event`
    Stream(StreamEvent),
    /// The user clicked a card header
    ToggleCard(NodeIndex),
    /// A scheduled collapse fired
    CollapseDue(NodeIndex),
}

/// Work for the driver after a reduction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish `user-message` to the host
    SendPrompt(String),
    ScheduleCollapse { card: NodeIndex, after: Duration },
    ScrollToBottom,
    FocusInput,
}
