//! Surface state: the transcript and its bookkeeping

use super::format;
use std::collections::HashMap;

/// Position of a node in the transcript
pub type NodeIndex = usize;

/// Whether the input accepts a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLock {
    #[default]
    Idle,
    /// A turn is in flight
    Awaiting,
}

/// Collapsible element pairing a skill call with its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCard {
    pub tool_id: String,
    pub name: String,
    /// Serialized arguments; `None` renders no arguments line
    pub arguments: Option<String>,
    /// `None` while waiting
    pub result: Option<String>,
    pub collapsed: bool,
}

impl ToolCard {
    pub fn header(&self) -> String {
        format::card_header(&self.name)
    }

    /// Body lines shown when expanded
    pub fn body(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(2);
        if let Some(args) = &self.arguments {
            lines.push(format::arguments_line(args));
        }
        lines.push(match &self.result {
            Some(text) => format::result_line(text),
            None => format::WAITING.to_string(),
        });
        lines
    }

    pub fn is_waiting(&self) -> bool {
        self.result.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    User(String),
    Assistant(String),
    ToolCard(ToolCard),
    /// Result that matched no registered call
    StandaloneResult(String),
    Error(String),
}

/// Everything the surface shows, plus the state driving it
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub(super) nodes: Vec<Node>,
    /// The assistant bubble currently accumulating content
    pub(super) open_bubble: Option<NodeIndex>,
    /// tool id -> card awaiting its result
    pub(super) registry: HashMap<String, NodeIndex>,
    pub(super) lock: InputLock,
    pub(super) typing: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn lock(&self) -> InputLock {
        self.lock
    }

    pub fn input_enabled(&self) -> bool {
        self.lock == InputLock::Idle
    }

    /// Typing indicator visibility
    pub fn typing(&self) -> bool {
        self.typing
    }

    pub fn open_bubble(&self) -> Option<NodeIndex> {
        self.open_bubble
    }

    pub fn is_registered(&self, tool_id: &str) -> bool {
        self.registry.contains_key(tool_id)
    }

    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    pub fn card(&self, index: NodeIndex) -> Option<&ToolCard> {
        match self.nodes.get(index) {
            Some(Node::ToolCard(card)) => Some(card),
            _ => None,
        }
    }

    pub(super) fn card_mut(&mut self, index: NodeIndex) -> Option<&mut ToolCard> {
        match self.nodes.get_mut(index) {
            Some(Node::ToolCard(card)) => Some(card),
            _ => None,
        }
    }

    /// Most recently added tool card
    pub fn last_card(&self) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .rposition(|node| matches!(node, Node::ToolCard(_)))
    }

    pub(super) fn push(&mut self, node: Node) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}
