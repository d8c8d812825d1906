//! In-memory social graph: nodes, directed links and messages.
//!
//! [`Graph`] is the repository the simulation operates on. Nodes and links
//! live in `SlotMap` arenas, giving stable keys, cheap deep copies and
//! trivial serialization. Messages flow along links from `source` to
//! `target`; the targets of a node's outgoing links are its *followers*.
//!
//! Every mutation that names a missing node or link returns an error and
//! leaves the graph untouched.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::error::{SpreadError, SpreadResult};
use crate::traits::{TraitProfile, TraitVector};

new_key_type! {
    /// Arena key of a node within a [`Graph`].
    pub struct NodeKey;

    /// Arena key of a link within a [`Graph`].
    pub struct LinkKey;
}

/// Identifier of a message.
pub type MessageId = String;

/// Id carried by the sentinel message returned when no genome was evaluated.
pub const INVALID_MESSAGE_ID: &str = "invalid-genome";

/// A message travelling through the graph.
///
/// Messages are immutable: propagation is recorded in the node logs, never on
/// the message itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Trait values of the message.
    pub traits: TraitVector,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub fn new(id: impl Into<MessageId>, traits: TraitVector) -> Self {
        Self {
            id: id.into(),
            traits,
        }
    }

    /// The sentinel returned by a search that never evaluated a genome.
    #[must_use]
    pub fn invalid() -> Self {
        Self::new(INVALID_MESSAGE_ID, TraitVector::zeros())
    }

    /// Whether this is a real message rather than the sentinel.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id != INVALID_MESSAGE_ID
    }
}

/// Display state of a node after the most recent tick that touched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeState {
    /// Idle.
    #[default]
    Waiting,
    /// Relayed a message to its followers.
    Sending,
    /// Dropped a message it did not want to relay.
    Rejecting,
    /// Consumed a message it had already relayed before.
    Repeated,
}

/// Display state of a link after the most recent propagation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkState {
    /// Idle.
    #[default]
    Waiting,
    /// The target accepted a message over this link.
    Sending,
    /// The target turned a message down.
    Rejecting,
}

/// A participant in the social graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: String,
    /// Directional trait profile.
    pub profile: TraitProfile,
    /// Pending messages, oldest first.
    pub queue: VecDeque<Message>,
    /// Ids of messages this node has relayed, in order.
    pub sent_log: Vec<MessageId>,
    /// Ids of messages this node has dequeued, in order.
    pub received_log: Vec<MessageId>,
    /// Display state.
    pub state: NodeState,
}

impl Node {
    /// Create an idle node with empty queue and logs.
    #[must_use]
    pub fn new(id: impl Into<String>, profile: TraitProfile) -> Self {
        Self {
            id: id.into(),
            profile,
            queue: VecDeque::new(),
            sent_log: Vec::new(),
            received_log: Vec::new(),
            state: NodeState::Waiting,
        }
    }

    /// Stable identifier of the node.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the node has already relayed `message_id`.
    #[must_use]
    pub fn has_sent(&self, message_id: &str) -> bool {
        self.sent_log.iter().any(|id| id == message_id)
    }

    /// Whether the node has already dequeued `message_id`.
    #[must_use]
    pub fn has_received(&self, message_id: &str) -> bool {
        self.received_log.iter().any(|id| id == message_id)
    }

    /// Whether `message_id` is waiting in the node's queue.
    #[must_use]
    pub fn has_pending(&self, message_id: &str) -> bool {
        self.queue.iter().any(|m| m.id == message_id)
    }

    /// Drop pending messages and both logs.
    pub fn clear_messages(&mut self) {
        self.queue.clear();
        self.sent_log.clear();
        self.received_log.clear();
    }
}

/// A directed link; messages flow from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    source: NodeKey,
    target: NodeKey,
    /// Display state.
    pub state: LinkState,
}

impl Link {
    /// Key of the sending end.
    #[inline]
    #[must_use]
    pub const fn source(&self) -> NodeKey {
        self.source
    }

    /// Key of the receiving end.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> NodeKey {
        self.target
    }
}

/// A directed social graph with per-node message queues.
///
/// Node ids are unique, there is at most one link per ordered pair, and no
/// node links to itself. [`Graph::validate`] checks these invariants for
/// graphs that did not come through the mutation API (e.g. deserialized
/// snapshots).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    pub(crate) links: SlotMap<LinkKey, Link>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of links.
    #[inline]
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Look up the arena key of a node id.
    #[must_use]
    pub fn node_key(&self, id: &str) -> Option<NodeKey> {
        self.nodes
            .iter()
            .find(|(_, node)| node.id == id)
            .map(|(key, _)| key)
    }

    /// Node with the given id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.values().find(|node| node.id == id)
    }

    /// Mutable access to the node with the given id.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.values_mut().find(|node| node.id == id)
    }

    /// Node stored under `key`.
    #[inline]
    #[must_use]
    pub fn node_by_key(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Iterate over all nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> + '_ {
        self.nodes.iter()
    }

    /// Iterate over all links in arena order.
    pub fn links(&self) -> impl Iterator<Item = (LinkKey, &Link)> + '_ {
        self.links.iter()
    }

    fn link_key_by_keys(&self, source: NodeKey, target: NodeKey) -> Option<LinkKey> {
        self.links
            .iter()
            .find(|(_, link)| link.source == source && link.target == target)
            .map(|(key, _)| key)
    }

    /// Arena key of the link `source_id -> target_id`.
    #[must_use]
    pub fn link_key(&self, source_id: &str, target_id: &str) -> Option<LinkKey> {
        let source = self.node_key(source_id)?;
        let target = self.node_key(target_id)?;
        self.link_key_by_keys(source, target)
    }

    /// The link `source_id -> target_id`.
    #[must_use]
    pub fn link(&self, source_id: &str, target_id: &str) -> Option<&Link> {
        self.link_key(source_id, target_id)
            .and_then(|key| self.links.get(key))
    }

    /// Ids of both endpoints of the link stored under `key`.
    #[must_use]
    pub fn link_endpoints(&self, key: LinkKey) -> Option<(&str, &str)> {
        let link = self.links.get(key)?;
        let source = self.nodes.get(link.source)?;
        let target = self.nodes.get(link.target)?;
        Some((source.id(), target.id()))
    }

    /// Add an idle node.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::DuplicateNode`] if the id is taken.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        profile: TraitProfile,
    ) -> SpreadResult<NodeKey> {
        let id = id.into();
        if self.node_key(&id).is_some() {
            tracing::warn!(node = %id, "node already exists");
            return Err(SpreadError::DuplicateNode(id));
        }
        Ok(self.nodes.insert(Node::new(id, profile)))
    }

    /// Remove a node together with every link touching it.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::NodeNotFound`] if no such node exists.
    pub fn remove_node(&mut self, id: &str) -> SpreadResult<Node> {
        let key = self
            .node_key(id)
            .ok_or_else(|| SpreadError::NodeNotFound(id.to_string()))?;
        self.links
            .retain(|_, link| link.source != key && link.target != key);
        self.nodes
            .remove(key)
            .ok_or_else(|| SpreadError::NodeNotFound(id.to_string()))
    }

    /// Add the link `source_id -> target_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::NodeNotFound`] if either endpoint is missing,
    /// [`SpreadError::SelfLink`] if both ids are equal, and
    /// [`SpreadError::DuplicateLink`] if the link already exists.
    pub fn add_link(&mut self, source_id: &str, target_id: &str) -> SpreadResult<LinkKey> {
        let source = self
            .node_key(source_id)
            .ok_or_else(|| SpreadError::NodeNotFound(source_id.to_string()))?;
        let target = self
            .node_key(target_id)
            .ok_or_else(|| SpreadError::NodeNotFound(target_id.to_string()))?;
        if source == target {
            return Err(SpreadError::SelfLink(source_id.to_string()));
        }
        if self.link_key_by_keys(source, target).is_some() {
            return Err(SpreadError::DuplicateLink {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            });
        }
        Ok(self.links.insert(Link {
            source,
            target,
            state: LinkState::Waiting,
        }))
    }

    /// Remove the link `source_id -> target_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::LinkNotFound`] if no such link exists.
    pub fn remove_link(&mut self, source_id: &str, target_id: &str) -> SpreadResult<()> {
        let key = self
            .link_key(source_id, target_id)
            .ok_or_else(|| SpreadError::LinkNotFound {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            })?;
        self.links.remove(key);
        Ok(())
    }

    /// Append a message to a node's queue.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::NodeNotFound`] if no such node exists.
    pub fn insert_message(&mut self, node_id: &str, message: Message) -> SpreadResult<()> {
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| SpreadError::NodeNotFound(node_id.to_string()))?;
        node.queue.push_back(message);
        Ok(())
    }

    /// Ids of the followers of `node_id`, in link order.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::NodeNotFound`] if no such node exists.
    pub fn followers(&self, node_id: &str) -> SpreadResult<Vec<&str>> {
        let key = self
            .node_key(node_id)
            .ok_or_else(|| SpreadError::NodeNotFound(node_id.to_string()))?;
        Ok(self
            .links
            .values()
            .filter(|link| link.source == key)
            .filter_map(|link| self.nodes.get(link.target).map(Node::id))
            .collect())
    }

    /// Set a node's display state.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::NodeNotFound`] if no such node exists.
    pub fn set_node_state(&mut self, node_id: &str, state: NodeState) -> SpreadResult<()> {
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| SpreadError::NodeNotFound(node_id.to_string()))?;
        node.state = state;
        Ok(())
    }

    /// Set a link's display state.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::LinkNotFound`] if no such link exists.
    pub fn set_link_state(
        &mut self,
        source_id: &str,
        target_id: &str,
        state: LinkState,
    ) -> SpreadResult<()> {
        let key = self
            .link_key(source_id, target_id)
            .ok_or_else(|| SpreadError::LinkNotFound {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            })?;
        self.links[key].state = state;
        Ok(())
    }

    /// Return every node and link to the idle state.
    pub fn reset_states(&mut self) {
        for node in self.nodes.values_mut() {
            node.state = NodeState::Waiting;
        }
        for link in self.links.values_mut() {
            link.state = LinkState::Waiting;
        }
    }

    /// Drop all queued messages and clear every node's logs.
    pub fn reset_messages(&mut self) {
        for node in self.nodes.values_mut() {
            node.clear_messages();
        }
    }

    /// Remove every node and link.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }

    /// Total number of queued messages across all nodes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.nodes.values().map(|node| node.queue.len()).sum()
    }

    /// All queued messages, node by node.
    #[must_use]
    pub fn pending_messages(&self) -> Vec<&Message> {
        self.nodes
            .values()
            .flat_map(|node| node.queue.iter())
            .collect()
    }

    /// Whether no node holds a pending message.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.nodes.values().all(|node| node.queue.is_empty())
    }

    /// Check the structural invariants of the graph.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::InvalidSnapshot`] describing the first violation:
    /// a duplicate node id, a link to a missing node, a self-link or a
    /// duplicate link.
    pub fn validate(&self) -> SpreadResult<()> {
        let mut ids: Vec<&str> = self.nodes.values().map(Node::id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(SpreadError::InvalidSnapshot(format!(
                "duplicate node id `{}`",
                pair[0]
            )));
        }

        let mut pairs = Vec::with_capacity(self.links.len());
        for link in self.links.values() {
            if !self.nodes.contains_key(link.source) || !self.nodes.contains_key(link.target) {
                return Err(SpreadError::InvalidSnapshot(
                    "link references a missing node".to_string(),
                ));
            }
            if link.source == link.target {
                return Err(SpreadError::InvalidSnapshot(format!(
                    "self-link on `{}`",
                    self.nodes[link.source].id
                )));
            }
            pairs.push((link.source, link.target));
        }
        pairs.sort_unstable();
        if pairs.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(SpreadError::InvalidSnapshot("duplicate link".to_string()));
        }

        Ok(())
    }
}
