//! Node cache: owns every node of a search and deduplicates them by state.
//!
//! There is at most one node per (kind, state). Looking a state up before
//! creating it is what turns the recursive game tree into a finite graph.
//! The graph is not always acyclic.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::node::{Node, NodeId};
use crate::state::State;

#[derive(Debug, Default)]
pub struct NodeCache {
    nodes: Vec<Node>,
    spin_nodes: HashMap<State, NodeId>,
    decide_nodes: HashMap<State, NodeId>,
    terminal_nodes: HashMap<State, NodeId>,
    final_spin_nodes: usize,
}

/// Returns the cached id for `state`, creating the node with `make` if needed.
/// The flag is true when a node was created.
fn lookup_or_insert(
    index: &mut HashMap<State, NodeId>,
    nodes: &mut Vec<Node>,
    state: &State,
    make: fn(State) -> Node,
) -> (NodeId, bool) {
    match index.entry(*state) {
        Entry::Occupied(e) => (*e.get(), false),
        Entry::Vacant(e) => {
            let id = NodeId::new(nodes.len());
            nodes.push(make(*state));
            e.insert(id);
            (id, true)
        }
    }
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or fetch) the node of the right kind for `state`.
    pub fn create_node(&mut self, state: &State) -> NodeId {
        if state.terminal() {
            self.create_terminal_node(state)
        } else if state.can_pass() {
            self.create_decide_node(state)
        } else {
            self.create_spin_node(state)
        }
    }

    pub fn create_terminal_node(&mut self, state: &State) -> NodeId {
        lookup_or_insert(&mut self.terminal_nodes, &mut self.nodes, state, Node::terminal).0
    }

    pub fn create_spin_node(&mut self, state: &State) -> NodeId {
        let (id, created) = lookup_or_insert(&mut self.spin_nodes, &mut self.nodes, state, Node::spin);
        if created && state.spins() == 1 {
            self.final_spin_nodes += 1;
        }
        id
    }

    pub fn create_decide_node(&mut self, state: &State) -> NodeId {
        lookup_or_insert(&mut self.decide_nodes, &mut self.nodes, state, Node::decide).0
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn spin_count(&self) -> usize {
        self.spin_nodes.len()
    }

    pub fn decide_count(&self) -> usize {
        self.decide_nodes.len()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminal_nodes.len()
    }

    /// Spin nodes created with a single spin left in the whole game.
    pub fn final_spin_nodes(&self) -> usize {
        self.final_spin_nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::new(i), node))
    }
}
