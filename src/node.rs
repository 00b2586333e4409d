//! Search nodes.
//!
//! Nodes live in the `NodeCache` arena and refer to each other by `NodeId`.
//! The same node may be reached from many parents, and passing spins at the
//! score cap can lead back to an earlier state, so the search graph may have
//! cycles. Each node caches its payoff; `None` means it must be recomputed.

use std::fmt;

use crate::payoff::Payoff;
use crate::state::{State, NUM_PLAYERS};
use crate::Prob;

/// Handle to a node in the cache arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One outcome of a spin node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branch {
    pub prob: Prob,
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Game over.
    Terminal,
    /// The player up must spin. Branches are filled in on first expansion.
    Spin { branches: Vec<Branch> },
    /// The player up may play or pass. A missing branch is not allowed.
    Decide {
        play: Option<NodeId>,
        pass: Option<NodeId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Undecided,
    Play,
    Pass,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Undecided => write!(f, "undecided"),
            Decision::Play => write!(f, "play"),
            Decision::Pass => write!(f, "pass"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    state: State,
    payoff: Option<Payoff>,
    /// Generation of the last scan that visited this node.
    visited: u32,
    kind: NodeKind,
}

impl Node {
    fn with_kind(state: State, kind: NodeKind) -> Self {
        Node {
            state,
            payoff: None,
            visited: 0,
            kind,
        }
    }

    pub fn terminal(state: State) -> Self {
        Self::with_kind(state, NodeKind::Terminal)
    }

    pub fn spin(state: State) -> Self {
        Self::with_kind(state, NodeKind::Spin { branches: Vec::new() })
    }

    pub fn decide(state: State) -> Self {
        Self::with_kind(
            state,
            NodeKind::Decide {
                play: None,
                pass: None,
            },
        )
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The cached payoff, if it is current.
    pub fn payoff(&self) -> Option<&Payoff> {
        self.payoff.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            NodeKind::Terminal => "end",
            NodeKind::Spin { .. } => "spin",
            NodeKind::Decide { .. } => "decide",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal)
    }

    /// Play branch of a decision node.
    pub fn play(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Decide { play, .. } => play,
            _ => None,
        }
    }

    /// Pass branch of a decision node.
    pub fn pass(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Decide { pass, .. } => pass,
            _ => None,
        }
    }

    /// Outcomes of a spin node; empty for other kinds or before expansion.
    pub fn branches(&self) -> &[Branch] {
        match &self.kind {
            NodeKind::Spin { branches } => branches,
            _ => &[],
        }
    }

    pub(crate) fn visited(&self, generation: u32) -> bool {
        self.visited == generation
    }

    pub(crate) fn mark_visited(&mut self, generation: u32) {
        self.visited = generation;
    }

    pub(crate) fn set_payoff(&mut self, payoff: Payoff) {
        self.payoff = Some(payoff);
    }

    pub(crate) fn invalidate(&mut self) {
        self.payoff = None;
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.label(), self.state)?;
        match &self.payoff {
            Some(p) => write!(f, "{}", p),
            None => write!(f, "(nil)"),
        }
    }
}

/// Win probabilities once the game is over.
///
/// Eliminated players cannot win. Players tied at the top score split the
/// win evenly. If everyone is out, all players split it.
pub fn terminal_payoff(state: &State) -> Payoff {
    let alive = || state.players.iter().enumerate().filter(|(_, p)| !p.out());
    let mut prob = [0.0; NUM_PLAYERS];
    match alive().map(|(_, p)| p.score).max() {
        Some(max) => {
            let winners: Vec<usize> = alive()
                .filter(|(_, p)| p.score == max)
                .map(|(i, _)| i)
                .collect();
            let share = 1.0 / winners.len() as Prob;
            for i in winners {
                prob[i] = share;
            }
        }
        None => prob = [1.0 / NUM_PLAYERS as Prob; NUM_PLAYERS],
    }
    Payoff::from_probs(prob)
}
