//! Optimal play/pass decisions for a three-player spin game.
//!
//! The game tree is searched as a graph of decision, spin and terminal nodes
//! keyed by game state, with win probabilities propagated back to the root
//! by iterative deepening.

pub mod board;
pub mod cache;
pub mod cli;
pub mod display;
pub mod error;
pub mod logging;
pub mod node;
pub mod payoff;
pub mod search;
pub mod spin;
pub mod state;
pub mod weighted_set;

/// Probability (or unnormalized probability mass).
pub type Prob = f64;
