//! Iterative-deepening play/pass search.
//!
//! Each pass of the search walks the node graph from the root down to a depth
//! limit, expanding nodes the first time they are reached and invalidating
//! the cached payoff of every node it visits whose estimate is still too
//! uncertain. Payoffs are then recomputed lazily from the root. Nodes that
//! have been resolved well enough are left alone, so later passes only pay
//! for the part of the graph that still matters.
//!
//! The search never fails: an unconverged root is reported through
//! `SearchResult` with whatever bounds the last pass established.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::board::{PassOperator, SpinOperator};
use crate::cache::NodeCache;
use crate::error::{PylError, PylResult};
use crate::node::{terminal_payoff, Branch, Decision, NodeId, NodeKind};
use crate::payoff::{self, Interval, Payoff};
use crate::state::State;
use crate::Prob;

/// Upper bound on how many passed spins are merged into one spin node.
pub const MAX_PASSED_SPINS: usize = 7;

/// Depth limit of the first pass.
pub const FIRST_DEPTH: u32 = 4;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// A node whose payoff is at most this uncertain is not searched again.
    pub max_uncertainty: Prob,
    /// Above this lead over the passee, playing is not considered. 0 disables.
    pub max_lead: u32,
    /// Ceiling on the iterative deepening depth.
    pub max_depth: u32,
    /// Largest number of passed spins taken as one batch.
    pub max_passed_spins: usize,
    /// Resolve a run of passed spins in one step with a precomposed board.
    pub merge_passed_spins: bool,
    /// A player trailing both opponents never passes.
    pub always_spin_third_place: bool,
    /// Reserved. Accepted in config files but not used by the search.
    pub optimize_final_spin: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            max_uncertainty: 0.03,
            max_lead: 15000,
            max_depth: 64,
            max_passed_spins: MAX_PASSED_SPINS,
            merge_passed_spins: true,
            always_spin_third_place: true,
            optimize_final_spin: false,
        }
    }
}

impl SearchOptions {
    pub fn validate(&self) -> PylResult<()> {
        if !self.max_uncertainty.is_finite() || !(0.0..=1.0).contains(&self.max_uncertainty) {
            return Err(PylError::InvalidOption(format!(
                "max_uncertainty must be in [0, 1], got {}",
                self.max_uncertainty
            )));
        }
        if self.max_passed_spins == 0 || self.max_passed_spins > MAX_PASSED_SPINS {
            return Err(PylError::InvalidOption(format!(
                "max_passed_spins must be in 1..={}, got {}",
                MAX_PASSED_SPINS, self.max_passed_spins
            )));
        }
        if self.max_depth <= FIRST_DEPTH {
            return Err(PylError::InvalidOption(format!(
                "max_depth must exceed {}, got {}",
                FIRST_DEPTH, self.max_depth
            )));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> PylResult<Self> {
        let options: SearchOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file(path: &Path) -> PylResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

// ---------------------------------------------------------------------------
// Stop condition & result
// ---------------------------------------------------------------------------

/// How much further a scan may descend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopCondition {
    pub depth: u32,
}

impl StopCondition {
    pub fn new(depth: u32) -> Self {
        StopCondition { depth }
    }

    /// The condition for a child: one level less to go.
    pub fn deeper(&self) -> Self {
        StopCondition {
            depth: self.depth.saturating_sub(1),
        }
    }

    pub fn reached(&self) -> bool {
        self.depth == 0
    }
}

/// What the last run established about the root decision.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Win range of the player up if they play.
    pub play_win: Interval<Prob>,
    /// Win range of the player up if they pass.
    pub pass_win: Interval<Prob>,
    /// Depth limit of the last pass.
    pub depth: u32,
    pub passes: u32,
    pub solved: bool,
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "play {} pass {} depth {} passes {}{}",
            self.play_win,
            self.pass_win,
            self.depth,
            self.passes,
            if self.solved { "" } else { " (unsolved)" }
        )
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

pub struct Search {
    /// `spin_ops[n - 1]` is `n` spins of the board.
    spin_ops: Vec<SpinOperator>,
    pass_op: PassOperator,
    options: SearchOptions,
    cache: NodeCache,
    generation: u32,
    result: SearchResult,
}

impl Search {
    pub fn new(board: &SpinOperator, options: SearchOptions) -> PylResult<Self> {
        options.validate()?;
        log::debug!("board {}", board);
        let mut spin_ops = Vec::with_capacity(options.max_passed_spins);
        spin_ops.push(board.clone());
        for n in 1..options.max_passed_spins {
            let next = board.compose(&spin_ops[n - 1]);
            log::debug!("board^{}: {} outcomes", n + 1, next.len());
            spin_ops.push(next);
        }
        Ok(Search {
            spin_ops,
            pass_op: PassOperator,
            options,
            cache: NodeCache::new(),
            generation: 0,
            result: SearchResult::default(),
        })
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    pub fn result(&self) -> &SearchResult {
        &self.result
    }

    /// The operator for `n` consecutive spins, `1 <= n <= max_passed_spins`.
    pub fn spin_op(&self, n: usize) -> &SpinOperator {
        &self.spin_ops[n.clamp(1, self.spin_ops.len()) - 1]
    }

    /// Search `init` until the root decision is settled or the depth ceiling
    /// is reached. Returns the root node.
    pub fn run(&mut self, init: State) -> NodeId {
        let root = self.root(init);
        self.result = SearchResult::default();
        log::info!("searching {}", self.cache.node(root).state());

        let mut depth = FIRST_DEPTH;
        while depth < self.options.max_depth {
            if self.step(root, depth) {
                break;
            }
            let node = self.cache.node(root);
            if node.play().is_none() && node.pass().is_none() {
                log::warn!("{} has no moves, stopping", node.state());
                break;
            }
            depth += if depth < 32 { 8 } else { 4 };
        }
        log::info!("{}", self.result);
        root
    }

    /// The root decision node for `init`, with control handed to the first
    /// player who has spins.
    pub fn root(&mut self, mut init: State) -> NodeId {
        init.change_player();
        self.cache.create_decide_node(&init)
    }

    /// One deepening pass. Returns true once the root decision is settled.
    pub fn step(&mut self, root: NodeId, depth: u32) -> bool {
        self.generation = self.generation.wrapping_add(1);
        self.scan(root, StopCondition::new(depth));
        let payoff = self.payoff(root);
        let solved = self.solved(root);

        self.result.depth = depth;
        self.result.passes += 1;
        self.result.solved = solved;

        log::info!(
            "depth {}: {} nodes ({} final spin) {}",
            depth,
            self.cache.len(),
            self.cache.final_spin_nodes(),
            payoff
        );
        let node = self.cache.node(root);
        if node.play().is_some() {
            log::info!("   play: {}", self.result.play_win);
        }
        if node.pass().is_some() {
            log::info!("   pass: {}", self.result.pass_win);
        }
        solved
    }

    // -----------------------------------------------------------------------
    // Scan
    // -----------------------------------------------------------------------

    fn scan(&mut self, id: NodeId, stop: StopCondition) {
        let generation = self.generation;
        let node = self.cache.node_mut(id);
        if node.visited(generation) {
            return;
        }
        node.mark_visited(generation);
        if stop.reached() || payoff::uncertainty(node.payoff()) <= self.options.max_uncertainty {
            return;
        }
        let spin = match node.kind() {
            NodeKind::Terminal => return,
            NodeKind::Spin { .. } => true,
            NodeKind::Decide { .. } => false,
        };
        if spin {
            self.scan_spin(id, stop.deeper());
        } else {
            self.scan_decide(id, stop.deeper());
        }
    }

    fn scan_spin(&mut self, id: NodeId, stop: StopCondition) {
        self.cache.node_mut(id).invalidate();
        if self.cache.node(id).branches().is_empty() {
            let expanded = self.expand_spin(id);
            if let NodeKind::Spin { branches } = self.cache.node_mut(id).kind_mut() {
                *branches = expanded;
            }
        }
        for i in 0..self.cache.node(id).branches().len() {
            let child = self.cache.node(id).branches()[i].node;
            self.scan(child, stop);
        }
    }

    /// Outcomes of spinning in this node's state. Outcomes that leave the
    /// state unchanged are dropped and the rest renormalized.
    fn expand_spin(&mut self, id: NodeId) -> Vec<Branch> {
        let state = *self.cache.node(id).state();
        let batch = self.batch_size(&state);
        let next = self.spin_ops[batch - 1].apply(&state);

        let mut branches = Vec::with_capacity(next.len());
        let mut self_loop = 0.0;
        for (s, prob) in next.iter() {
            if *s == state {
                self_loop += prob;
            } else {
                branches.push(Branch {
                    prob,
                    node: self.cache.create_node(s),
                });
            }
        }

        let coverage: Prob = branches.iter().map(|b| b.prob).sum();
        if self_loop > 0.0 && coverage > 0.0 {
            log::debug!("{} loops back with p={}, renormalizing", state, self_loop);
            for b in branches.iter_mut() {
                b.prob /= coverage;
            }
        }
        log::debug!("expanded spin {} x{}: {} branches", state, batch, branches.len());
        branches
    }

    fn batch_size(&self, state: &State) -> usize {
        let passed = state.up_player().passed as usize;
        if self.options.merge_passed_spins && passed > 0 {
            passed.min(self.options.max_passed_spins)
        } else {
            1
        }
    }

    fn scan_decide(&mut self, id: NodeId, stop: StopCondition) {
        self.cache.node_mut(id).invalidate();
        let node = self.cache.node(id);
        let (mut play, mut pass) = (node.play(), node.pass());
        if play.is_none() && pass.is_none() {
            let state = *node.state();
            if self.play_allowed(&state) {
                play = Some(self.cache.create_spin_node(&state));
            }
            if self.pass_allowed(&state) {
                pass = Some(self.cache.create_node(&self.pass_op.apply(&state)));
            }
            if let NodeKind::Decide { play: p, pass: q } = self.cache.node_mut(id).kind_mut() {
                *p = play;
                *q = pass;
            }
        }
        if let Some(p) = play {
            self.scan(p, stop);
        }
        if let Some(q) = pass {
            self.scan(q, stop);
        }
    }

    fn play_allowed(&self, state: &State) -> bool {
        let max_lead = self.options.max_lead;
        !state.terminal() && !(max_lead != 0 && i64::from(state.lead()) > i64::from(max_lead))
    }

    fn pass_allowed(&self, state: &State) -> bool {
        state.can_pass() && !(self.options.always_spin_third_place && state.third_place())
    }

    // -----------------------------------------------------------------------
    // Payoffs
    // -----------------------------------------------------------------------

    /// The payoff of `id`, computing and caching it if it was invalidated.
    pub fn payoff(&mut self, id: NodeId) -> Payoff {
        if let Some(p) = self.cache.node(id).payoff() {
            return *p;
        }
        // Passing spins back and forth at the score cap can return to this
        // node. A zero stands in for it until the real payoff is known.
        self.cache.node_mut(id).set_payoff(Payoff::zero());
        let p = self.calc_payoff(id);
        self.cache.node_mut(id).set_payoff(p);
        p
    }

    fn calc_payoff(&mut self, id: NodeId) -> Payoff {
        let node = self.cache.node(id);
        let up = node.state().up_num();
        match *node.kind() {
            NodeKind::Terminal => terminal_payoff(node.state()),
            NodeKind::Spin { .. } => self.spin_payoff(id),
            NodeKind::Decide { play, pass } => self.decide_payoff(up, play, pass),
        }
    }

    /// Probability-weighted sum of the branch payoffs. Unexpanded means zero.
    fn spin_payoff(&mut self, id: NodeId) -> Payoff {
        let mut total = Payoff::zero();
        for i in 0..self.cache.node(id).branches().len() {
            let branch = self.cache.node(id).branches()[i];
            let child = self.payoff(branch.node);
            total.add_scaled(&child, branch.prob);
        }
        total
    }

    fn decide_payoff(&mut self, up: usize, play: Option<NodeId>, pass: Option<NodeId>) -> Payoff {
        match (play, pass) {
            (None, None) => Payoff::zero(),
            (Some(p), None) => self.payoff(p),
            (None, Some(q)) => self.payoff(q),
            (Some(p), Some(q)) => {
                let play = self.payoff(p);
                let pass = self.payoff(q);
                if play.prob(up) > pass.prob(up) {
                    play
                } else if pass.prob(up) > play.prob(up) {
                    pass
                } else {
                    Payoff::merge_min(&pass, &play)
                }
            }
        }
    }

    /// Which branch the payoff of decision node `id` came from.
    pub fn decision(&mut self, id: NodeId) -> Decision {
        let payoff = self.payoff(id);
        let node = self.cache.node(id);
        let (play, pass) = (node.play(), node.pass());
        if let Some(p) = play {
            if self.payoff(p) == payoff {
                return Decision::Play;
            }
        }
        if let Some(q) = pass {
            if self.payoff(q) == payoff {
                return Decision::Pass;
            }
        }
        Decision::Undecided
    }

    /// Whether the root decision is settled, updating the reported ranges.
    ///
    /// Settled means a single option, two options whose win ranges for the
    /// player up are disjoint, or two options both known to within
    /// `max_uncertainty`.
    pub fn solved(&mut self, root: NodeId) -> bool {
        let node = self.cache.node(root);
        if node.payoff().is_none() {
            return false;
        }
        let up = node.state().up_num();
        let (play, pass) = (node.play(), node.pass());
        if play.is_none() && pass.is_none() {
            return false;
        }

        let play_payoff = play.map(|p| self.payoff(p));
        let pass_payoff = pass.map(|q| self.payoff(q));
        if let Some(p) = &play_payoff {
            self.result.play_win = p.range(up);
        }
        if let Some(q) = &pass_payoff {
            self.result.pass_win = q.range(up);
        }

        match (play_payoff, pass_payoff) {
            (Some(p), Some(q)) => {
                !self.result.play_win.overlaps(&self.result.pass_win)
                    || (p.uncertainty() <= self.options.max_uncertainty
                        && q.uncertainty() <= self.options.max_uncertainty)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spin::{SpinValue, MAX_SCORE};
    use crate::state::Player;

    fn test_search(options: SearchOptions) -> Search {
        Search::new(&SpinOperator::test(), options).unwrap()
    }

    #[test]
    fn default_options_validate() {
        assert!(SearchOptions::default().validate().is_ok());
    }

    #[test]
    fn options_reject_bad_batch_cap() {
        for cap in [0, MAX_PASSED_SPINS + 1] {
            let options = SearchOptions {
                max_passed_spins: cap,
                ..Default::default()
            };
            assert!(matches!(options.validate(), Err(PylError::InvalidOption(_))));
            assert!(Search::new(&SpinOperator::test(), options).is_err());
        }
    }

    #[test]
    fn options_reject_bad_uncertainty() {
        for bad in [-0.1, 1.5, Prob::NAN] {
            let options = SearchOptions {
                max_uncertainty: bad,
                ..Default::default()
            };
            assert!(options.validate().is_err());
        }
    }

    #[test]
    fn options_json_fills_defaults() {
        let options = SearchOptions::from_json_str(r#"{ "max_lead": 0 }"#).unwrap();
        assert_eq!(options.max_lead, 0);
        assert_eq!(options.max_passed_spins, MAX_PASSED_SPINS);
        assert!(options.merge_passed_spins);
    }

    #[test]
    fn spin_ops_are_powers_of_the_board() {
        let search = test_search(SearchOptions::default());
        let board = SpinOperator::test();
        assert!(search.spin_op(1).approx_eq(&board, 1e-12));
        assert!(search.spin_op(3).approx_eq(&board.power(3), 1e-12));
    }

    #[test]
    fn stop_condition_counts_down() {
        let stop = StopCondition::new(1);
        assert!(!stop.reached());
        assert!(stop.deeper().reached());
        assert!(stop.deeper().deeper().reached());
    }

    #[test]
    fn batch_size_follows_passed_spins() {
        let search = test_search(SearchOptions {
            max_passed_spins: 3,
            ..Default::default()
        });
        let passed = |n| State::new([Player::new(0, 0).with_passed(n), Player::new(0, 0), Player::new(0, 0)]);
        assert_eq!(search.batch_size(&passed(2)), 2);
        assert_eq!(search.batch_size(&passed(5)), 3);
        let earned = State::new([Player::new(0, 2), Player::new(0, 0), Player::new(0, 0)]);
        assert_eq!(search.batch_size(&earned), 1);

        let unmerged = test_search(SearchOptions {
            merge_passed_spins: false,
            ..Default::default()
        });
        assert_eq!(unmerged.batch_size(&passed(4)), 1);
    }

    #[test]
    fn third_place_may_not_pass() {
        let search = test_search(SearchOptions::default());
        let s = State::new([Player::new(0, 1), Player::new(2000, 0), Player::new(3000, 0)]);
        assert!(search.play_allowed(&s));
        assert!(!search.pass_allowed(&s));

        let lenient = test_search(SearchOptions {
            always_spin_third_place: false,
            ..Default::default()
        });
        assert!(lenient.pass_allowed(&s));
    }

    #[test]
    fn large_lead_may_not_play() {
        let search = test_search(SearchOptions::default());
        let s = State::new([Player::new(17000, 1), Player::new(1000, 0), Player::new(500, 0)]);
        assert!(!search.play_allowed(&s));
        assert!(search.pass_allowed(&s));

        let uncapped = test_search(SearchOptions {
            max_lead: 0,
            ..Default::default()
        });
        assert!(uncapped.play_allowed(&s));

        let huge = test_search(SearchOptions {
            max_lead: u32::MAX,
            ..Default::default()
        });
        assert!(huge.play_allowed(&s));
    }

    #[test]
    fn self_loop_is_dropped_and_renormalized() {
        // At the score cap, the (1000, +1) space gives back the spin it took.
        let mut search = test_search(SearchOptions::default());
        let s = State::new([Player::new(MAX_SCORE, 1), Player::new(1000, 0), Player::new(500, 0)]);
        assert_eq!(s.apply(SpinValue::new(1000, 1)), s);

        let id = search.cache.create_spin_node(&s);
        search.generation += 1;
        search.scan(id, StopCondition::new(2));

        let branches = search.cache().node(id).branches().to_vec();
        assert_eq!(branches.len(), 2);
        assert!(branches.iter().all(|b| b.node != id));
        let total: Prob = branches.iter().map(|b| b.prob).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(branches.iter().any(|b| (b.prob - 0.2 / 0.7).abs() < 1e-12));
    }

    #[test]
    fn scan_stops_at_depth_zero() {
        let mut search = test_search(SearchOptions::default());
        let s = State::new([Player::new(0, 0).with_passed(1), Player::new(1000, 0), Player::new(500, 0)]);
        let id = search.cache.create_spin_node(&s);
        search.generation += 1;
        search.scan(id, StopCondition::new(0));
        assert!(search.cache().node(id).branches().is_empty());
    }

    #[test]
    fn unexpanded_decision_is_undecided() {
        let mut search = test_search(SearchOptions::default());
        let s = State::new([Player::new(0, 1), Player::new(1000, 0), Player::new(500, 0)]);
        let id = search.cache.create_decide_node(&s);
        assert_eq!(search.payoff(id), Payoff::zero());
        assert_eq!(search.decision(id), Decision::Undecided);
    }

    #[test]
    fn single_branch_root_is_solved() {
        let mut search = test_search(SearchOptions::default());
        let root = search.run(State::new([Player::new(0, 1), Player::new(2000, 0), Player::new(3000, 0)]));
        assert!(search.result().solved);
        assert_eq!(search.result().passes, 1);
        assert!(search.cache().node(root).pass().is_none());
        assert_eq!(search.decision(root), Decision::Play);
    }
}
