//! Boards and the two game operators.
//!
//! A `SpinOperator` is a weighted set of spin values: one spin of the board.
//! Composing it with itself precomputes several spins as one operator, which
//! the search uses to resolve runs of passed spins in a single step.
//! `PassOperator` is the deterministic pass transition.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{PylError, PylResult};
use crate::spin::SpinValue;
use crate::state::State;
use crate::weighted_set::WeightedSet;
use crate::Prob;

/// Names accepted by [`by_name`].
pub const BOARD_NAMES: &[&str] = &["feb85", "feb85-spread", "simple", "test"];

static FEB85: Lazy<SpinOperator> = Lazy::new(SpinOperator::feb85);
static FEB85_SPREAD: Lazy<SpinOperator> = Lazy::new(|| FEB85.spread_common());

/// Distribution over the states reachable from one state.
pub type ProbState = WeightedSet<State>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpinOperator {
    expr: WeightedSet<SpinValue>,
}

impl SpinOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_set(expr: WeightedSet<SpinValue>) -> Self {
        SpinOperator { expr }
    }

    pub fn expr(&self) -> &WeightedSet<SpinValue> {
        &self.expr
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.expr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_empty()
    }

    pub fn add(&mut self, weight: Prob, value: SpinValue) {
        self.expr.add(weight, value);
    }

    pub fn normalize(&mut self) {
        self.expr.normalize();
    }

    pub fn total_weight(&self) -> Prob {
        self.expr.weight()
    }

    /// Apply every outcome to `state`, merging outcomes that lead to the same state.
    pub fn apply(&self, state: &State) -> ProbState {
        let mut res = ProbState::new();
        for (value, weight) in self.expr.iter() {
            res.add(weight, state.apply(*value));
        }
        res
    }

    /// The operator that applies `inner` and then `self`.
    pub fn compose(&self, inner: &SpinOperator) -> SpinOperator {
        let mut res = SpinOperator::new();
        for (t, wt) in inner.expr.iter() {
            for (u, wu) in self.expr.iter() {
                res.add(wu * wt, u.after(*t));
            }
        }
        res
    }

    /// `n` spins of this board as one operator. `n` below 1 is treated as 1.
    pub fn power(&self, n: usize) -> SpinOperator {
        let mut res = self.clone();
        for _ in 1..n {
            res = self.compose(&res);
        }
        res
    }

    pub fn approx_eq(&self, other: &SpinOperator, epsilon: Prob) -> bool {
        self.expr.approx_eq(&other.expr, epsilon)
    }

    // Board-building helpers. `extra` is added to the base weight of 1.0 for
    // spaces that can also be reached through movement spaces.

    pub fn whammy_space(&mut self) {
        self.add(1.0, SpinValue::whammy());
    }

    pub fn score_space(&mut self, score: i32, extra: Prob) {
        self.add(1.0 + extra, SpinValue::new(score, 0));
    }

    pub fn spin_space(&mut self, score: i32, extra: Prob) {
        self.add(1.0 + extra, SpinValue::new(score, 1));
    }

    /// Prizes count as a flat 2500.
    pub fn prize_space(&mut self, extra: Prob) {
        self.score_space(2500, extra);
    }

    /// Move `value`'s mass half to `low`, half to `high`.
    pub fn spread(&mut self, value: SpinValue, low: SpinValue, high: SpinValue) {
        self.expr.spread(&value, low, high);
    }

    /// Drop the rarer values of the 1983-86 boards into their neighbours.
    /// Fewer outcomes lets the search go deeper for the same memory.
    pub fn spread_common(&self) -> SpinOperator {
        let mut res = self.clone();
        res.spread(SpinValue::new(4000, 1), SpinValue::new(3000, 1), SpinValue::new(5000, 1));
        res.spread(SpinValue::new(1750, 0), SpinValue::new(1500, 0), SpinValue::new(2000, 0));
        res.spread(SpinValue::new(2250, 0), SpinValue::new(2000, 0), SpinValue::new(2500, 0));
        res
    }

    /// A small illustrative board.
    pub fn simple() -> SpinOperator {
        let mut b = SpinOperator::new();
        b.add(0.1, SpinValue::whammy());
        b.add(0.1, SpinValue::new(1000, 1));
        b.add(0.1, SpinValue::new(4000, 1));
        b.add(0.2, SpinValue::new(2000, 0));
        b.add(0.2, SpinValue::new(500, 0));
        b.add(0.1, SpinValue::new(1000, 0));
        b.add(0.2, SpinValue::new(2500, 0));
        b.normalize();
        b
    }

    /// Three outcomes; small enough to search exhaustively.
    pub fn test() -> SpinOperator {
        let mut b = SpinOperator::new();
        b.add(0.20, SpinValue::whammy());
        b.add(0.30, SpinValue::new(1000, 1));
        b.add(0.50, SpinValue::new(2000, 0));
        b
    }

    /// One of the canonical boards of the 1983-86 series, from February 1985.
    ///
    /// Movement spaces are folded into the spaces they can lead to:
    /// pick-a-corner, go-back-two, move-one, advance-two and big bucks.
    pub fn feb85() -> SpinOperator {
        const PC: Prob = 1.0 / 9.0;
        const B2: Prob = 1.0 / 3.0;
        const M1: Prob = 1.0 / 6.0;
        const A2: Prob = 1.0 / 3.0;
        const BB: Prob = 1.0 / 3.0;

        let mut b = SpinOperator::new();
        // 1
        b.score_space(1400, PC);
        b.score_space(1750, PC);
        b.score_space(2250, PC);
        // 2
        b.score_space(500, 0.0);
        b.score_space(1250, 0.0);
        b.prize_space(0.0);
        // 3
        b.score_space(500, 0.0);
        b.score_space(2000, 0.0);
        b.whammy_space();
        // 4
        b.spin_space(3000, B2 + BB);
        b.spin_space(4000, B2 + BB);
        b.spin_space(5000, B2 + BB);
        // 5
        b.score_space(750, 0.0);
        b.prize_space(0.0);
        b.whammy_space();
        // 6: the other spaces are pick-a-corner and go-back-two
        b.spin_space(700, 0.0);
        // 7
        b.score_space(750, 0.0);
        b.prize_space(0.0);
        b.whammy_space();
        // 8
        b.spin_space(500, M1);
        b.spin_space(750, M1);
        b.spin_space(1000, M1);
        // 9: plus move-one
        b.score_space(800, 0.0);
        b.whammy_space();
        // 10
        b.prize_space(PC + M1);
        b.prize_space(PC + M1);
        b.prize_space(PC + M1);
        // 11: plus advance-two
        b.score_space(1500, 0.0);
        b.whammy_space();
        // 12: plus big bucks
        b.score_space(500, 0.0);
        b.whammy_space();
        // 13
        b.score_space(1500, A2 + M1);
        b.score_space(2500, A2 + M1);
        b.prize_space(A2 + M1);
        // 14: plus move-one
        b.score_space(2000, 0.0);
        b.whammy_space();
        // 15
        b.spin_space(1000, PC + M1);
        b.score_space(2000, PC + M1);
        b.prize_space(PC + M1);
        // 16
        b.spin_space(750, 0.0);
        b.spin_space(1500, 0.0);
        b.whammy_space();
        // 17
        b.score_space(600, 0.0);
        b.spin_space(700, 0.0);
        b.prize_space(0.0);
        // 18
        b.spin_space(750, 0.0);
        b.spin_space(1000, 0.0);
        b.whammy_space();

        b.normalize();
        b
    }
}

impl fmt::Display for SpinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spin[")?;
        for (value, weight) in self.expr.sorted_by_weight().into_iter().rev() {
            write!(f, "{:.3}:{} ", weight, value)?;
        }
        write!(f, "]")
    }
}

/// The pass transition. Deterministic, so it yields a single state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassOperator;

impl PassOperator {
    pub fn apply(&self, state: &State) -> State {
        state.pass()
    }
}

impl fmt::Display for PassOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass[]")
    }
}

// ---------------------------------------------------------------------------
// Board files
// ---------------------------------------------------------------------------

/// One space of a board file. A score of 0 is a whammy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSpace {
    pub score: i32,
    #[serde(default)]
    pub earned: u8,
    #[serde(default = "default_weight")]
    pub weight: Prob,
}

fn default_weight() -> Prob {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardFile {
    #[serde(default)]
    pub name: String,
    pub spaces: Vec<BoardSpace>,
}

impl BoardFile {
    /// Build the normalized operator, rejecting unusable weights.
    pub fn to_operator(&self) -> PylResult<SpinOperator> {
        let mut board = SpinOperator::new();
        for space in &self.spaces {
            if !space.weight.is_finite() || space.weight < 0.0 {
                return Err(PylError::InvalidBoard(format!(
                    "space {} has weight {}",
                    space.score, space.weight
                )));
            }
            let value = SpinValue::new(space.score, space.earned);
            if space.score != 0 && value.is_whammy() {
                log::warn!(
                    "space {} rounds to 0 and will count as a whammy without extra spins",
                    space.score
                );
            }
            board.add(space.weight, value);
        }
        if board.total_weight() <= 0.0 {
            return Err(PylError::InvalidBoard("total weight must be positive".to_string()));
        }
        board.normalize();
        Ok(board)
    }
}

pub fn from_json_str(json: &str) -> PylResult<SpinOperator> {
    let file: BoardFile = serde_json::from_str(json)?;
    file.to_operator()
}

pub fn from_json_file(path: &Path) -> PylResult<SpinOperator> {
    let json = std::fs::read_to_string(path)?;
    from_json_str(&json)
}

/// A built-in board.
pub fn by_name(name: &str) -> PylResult<SpinOperator> {
    match name.to_lowercase().as_str() {
        "feb85" => Ok(FEB85.clone()),
        "feb85-spread" => Ok(FEB85_SPREAD.clone()),
        "simple" => Ok(SpinOperator::simple()),
        "test" => Ok(SpinOperator::test()),
        _ => Err(PylError::UnknownBoard(format!(
            "{} (built-in boards: {})",
            name,
            BOARD_NAMES.join(", ")
        ))),
    }
}

/// A built-in board name, or else a path to a JSON board file.
pub fn load(board: &str) -> PylResult<SpinOperator> {
    match by_name(board) {
        Ok(b) => Ok(b),
        Err(e) => {
            let path = Path::new(board);
            if path.exists() {
                from_json_file(path)
            } else {
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Player;

    #[test]
    fn builtin_boards_are_normalized() {
        for name in BOARD_NAMES {
            let board = by_name(name).unwrap();
            assert!(
                (board.total_weight() - 1.0).abs() < 1e-9,
                "{} weight {}",
                name,
                board.total_weight()
            );
        }
    }

    #[test]
    fn feb85_quantizes_spaces() {
        let board = SpinOperator::feb85();
        // 1400 rounds to 1500, 700 to 750, 600 to 500, 800 to 750.
        assert!(board.expr().get(&SpinValue::new(1500, 0)) > 0.0);
        assert_eq!(SpinValue::new(1400, 0), SpinValue::new(1500, 0));
        assert!(board.expr().get(&SpinValue::new(750, 1)) > 0.0);
        for (value, _) in board.expr().iter() {
            assert_eq!(value.score() % crate::spin::MIN_SCORE_UNIT, 0);
        }
    }

    #[test]
    fn spread_removes_rare_values() {
        let board = by_name("feb85-spread").unwrap();
        assert_eq!(board.expr().get(&SpinValue::new(4000, 1)), 0.0);
        assert_eq!(board.expr().get(&SpinValue::new(1750, 0)), 0.0);
        assert_eq!(board.expr().get(&SpinValue::new(2250, 0)), 0.0);
        assert!((board.total_weight() - 1.0).abs() < 1e-9);
        assert!(board.len() < SpinOperator::feb85().len());
    }

    #[test]
    fn power_counts_spins() {
        let board = SpinOperator::test();
        let two = board.power(2);
        assert!((two.total_weight() - 1.0).abs() < 1e-12);
        // Two plain 2000s.
        assert!((two.expr().get(&SpinValue::with_taken(4000, 0, 2)) - 0.25).abs() < 1e-12);
        // First spin a whammy: the batch stops there.
        assert!((two.expr().get(&SpinValue::whammy()) - 0.2).abs() < 1e-12);
        assert_eq!(board.power(1), board);
        assert_eq!(board.power(0), board);
    }

    #[test]
    fn apply_yields_distribution_over_states() {
        let board = SpinOperator::test();
        let s = State::new([Player::new(0, 1), Player::new(1000, 0), Player::new(0, 0)]);
        let next = board.apply(&s);
        assert_eq!(next.len(), 3);
        assert!((next.weight() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pass_operator_matches_state_pass() {
        let s = State::new([Player::new(0, 2), Player::new(1000, 0), Player::new(500, 0)]);
        assert_eq!(PassOperator.apply(&s), s.pass());
    }

    #[test]
    fn json_board_is_normalized() {
        let json = r#"{ "name": "tiny", "spaces": [
            { "score": 0, "weight": 1 },
            { "score": 1000, "earned": 1 },
            { "score": 2000, "weight": 2 }
        ] }"#;
        let board = from_json_str(json).unwrap();
        assert_eq!(board.len(), 3);
        assert!((board.expr().get(&SpinValue::new(2000, 0)) - 0.5).abs() < 1e-12);
        assert!((board.expr().get(&SpinValue::whammy()) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn json_space_rounding_to_zero_joins_the_whammy() {
        let json = r#"{ "spaces": [
            { "score": 0 },
            { "score": 100, "earned": 1 },
            { "score": 1000 }
        ] }"#;
        let board = from_json_str(json).unwrap();
        assert_eq!(board.len(), 2);
        assert!((board.expr().get(&SpinValue::whammy()) - 2.0 / 3.0).abs() < 1e-12);
        assert!(board.expr().iter().all(|(v, _)| !v.is_whammy() || v.earned() == 0));
    }

    #[test]
    fn json_board_rejects_negative_weight() {
        let json = r#"{ "spaces": [ { "score": 500, "weight": -1 } ] }"#;
        assert!(matches!(from_json_str(json), Err(PylError::InvalidBoard(_))));
    }

    #[test]
    fn unknown_board_name() {
        assert!(matches!(load("no-such-board"), Err(PylError::UnknownBoard(_))));
    }
}
