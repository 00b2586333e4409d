//! Game state: per-player records plus the index of the player who is up.
//!
//! `State` is the memoization key of the search, so equality and hashing
//! cover every field. Transitions that would otherwise produce states that
//! differ only in irrelevant detail normalize that detail away.

use std::fmt;
use std::str::FromStr;

use crate::error::{PylError, PylResult};
use crate::spin::{SpinValue, MAX_SCORE};

/// This implementation is specific to three players.
pub const NUM_PLAYERS: usize = 3;

/// By the rules of the game, four whammies and you're out.
pub const MAX_WHAMMIES: u8 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Player {
    pub score: u16,
    /// Spins the player may play or pass.
    pub earned: u8,
    /// Spins passed to this player, which must be played.
    pub passed: u8,
    pub whammies: u8,
}

impl Player {
    pub fn new(score: u16, earned: u8) -> Self {
        Player {
            score,
            earned,
            ..Default::default()
        }
    }

    pub fn with_passed(mut self, passed: u8) -> Self {
        self.passed = passed;
        self
    }

    pub fn with_whammies(mut self, whammies: u8) -> Self {
        self.whammies = whammies;
        self
    }

    pub fn spins(&self) -> u32 {
        self.earned as u32 + self.passed as u32
    }

    /// Consume `count` spins, passed spins first.
    pub fn take_spins(&mut self, count: u8) {
        if self.passed >= count {
            self.passed -= count;
        } else {
            self.earned = self.earned.saturating_sub(count - self.passed);
            self.passed = 0;
        }
    }

    pub fn can_pass(&self) -> bool {
        self.earned > 0 && self.passed == 0
    }

    pub fn out(&self) -> bool {
        self.whammies >= MAX_WHAMMIES
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State {
    pub players: [Player; NUM_PLAYERS],
    up: u8,
}

impl State {
    /// A state with player 0 up. Call `change_player` to find the real one.
    pub fn new(players: [Player; NUM_PLAYERS]) -> Self {
        State { players, up: 0 }
    }

    pub fn with_up(players: [Player; NUM_PLAYERS], up: usize) -> Self {
        debug_assert!(up < NUM_PLAYERS, "player {} out of range", up);
        State {
            players,
            up: up as u8,
        }
    }

    pub fn up_num(&self) -> usize {
        self.up as usize
    }

    pub fn set_up(&mut self, up: usize) {
        debug_assert!(up < NUM_PLAYERS, "player {} out of range", up);
        self.up = up as u8;
    }

    pub fn opponent_num(&self, n: usize) -> usize {
        (self.up_num() + n + 1) % NUM_PLAYERS
    }

    pub fn player(&self, i: usize) -> &Player {
        &self.players[i]
    }

    pub fn up_player(&self) -> &Player {
        &self.players[self.up_num()]
    }

    pub fn up_player_mut(&mut self) -> &mut Player {
        let up = self.up_num();
        &mut self.players[up]
    }

    pub fn opponent(&self, n: usize) -> &Player {
        &self.players[self.opponent_num(n)]
    }

    /// The opponent who would receive passed spins: the higher-scoring one
    /// still in the game. Ties go to `opponent(0)`; the passer gets no choice.
    pub fn passee_num(&self) -> usize {
        let (a, b) = (self.opponent_num(0), self.opponent_num(1));
        let (pa, pb) = (&self.players[a], &self.players[b]);
        match (pa.out(), pb.out()) {
            (false, true) => a,
            (true, false) => b,
            _ => {
                if pa.score >= pb.score {
                    a
                } else {
                    b
                }
            }
        }
    }

    pub fn passee(&self) -> &Player {
        &self.players[self.passee_num()]
    }

    /// Total spins left in the game.
    pub fn spins(&self) -> u32 {
        self.players.iter().map(Player::spins).sum()
    }

    pub fn total_whammies(&self) -> u32 {
        self.players.iter().map(|p| p.whammies as u32).sum()
    }

    pub fn count_out(&self) -> usize {
        self.players.iter().filter(|p| p.out()).count()
    }

    pub fn can_pass(&self) -> bool {
        self.up_player().can_pass()
    }

    /// No one can spin, or both opponents of the player up are out.
    ///
    /// The second case is the game against the house, which is not modelled:
    /// the last player standing is simply the winner.
    pub fn terminal(&self) -> bool {
        self.up_player().spins() == 0 || (self.opponent(0).out() && self.opponent(1).out())
    }

    /// The player up trails both opponents.
    pub fn third_place(&self) -> bool {
        let score = self.up_player().score;
        score < self.opponent(0).score && score < self.opponent(1).score
    }

    pub fn at_max(&self) -> bool {
        self.up_player().score >= MAX_SCORE
    }

    /// Score of the player up minus the passee's score.
    pub fn lead(&self) -> i32 {
        self.up_player().score as i32 - self.passee().score as i32
    }

    /// If the player up has no spins, hand control to the first player (by
    /// seat) that has some. When nobody does, `up` stays put: end of game.
    pub fn change_player(&mut self) {
        if self.up_player().spins() > 0 {
            return;
        }
        if let Some(next) = self.players.iter().position(|p| p.spins() > 0) {
            self.set_up(next);
        }
    }

    /// The state after the player up spins `value`.
    pub fn apply(&self, value: SpinValue) -> State {
        let mut res = *self;
        let up = res.up_player_mut();
        up.take_spins(value.taken());
        if value.is_whammy() {
            up.score = 0;
            up.earned = up
                .earned
                .saturating_add(up.passed)
                .saturating_add(value.earned());
            up.passed = 0;
            up.whammies = up.whammies.saturating_add(1);
            if up.out() {
                up.earned = 0;
            }
        } else {
            up.score = up.score.saturating_add(value.score()).min(MAX_SCORE);
            up.earned = up.earned.saturating_add(value.earned());
        }
        res.change_player();

        // A player who cannot reach MAX_WHAMMIES before spins run out behaves
        // the same whatever the count, so drop it to merge equivalent states.
        let remaining = res.spins();
        let up = res.up_player_mut();
        if up.whammies as u32 + remaining < MAX_WHAMMIES as u32 {
            up.whammies = 0;
        }
        res
    }

    /// The state after the player up passes all earned spins.
    pub fn pass(&self) -> State {
        let mut res = *self;
        let passee = res.passee_num();
        let earned = res.up_player().earned;
        res.players[passee].passed = res.players[passee].passed.saturating_add(earned);
        res.up_player_mut().earned = 0;
        res.change_player();
        res
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.score)?;
        if self.earned > 0 {
            write!(f, " E{}", self.earned)?;
        }
        if self.passed > 0 {
            write!(f, " P{}", self.passed)?;
        }
        if self.whammies > 0 {
            write!(f, " W{}", self.whammies)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if !self.terminal() {
            write!(f, "P{} ", self.up)?;
        }
        for p in &self.players {
            write!(f, "{} ", p)?;
        }
        write!(f, "]")
    }
}

/// Parses `2000 E3 P1 W2`; surrounding parentheses are optional.
impl FromStr for Player {
    type Err = PylError;

    fn from_str(s: &str) -> PylResult<Self> {
        let body = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut tokens = body.split_whitespace();
        let bad = || PylError::InvalidPlayer(s.trim().to_string());

        let score: u16 = tokens.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        if score > MAX_SCORE {
            return Err(PylError::InvalidPlayer(format!(
                "score {} above maximum {}",
                score, MAX_SCORE
            )));
        }
        let mut player = Player::new(score, 0);
        for token in tokens {
            let mut chars = token.chars();
            let tag = chars.next().ok_or_else(bad)?;
            let count: u8 = chars.as_str().parse().map_err(|_| bad())?;
            match tag {
                'E' | 'e' => player.earned = count,
                'P' | 'p' => player.passed = count,
                'W' | 'w' => player.whammies = count,
                _ => return Err(bad()),
            }
        }
        Ok(player)
    }
}

/// Parses the `Display` form, e.g. `[P1 (0 E3 W2) (2000 E2) (3500 E1) ]`.
/// The brackets and the `P<n>` prefix are optional; without a prefix player 0 is up.
impl FromStr for State {
    type Err = PylError;

    fn from_str(s: &str) -> PylResult<Self> {
        let bad = || PylError::InvalidState(s.trim().to_string());
        let body = s.trim().trim_start_matches('[').trim_end_matches(']').trim();
        let open = body.find('(').ok_or_else(bad)?;
        let (prefix, rest) = body.split_at(open);

        let prefix = prefix.trim();
        let up = if prefix.is_empty() {
            0
        } else {
            let digits = prefix
                .strip_prefix('P')
                .or_else(|| prefix.strip_prefix('p'))
                .ok_or_else(bad)?;
            digits.parse::<usize>().map_err(|_| bad())?
        };
        if up >= NUM_PLAYERS {
            return Err(bad());
        }

        let groups: Vec<&str> = rest
            .split(')')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .collect();
        if groups.len() != NUM_PLAYERS {
            return Err(PylError::InvalidState(format!(
                "expected {} players, got {} in '{}'",
                NUM_PLAYERS,
                groups.len(),
                s.trim()
            )));
        }

        let mut players = [Player::default(); NUM_PLAYERS];
        for (slot, group) in players.iter_mut().zip(&groups) {
            if !group.starts_with('(') {
                return Err(bad());
            }
            *slot = group.parse()?;
        }
        Ok(State::with_up(players, up))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(players: [Player; NUM_PLAYERS], up: usize) -> State {
        State::with_up(players, up)
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn with_up_rejects_missing_player() {
        State::with_up([Player::default(); NUM_PLAYERS], NUM_PLAYERS);
    }

    #[test]
    fn take_spins_drains_passed_first() {
        let mut p = Player::new(0, 2).with_passed(3);
        p.take_spins(2);
        assert_eq!((p.earned, p.passed), (2, 1));
        p.take_spins(2);
        assert_eq!((p.earned, p.passed), (1, 0));
        p.take_spins(5);
        assert_eq!((p.earned, p.passed), (0, 0));
    }

    #[test]
    fn can_pass_requires_earned_and_no_passed() {
        assert!(Player::new(0, 1).can_pass());
        assert!(!Player::new(0, 0).can_pass());
        assert!(!Player::new(0, 1).with_passed(1).can_pass());
    }

    #[test]
    fn change_player_picks_first_seat_with_spins() {
        let mut s = state([Player::new(0, 0), Player::new(100, 0), Player::new(200, 2)], 1);
        s.change_player();
        assert_eq!(s.up_num(), 2);

        let mut done = state([Player::new(0, 0), Player::new(100, 0), Player::new(200, 0)], 1);
        done.change_player();
        assert_eq!(done.up_num(), 1);
        assert!(done.terminal());
    }

    #[test]
    fn pass_moves_all_earned_spins_to_leader() {
        let s = state([Player::new(1000, 2), Player::new(3000, 0), Player::new(2000, 1)], 0);
        let next = s.pass();
        assert_eq!(next.players[0].earned, 0);
        assert_eq!(next.players[1].passed, 2);
        assert_eq!(next.players[2], s.players[2]);
        assert_eq!(next.up_num(), 1);
    }

    #[test]
    fn pass_tie_goes_to_next_seat() {
        let s = state([Player::new(1000, 0), Player::new(500, 3), Player::new(1000, 0)], 1);
        assert_eq!(s.passee_num(), 2);
        let next = s.pass();
        assert_eq!(next.players[2].passed, 3);
    }

    #[test]
    fn pass_skips_eliminated_opponent() {
        let s = state(
            [Player::new(1000, 2), Player::new(0, 0).with_whammies(4), Player::new(0, 0)],
            0,
        );
        assert_eq!(s.passee_num(), 2);
    }

    #[test]
    fn spin_adds_score_and_earned() {
        let s = state([Player::new(1000, 2), Player::new(3000, 0), Player::new(2000, 1)], 0);
        let next = s.apply(SpinValue::new(4000, 1));
        assert_eq!(next.players[0].score, 5000);
        assert_eq!(next.players[0].earned, 2);
        assert_eq!(next.up_num(), 0);
    }

    #[test]
    fn spin_score_saturates() {
        let s = state([Player::new(19_500, 1), Player::new(0, 0), Player::new(0, 1)], 0);
        let next = s.apply(SpinValue::new(2500, 0));
        assert_eq!(next.players[0].score, MAX_SCORE);
        assert_eq!(next.up_num(), 2);
    }

    #[test]
    fn whammy_resets_score_and_folds_passed() {
        let s = state(
            [Player::new(5000, 1).with_passed(3), Player::new(0, 0), Player::new(0, 4)],
            0,
        );
        let next = s.apply(SpinValue::whammy());
        let p = next.players[0];
        assert_eq!(p.score, 0);
        assert_eq!(p.passed, 0);
        assert_eq!(p.earned, 3);
        assert_eq!(p.whammies, 1);
    }

    #[test]
    fn fourth_whammy_eliminates() {
        let s = state(
            [Player::new(5000, 3).with_whammies(3), Player::new(0, 0), Player::new(800, 2)],
            0,
        );
        let next = s.apply(SpinValue::whammy());
        assert!(next.players[0].out());
        assert_eq!(next.players[0].spins(), 0);
        assert_eq!(next.up_num(), 2);
    }

    #[test]
    fn whammy_count_dropped_when_it_cannot_matter() {
        // Player 1 takes over with one whammy and only two spins left in the game.
        let s = state(
            [Player::new(500, 1), Player::new(0, 2).with_whammies(1), Player::new(0, 0)],
            0,
        );
        let next = s.apply(SpinValue::new(500, 0));
        assert_eq!(next.up_num(), 1);
        assert_eq!(next.players[1].whammies, 0);

        let risky = state(
            [Player::new(500, 1), Player::new(0, 2).with_whammies(2), Player::new(0, 0)],
            0,
        );
        let next = risky.apply(SpinValue::new(500, 0));
        assert_eq!(next.players[1].whammies, 2);
    }

    #[test]
    fn terminal_when_both_opponents_out() {
        let s = state(
            [
                Player::new(100, 2),
                Player::new(0, 0).with_whammies(4),
                Player::new(0, 0).with_whammies(4),
            ],
            0,
        );
        assert!(s.terminal());
    }

    #[test]
    fn third_place_and_lead() {
        let s = state([Player::new(0, 3), Player::new(2000, 2), Player::new(3500, 1)], 0);
        assert!(s.third_place());
        assert_eq!(s.passee_num(), 2);
        assert_eq!(s.lead(), -3500);
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let s = state(
            [
                Player::new(0, 3).with_whammies(2),
                Player::new(2000, 2),
                Player::new(3500, 1).with_passed(2),
            ],
            1,
        );
        let text = s.to_string();
        assert_eq!(text, "[P1 (0 E3 W2) (2000 E2) (3500 E1 P2) ]");
        assert_eq!(text.parse::<State>().unwrap(), s);
    }

    #[test]
    fn parse_without_prefix_defaults_to_seat_zero() {
        let s: State = "(0) (6000 E1) (6000)".parse().unwrap();
        assert_eq!(s.up_num(), 0);
        assert_eq!(s.players[1], Player::new(6000, 1));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("(0) (1)".parse::<State>().is_err());
        assert!("P5 (0) (1) (2)".parse::<State>().is_err());
        assert!("(0 X2) (1) (2)".parse::<State>().is_err());
        assert!("(30000) (1) (2)".parse::<State>().is_err());
        assert!("no players".parse::<State>().is_err());
    }
}
