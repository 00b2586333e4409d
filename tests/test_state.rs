//! Game-state notation, transitions and terminal payoffs through the public API.

use approx::assert_abs_diff_eq;

use pyl_cli::cache::NodeCache;
use pyl_cli::node::terminal_payoff;
use pyl_cli::search::SearchOptions;
use pyl_cli::spin::SpinValue;
use pyl_cli::state::State;

fn state(s: &str) -> State {
    s.parse().unwrap()
}

// =========================================================================
// Notation
// =========================================================================

#[test]
fn notation_roundtrips() {
    for text in [
        "[P0 (0 E3 W2) (2000 E2) (3500 E1) ]",
        "[P2 (0) (2000) (3500 P2) ]",
        "[P1 (1500 W1) (250 E4) (20000) ]",
    ] {
        assert_eq!(state(text).to_string(), text);
    }
}

#[test]
fn terminal_state_prints_without_up_marker() {
    assert_eq!(state("(0) (2000) (3500)").to_string(), "[(0) (2000) (3500) ]");
}

// =========================================================================
// Transitions
// =========================================================================

#[test]
fn equivalent_whammy_counts_share_a_node() {
    // Player 1 takes over with one whammy and one spin left in the game.
    let whammied = state("(1000 E1) (2000 E1 W1) (0)").apply(SpinValue::new(500, 0));
    let clean = state("(1000 E1) (2000 E1) (0)").apply(SpinValue::new(500, 0));
    assert_eq!(whammied.up_num(), 1);
    assert_eq!(whammied, clean);

    let mut cache = NodeCache::new();
    assert_eq!(cache.create_node(&whammied), cache.create_node(&clean));
    assert_eq!(cache.len(), 1);
}

#[test]
fn pass_goes_to_surviving_opponent() {
    let s = state("(5000 E2) (9000 W4) (100)");
    let next = s.pass();
    assert_eq!(next.player(2).passed, 2);
    assert_eq!(next.player(1).passed, 0);
    assert_eq!(next.up_num(), 2);
}

#[test]
fn last_player_standing_wins() {
    let s = state("(100 E2) (0 W4) (0 W4)");
    assert!(s.terminal());
    assert_eq!(terminal_payoff(&s).probs(), &[1.0, 0.0, 0.0]);
}

#[test]
fn everyone_out_splits_evenly() {
    let s = state("(0 W4) (0 W4) (0 W4)");
    let p = terminal_payoff(&s);
    assert_abs_diff_eq!(p.uncertainty(), 0.0, epsilon = 1e-12);
    for n in 0..3 {
        assert_abs_diff_eq!(p.prob(n), 1.0 / 3.0, epsilon = 1e-12);
    }
}

// =========================================================================
// Options
// =========================================================================

#[test]
fn options_file_roundtrips() {
    let options = SearchOptions {
        max_lead: 0,
        max_passed_spins: 4,
        ..Default::default()
    };
    let path = std::env::temp_dir().join(format!("pyl-options-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string(&options).unwrap()).unwrap();
    let loaded = SearchOptions::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, options);
}

#[test]
fn options_file_is_validated() {
    assert!(SearchOptions::from_json_str(r#"{ "max_passed_spins": 0 }"#).is_err());
    assert!(SearchOptions::from_json_str(r#"{ "max_depth": 4 }"#).is_err());
}
