use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use crate::board::{self, SpinOperator};
use crate::display::{
    board_table, powers_table, print_error, print_section, print_success, solve_table,
    styled_decision, sweep_table, Summary,
};
use crate::error::{PylError, PylResult};
use crate::logging;
use crate::search::{Search, SearchOptions};
use crate::spin::quantize;
use crate::state::{Player, State};

#[derive(Parser)]
#[command(
    name = "pyl",
    version = "1.0.0",
    about = "Press Your Luck solver: when to play your spins and when to pass them."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Board and search settings shared by every searching command.
#[derive(Args, Clone)]
struct SearchArgs {
    /// Built-in board name or path to a JSON board file
    #[arg(short, long, default_value = "feb85")]
    board: String,
    /// JSON file with search options; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop searching a node once its payoff is this certain
    #[arg(long)]
    max_uncertainty: Option<f64>,
    /// Never play with a lead above this (0 = no limit)
    #[arg(long)]
    max_lead: Option<u32>,
    /// Iterative deepening ceiling
    #[arg(long)]
    max_depth: Option<u32>,
    /// Most passed spins resolved in one step
    #[arg(long)]
    batch_cap: Option<usize>,
    /// Resolve passed spins one at a time
    #[arg(long)]
    no_merge: bool,
    /// Let a player in third place consider passing
    #[arg(long)]
    allow_third_place_pass: bool,
}

impl SearchArgs {
    fn options(&self) -> PylResult<SearchOptions> {
        let mut options = match &self.config {
            Some(path) => SearchOptions::from_json_file(path)?,
            None => SearchOptions::default(),
        };
        if let Some(v) = self.max_uncertainty {
            options.max_uncertainty = v;
        }
        if let Some(v) = self.max_lead {
            options.max_lead = v;
        }
        if let Some(v) = self.max_depth {
            options.max_depth = v;
        }
        if let Some(v) = self.batch_cap {
            options.max_passed_spins = v;
        }
        if self.no_merge {
            options.merge_passed_spins = false;
        }
        if self.allow_third_place_pass {
            options.always_spin_third_place = false;
        }
        options.validate()?;
        Ok(options)
    }

    fn board(&self) -> PylResult<SpinOperator> {
        board::load(&self.board)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether the player up should play or pass
    Solve {
        /// Game state, e.g. "(0) (2000 E2) (3500 E1 P2)" or "[P2 (0) (2000 E2) (3500)]"
        state: String,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Decisions for the leader with one spin, over a range of leads
    SweepLead {
        /// Score of the trailing player
        #[arg(long, default_value_t = 6000)]
        base: i32,
        /// First lead
        #[arg(long, default_value_t = -5000, allow_negative_numbers = true)]
        from: i32,
        /// Last lead
        #[arg(long, default_value_t = 5000, allow_negative_numbers = true)]
        to: i32,
        #[arg(long, default_value_t = 250)]
        step: i32,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Decisions for the leader over a range of earned spins
    SweepSpins {
        #[arg(long, default_value_t = 8000)]
        leader: i32,
        #[arg(long, default_value_t = 3000)]
        trailer: i32,
        /// Most spins to try
        #[arg(long, default_value_t = 12)]
        max: u8,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Show a board and its repeated-spin operators
    Board {
        /// Built-in board name or path to a JSON board file
        #[arg(short, long, default_value = "feb85")]
        board: String,
        /// Compose up to this many spins
        #[arg(long, default_value_t = 3)]
        powers: usize,
    },
}

pub fn run() {
    let cli = Cli::parse();
    finish(dispatch(cli));
}

fn finish(res: PylResult<()>) {
    if let Err(e) = res {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> PylResult<()> {
    logging::init(logging::level(cli.verbose, cli.quiet));
    match cli.command {
        Commands::Solve { state, search } => cmd_solve(&state, &search),
        Commands::SweepLead {
            base,
            from,
            to,
            step,
            search,
        } => cmd_sweep_lead(base, from, to, step, &search),
        Commands::SweepSpins {
            leader,
            trailer,
            max,
            search,
        } => cmd_sweep_spins(leader, trailer, max, &search),
        Commands::Board { board, powers } => cmd_board(&board, powers),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_solve(state: &str, args: &SearchArgs) -> PylResult<()> {
    let init: State = state.parse()?;
    let board = args.board()?;
    let mut search = Search::new(&board, args.options()?)?;
    let root = search.run(init);
    let summary = Summary::collect(&mut search, root);

    print_section("Position", &summary.state.to_string());
    println!("{}", solve_table(&summary));
    println!(
        "\n  {}  {}",
        styled_decision(summary.decision),
        format!(
            "depth {}, {} passes, {} nodes",
            summary.result.depth, summary.result.passes, summary.nodes
        )
        .dimmed()
    );
    if !summary.result.solved {
        println!(
            "  {}",
            "not converged; the decision may change with a deeper search".yellow()
        );
    }
    Ok(())
}

/// Leader `(base + lead)` holds one spin with a trailer at `base` and one
/// player already done.
pub fn lead_state(base: i32, lead: i32) -> State {
    State::new([
        Player::new(0, 0),
        Player::new(quantize(base + lead), 1),
        Player::new(quantize(base), 0),
    ])
}

/// Leader at `leader` holds `spins` spins against a trailer at `trailer`.
pub fn spins_state(leader: i32, trailer: i32, spins: u8) -> State {
    State::new([
        Player::new(0, 0),
        Player::new(quantize(leader), spins),
        Player::new(quantize(trailer), 0),
    ])
}

/// Run one independent search per state, in parallel.
fn sweep(
    board: &SpinOperator,
    options: &SearchOptions,
    points: Vec<(String, State)>,
) -> PylResult<Vec<(String, Summary)>> {
    points
        .into_par_iter()
        .map(|(label, state)| {
            let mut search = Search::new(board, options.clone())?;
            let root = search.run(state);
            Ok((label, Summary::collect(&mut search, root)))
        })
        .collect()
}

fn cmd_sweep_lead(base: i32, from: i32, to: i32, step: i32, args: &SearchArgs) -> PylResult<()> {
    if step <= 0 || from > to {
        return Err(PylError::InvalidOption(format!(
            "need --from <= --to and --step > 0, got {}..{} by {}",
            from, to, step
        )));
    }
    let board = args.board()?;
    let options = args.options()?;
    let points = (from..=to)
        .step_by(step as usize)
        .map(|lead| (format!("{:+}", lead), lead_state(base, lead)))
        .collect();
    let rows = sweep(&board, &options, points)?;

    print_section("Lead sweep", &format!("trailer at {}, leader has 1 spin", base));
    println!("{}", sweep_table("Lead", &rows));
    print_success(&format!("{} positions searched", rows.len()));
    Ok(())
}

fn cmd_sweep_spins(leader: i32, trailer: i32, max: u8, args: &SearchArgs) -> PylResult<()> {
    if max == 0 {
        return Err(PylError::InvalidOption("--max must be at least 1".to_string()));
    }
    let board = args.board()?;
    let options = args.options()?;
    let points = (1..=max)
        .map(|n| (n.to_string(), spins_state(leader, trailer, n)))
        .collect();
    let rows = sweep(&board, &options, points)?;

    print_section("Spin sweep", &format!("leader {} vs trailer {}", leader, trailer));
    println!("{}", sweep_table("Spins", &rows));
    print_success(&format!("{} positions searched", rows.len()));
    Ok(())
}

fn cmd_board(name: &str, powers: usize) -> PylResult<()> {
    let board = board::load(name)?;
    print_section("Board", &format!("{} ({} outcomes)", name, board.len()));
    println!("{}", board_table(&board));

    let mut rows = Vec::new();
    let mut op = board.clone();
    for n in 1..=powers.max(1) {
        if n > 1 {
            op = board.compose(&op);
        }
        rows.push((n, op.len(), op.total_weight()));
    }
    print_section("Repeated spins", "");
    println!("{}", powers_table(&rows));

    let left = board.compose(&board.compose(&board));
    let right = board.compose(&board).compose(&board);
    if left.approx_eq(&right, 1e-9) {
        print_success("composition is associative on this board");
    } else {
        print_error("composition is not associative on this board");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_state_hands_control_to_leader() {
        let mut s = lead_state(6000, -250);
        s.change_player();
        assert_eq!(s.up_num(), 1);
        assert_eq!(s.up_player().score, 5750);
        assert_eq!(s.lead(), -250);
    }

    #[test]
    fn lead_state_clamps_negative_scores() {
        let s = lead_state(1000, -5000);
        assert_eq!(s.player(1).score, 0);
    }

    #[test]
    fn spins_state_sets_earned() {
        let s = spins_state(8000, 3000, 5);
        assert_eq!(s.player(1).earned, 5);
        assert_eq!(s.player(2).score, 3000);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "pyl",
            "solve",
            "(0) (1000 E1) (500)",
            "--max-lead",
            "0",
            "--batch-cap",
            "3",
            "--no-merge",
        ]);
        let Commands::Solve { search, .. } = cli.command else {
            panic!("expected solve");
        };
        let options = search.options().unwrap();
        assert_eq!(options.max_lead, 0);
        assert_eq!(options.max_passed_spins, 3);
        assert!(!options.merge_passed_spins);
        assert!(options.always_spin_third_place);
    }

    #[test]
    fn bad_batch_cap_is_rejected() {
        let cli = Cli::parse_from(["pyl", "solve", "(0) (1000 E1) (500)", "--batch-cap", "9"]);
        let Commands::Solve { search, .. } = cli.command else {
            panic!("expected solve");
        };
        assert!(search.options().is_err());
    }

    #[test]
    fn negative_leads_parse() {
        let cli = Cli::parse_from(["pyl", "sweep-lead", "--from", "-1000", "--to", "-500"]);
        let Commands::SweepLead { from, to, .. } = cli.command else {
            panic!("expected sweep-lead");
        };
        assert_eq!((from, to), (-1000, -500));
    }
}
