use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use crate::board::SpinOperator;
use crate::node::{Decision, NodeId};
use crate::payoff::{Interval, Payoff};
use crate::search::{Search, SearchResult};
use crate::state::{State, NUM_PLAYERS};
use crate::Prob;

// ---------------------------------------------------------------------------
// Search summaries
// ---------------------------------------------------------------------------

/// Everything the reports need from a finished search.
#[derive(Debug, Clone)]
pub struct Summary {
    pub state: State,
    pub decision: Decision,
    pub payoff: Payoff,
    pub play: Option<Payoff>,
    pub pass: Option<Payoff>,
    pub result: SearchResult,
    pub nodes: usize,
}

impl Summary {
    pub fn collect(search: &mut Search, root: NodeId) -> Self {
        let payoff = search.payoff(root);
        let decision = search.decision(root);
        let node = search.cache().node(root);
        let state = *node.state();
        let (play, pass) = (node.play(), node.pass());
        Summary {
            state,
            decision,
            payoff,
            play: play.map(|p| search.payoff(p)),
            pass: pass.map(|q| search.payoff(q)),
            result: search.result().clone(),
            nodes: search.cache().len(),
        }
    }
}

pub fn win_bar(prob: Prob, width: usize) -> String {
    let filled = ((prob.clamp(0.0, 1.0) * width as Prob) as usize).min(width);
    let bar: String = "\u{2588}".repeat(filled) + &"\u{2591}".repeat(width - filled);
    let pct = format!("{:.1}%", prob * 100.0);

    if prob >= 0.5 {
        format!("{} {}", bar.green(), pct)
    } else if prob >= 0.25 {
        format!("{} {}", bar.yellow(), pct)
    } else {
        format!("{} {}", bar.red(), pct)
    }
}

pub fn styled_decision(decision: Decision) -> String {
    let text = decision.to_string().to_uppercase();
    match decision {
        Decision::Play => text.green().bold().to_string(),
        Decision::Pass => text.yellow().bold().to_string(),
        Decision::Undecided => text.dimmed().bold().to_string(),
    }
}

fn pct(prob: Prob) -> String {
    format!("{:.1}%", prob * 100.0)
}

fn range_cell(range: Option<Interval<Prob>>) -> Cell {
    match range {
        Some(r) => Cell::new(format!("{}-{}", pct(r.min()), pct(r.max()))),
        None => Cell::new("-".dimmed().to_string()),
    }
}

/// Per-player win probabilities for the root and each of its options.
pub fn solve_table(summary: &Summary) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Player"),
        Cell::new("Record"),
        Cell::new("Win").set_alignment(CellAlignment::Right),
        Cell::new("If play").set_alignment(CellAlignment::Right),
        Cell::new("If pass").set_alignment(CellAlignment::Right),
    ]);

    let up = summary.state.up_num();
    let option = |p: &Option<Payoff>, n: usize| match p {
        Some(p) => Cell::new(pct(p.prob(n))).set_alignment(CellAlignment::Right),
        None => Cell::new("-".dimmed().to_string()).set_alignment(CellAlignment::Right),
    };
    for n in 0..NUM_PLAYERS {
        let label = if n == up {
            format!("P{} (up)", n).bold().to_string()
        } else {
            format!("P{}", n)
        };
        table.add_row(vec![
            Cell::new(label),
            Cell::new(summary.state.player(n).to_string()),
            Cell::new(win_bar(summary.payoff.prob(n), 10)),
            option(&summary.play, n),
            option(&summary.pass, n),
        ]);
    }
    table.add_row(vec![
        Cell::new("unresolved".dimmed().to_string()),
        Cell::new(""),
        Cell::new(pct(summary.payoff.uncertainty())).set_alignment(CellAlignment::Right),
        option_uncertainty(&summary.play),
        option_uncertainty(&summary.pass),
    ]);
    table.to_string()
}

fn option_uncertainty(p: &Option<Payoff>) -> Cell {
    let text = match p {
        Some(p) => pct(p.uncertainty()),
        None => "-".to_string(),
    };
    Cell::new(text.dimmed().to_string()).set_alignment(CellAlignment::Right)
}

/// One line per search: the swept parameter, the decision and both ranges.
pub fn sweep_table(param: &str, rows: &[(String, Summary)]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new(param),
        Cell::new("State"),
        Cell::new("Decision"),
        Cell::new("Play").set_alignment(CellAlignment::Right),
        Cell::new("Pass").set_alignment(CellAlignment::Right),
        Cell::new("Depth").set_alignment(CellAlignment::Right),
        Cell::new("Nodes").set_alignment(CellAlignment::Right),
    ]);

    for (label, s) in rows {
        let mut decision = styled_decision(s.decision);
        if !s.result.solved {
            decision = format!("{} {}", decision, "?".red());
        }
        table.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Right),
            Cell::new(s.state.to_string()),
            Cell::new(decision),
            range_cell(s.play.map(|_| s.result.play_win)),
            range_cell(s.pass.map(|_| s.result.pass_win)),
            Cell::new(s.result.depth).set_alignment(CellAlignment::Right),
            Cell::new(s.nodes).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

// ---------------------------------------------------------------------------
// Boards
// ---------------------------------------------------------------------------

/// Board outcomes, most likely first.
pub fn board_table(board: &SpinOperator) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Score").set_alignment(CellAlignment::Right),
        Cell::new("Spins").set_alignment(CellAlignment::Right),
        Cell::new("Weight").set_alignment(CellAlignment::Right),
    ]);

    for (value, weight) in board.expr().sorted_by_weight().into_iter().rev() {
        let score = if value.is_whammy() {
            "WHAMMY".red().bold().to_string()
        } else {
            value.score().to_string()
        };
        let spins = if value.earned() > 0 {
            format!("+{}", value.earned()).green().to_string()
        } else {
            String::new()
        };
        table.add_row(vec![
            Cell::new(score).set_alignment(CellAlignment::Right),
            Cell::new(spins).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", weight)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

/// Outcome counts of `board^n`, with the total mass as a sanity check.
pub fn powers_table(rows: &[(usize, usize, Prob)]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Spins").set_alignment(CellAlignment::Right),
        Cell::new("Outcomes").set_alignment(CellAlignment::Right),
        Cell::new("Mass").set_alignment(CellAlignment::Right),
    ]);
    for &(n, outcomes, mass) in rows {
        table.add_row(vec![
            Cell::new(n).set_alignment(CellAlignment::Right),
            Cell::new(outcomes).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.6}", mass)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

pub fn print_section(title: &str, content: &str) {
    println!("\n{}", title.cyan().bold());
    println!("  {}", content);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn print_success(msg: &str) {
    println!("{}", msg.green().bold());
}
