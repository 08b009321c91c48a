use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use clue_core::{
    Cell, PlayerId, Position,
    agent::{CpuPlayer, TieBreak},
    board::{Board, load_board_from_string},
    navigation::{DEFAULT_MAX_STEPS, Navigator, NavigatorConfig},
    notepad::{Card, Deck},
    occupancy::Occupancy,
};
use log::LevelFilter;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(version, about = "Movement and CPU decisions on a Clue board", long_about = None)]
struct Args {
    /// Board map file to load
    #[arg(short, long, value_name = "MAP_FILE", default_value = "boards/mansion.txt")]
    board: PathBuf,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Highest roll accepted
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: u32,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every destination a roll reaches. FROM is "x,y" or a room name
    Moves { from: Position, roll: u32 },
    /// Find a route from FROM into ROOM
    Route { from: Position, room: String },
    /// Show which room a CPU player at FROM would head for
    Target {
        from: Position,
        /// A room the player has already ruled out; may be repeated
        #[arg(short, long = "ruled-out", value_name = "ROOM")]
        ruled_out: Vec<String>,
        /// Break ties with a seeded generator instead of name order
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let map = fs::read_to_string(&args.board)
        .with_context(|| format!("Failed to read board file {}", args.board.display()))?;
    let (board, starts) = load_board_from_string(&map)
        .with_context(|| format!("Failed to load board {}", args.board.display()))?;
    log::info!(
        "loaded {}x{} board with {} rooms",
        board.width(),
        board.height(),
        board.rooms().count()
    );
    let config = NavigatorConfig {
        max_steps: args.max_steps,
        ..NavigatorConfig::default()
    };

    match &args.command {
        Command::Moves { from, roll } => {
            let (occupancy, _) = place_mover(&board, &starts, from)?;
            let nav = Navigator::new(&board, &occupancy).with_config(config);
            let moves = nav.available_moves(from, *roll)?;
            if args.json {
                return emit(&moves);
            }
            println!("Roll of {roll} from {from}:");
            for cell in moves.cells() {
                println!("  move to {cell}");
            }
            for room in moves.rooms() {
                println!("  enter the {room}");
            }
            for room in moves.passages() {
                println!("  secret passage to the {room}");
            }
            if moves.is_empty() {
                println!("  nowhere to go");
            }
        }
        Command::Route { from, room } => {
            let (occupancy, _) = place_mover(&board, &starts, from)?;
            let nav = Navigator::new(&board, &occupancy).with_config(config);
            let route = nav.find_path_to_room(from, room)?;
            if args.json {
                return emit(&route);
            }
            match route {
                Some(route) => {
                    println!("{} steps from {from} to the {room}:", route.steps());
                    for position in route.positions() {
                        println!("  {position}");
                    }
                }
                None => println!("The {room} cannot be reached from {from}"),
            }
        }
        Command::Target {
            from,
            ruled_out,
            seed,
        } => {
            let (occupancy, mover) = place_mover(&board, &starts, from)?;
            let nav = Navigator::new(&board, &occupancy).with_config(config);
            let deck = Deck::classic(board.room_names());
            let hand = ruled_out.iter().map(|room| Card::room(room.as_str())).collect();
            let tie_break = seed.map_or(TieBreak::Ordered, TieBreak::Seeded);
            let mut cpu = CpuPlayer::new(mover, &deck, hand, tie_break)
                .context("Ruled-out rooms must be rooms of the board")?;
            let paths = nav.room_paths(from)?;
            let target = cpu.choose_target(&paths);
            if args.json {
                return emit(&target);
            }
            match target.and_then(|route| route.destination()) {
                Some(room) => println!(
                    "Heading for the {room}, {} steps away",
                    target.map_or(0, |route| route.steps())
                ),
                None => println!("No room can be reached from {from}"),
            }
        }
    }
    Ok(())
}

/// Puts the moving token at `from`, reusing a start token already standing
/// there and otherwise taking an id no start token uses.
fn place_mover(
    board: &Board,
    starts: &BTreeMap<PlayerId, Cell>,
    from: &Position,
) -> Result<(Occupancy, PlayerId)> {
    let mut occupancy = Occupancy::with_starts(board, starts)?;
    let mover = from
        .as_cell()
        .and_then(|cell| occupancy.occupant(cell))
        .unwrap_or_else(|| starts.keys().max().map_or(0, |id| id + 1));
    occupancy
        .place(board, mover, from.clone())
        .with_context(|| format!("Cannot put a token at {from}"))?;
    Ok((occupancy, mover))
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = "
        @0 .. ..
        .. .. K+
        ---
        K Kitchen
    ";

    #[test]
    fn mover_reuses_the_start_token_on_its_cell() {
        let (board, starts) = load_board_from_string(BOARD).unwrap();
        let from = Position::Cell(Cell::new(0, 0));
        let (occupancy, mover) = place_mover(&board, &starts, &from).unwrap();
        assert_eq!(mover, 0);
        assert_eq!(occupancy.position(0), Some(&from));
    }

    #[test]
    fn mover_on_a_free_cell_leaves_start_tokens_alone() {
        let (board, starts) = load_board_from_string(BOARD).unwrap();
        let from = Position::Cell(Cell::new(2, 0));
        let (occupancy, mover) = place_mover(&board, &starts, &from).unwrap();
        assert_eq!(mover, 1);
        assert_eq!(occupancy.position(1), Some(&from));
        assert_eq!(occupancy.position(0), Some(&Position::Cell(Cell::new(0, 0))));
    }
}
