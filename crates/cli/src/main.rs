use std::path::PathBuf;

use anyhow::{Context, Result};
use chesszero_core::planes::CHANNEL_COLOR;
use chesszero_core::{label_table, Perspective};
use chesszero_export::{play_game, Config, Dataset, Exporter, RowState, Termination};
use chesszero_search::UniformSearch;
use clap::{Args, Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser)]
#[command(name = "chesszero-export", version, about = "Self-play training data exporter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play self-play games and export them to a dataset
    Generate(GenerateArgs),
    /// Print the layout and watermark of a dataset, or one of its rows
    Inspect(InspectArgs),
    /// Drop every row past the commit watermark
    Truncate {
        /// Dataset directory
        path: PathBuf,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Dataset directory
    #[arg(short, long, default_value = "data")]
    out: PathBuf,

    /// Number of games to play
    #[arg(short, long, default_value_t = 1)]
    games: usize,

    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulations per search
    #[arg(long)]
    simulations: Option<u32>,

    /// Adjudicate a draw after this many plies
    #[arg(long)]
    max_plies: Option<usize>,

    /// Rows per chunk of a new dataset
    #[arg(long)]
    chunk_rows: Option<usize>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print the info line after every search
    #[arg(long)]
    info: bool,

    /// Render castling in chess960 notation
    #[arg(long)]
    chess960: bool,

    /// Append to an existing dataset instead of creating one
    #[arg(long)]
    resume: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Dataset directory
    path: PathBuf,

    /// Print the committed row at this offset
    #[arg(long)]
    offset: Option<usize>,

    /// Number of policy entries to print for a row
    #[arg(long, default_value_t = 5)]
    top: usize,
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Generate(args) => generate(args),
        Command::Inspect(args) => inspect(args),
        Command::Truncate { path } => truncate(path),
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(n) = args.simulations {
        config.selfplay.search.num_simulations = n;
    }
    if let Some(n) = args.max_plies {
        config.selfplay.max_plies = n;
    }
    if let Some(n) = args.chunk_rows {
        config.export.layout = config.export.layout.with_chunk_rows(n);
    }
    if args.chess960 {
        config.selfplay.search.chess960 = true;
    }

    let mut exporter = if args.resume {
        Exporter::open(&args.out, config.export.clone())
    } else {
        Exporter::create(&args.out, config.export.clone())
    }
    .with_context(|| format!("Failed to open dataset {}", args.out.display()))?;

    info!(
        "Exporting {} game(s) to {} starting at offset {}",
        args.games,
        args.out.display(),
        exporter.cursor()
    );

    let mut search = UniformSearch::new();
    let mut rng = StdRng::seed_from_u64(args.seed);

    for game in 0..args.games {
        let summary = play_game(
            &mut exporter,
            &mut search,
            &config.selfplay,
            &mut rng,
            |result| {
                if args.info {
                    println!("{result}");
                }
            },
        )
        .with_context(|| format!("Game {} failed", game + 1))?;

        let how = match summary.termination {
            Termination::Checkmate => "checkmate",
            Termination::Stalemate => "stalemate",
            Termination::FiftyMoveRule => "fifty-move rule",
            Termination::PlyLimit => "ply limit",
        };
        println!(
            "Game {}: {:?} by {} after {} plies (rows {}..{})",
            game + 1,
            summary.result(),
            how,
            summary.len(),
            summary.committed.record.start,
            summary.committed.record.end()
        );
    }

    println!(
        "Committed {} rows in {} games",
        exporter.committed_len(),
        exporter.dataset().games()
    );
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let dataset = Dataset::open(&args.path)
        .with_context(|| format!("Failed to open dataset {}", args.path.display()))?;
    let layout = dataset.layout();

    println!("dataset:       {}", args.path.display());
    println!(
        "x:             [{}, {}, {}, {}] i16",
        dataset.len(),
        layout.channels,
        layout.height,
        layout.width
    );
    println!("y_value:       [{}] i16", dataset.len());
    println!("y_policy:      [{}, {}] f32", dataset.len(), layout.labels);
    println!("chunk rows:    {}", layout.chunk_rows);
    println!("committed:     {}", dataset.committed_len());
    println!("games:         {}", dataset.games());

    let Some(offset) = args.offset else {
        return Ok(());
    };
    if dataset.row_state(offset) != RowState::FullyCommitted {
        anyhow::bail!(
            "Row {} is not committed (watermark {})",
            offset,
            dataset.committed_len()
        );
    }

    let example = dataset.read_example(offset)?;
    let white_to_move = example.planes[[CHANNEL_COLOR, 0, 0]] == 1;
    let perspective = if white_to_move {
        Perspective::Forward
    } else {
        Perspective::Mirrored
    };

    println!();
    println!("row {offset}");
    println!(
        "side to move:  {}",
        if white_to_move { "white" } else { "black" }
    );
    println!("value:         {}", example.value);

    let mut entries: Vec<(usize, f32)> = example
        .policy
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| *p > 0.0)
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));

    let table = label_table(perspective);
    for (label, p) in entries.into_iter().take(args.top) {
        let mv = table
            .move_at(label)
            .map_or_else(|| "?".to_string(), |mv| mv.to_string());
        println!("  {mv:<6} {p:.4}  (label {label})");
    }
    Ok(())
}

fn truncate(path: PathBuf) -> Result<()> {
    let mut dataset = Dataset::open(&path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;
    let before = dataset.len();
    dataset.truncate_to_committed()?;
    println!(
        "Truncated {} from {} to {} rows",
        path.display(),
        before,
        dataset.len()
    );
    Ok(())
}
