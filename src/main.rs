use clap::{ArgAction, Parser, Subcommand};
use futures::executor::block_on;
use std::path::PathBuf;
use std::process::ExitCode;

use splice::error::{PipelineError, StoreError};
use splice::geometry::{self, FileGeometryStore};
use splice::snapshot::Snapshot;
use splice::{Config, EventBus, GeometryStore, NodeGeometry, Pipeline, telemetry};

#[derive(Parser, Debug)]
#[command(name = "splice", version, about = "Lay out extension graphs and keep node positions")]
struct Cli {
    /// Log more (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Geometry file (default: from config).
    #[arg(long, global = true, value_name = "FILE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out a graph from a snapshot and print it as JSON.
    Layout {
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,
        #[arg(long)]
        graph: String,
    },
    /// Move one node and persist the graph's geometry.
    Move {
        #[arg(long)]
        graph: String,
        #[arg(long)]
        node: String,
        #[arg(long, allow_hyphen_values = true)]
        x: f32,
        #[arg(long, allow_hyphen_values = true)]
        y: f32,
    },
    /// Print the stored geometry of a graph.
    Show {
        #[arg(long)]
        graph: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no location for the geometry store; pass --store")]
    NoStore,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    match block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load().unwrap_or_default();
    let store_path = cli
        .store
        .clone()
        .or_else(|| config.geometry_path())
        .ok_or(CliError::NoStore)?;
    let store = FileGeometryStore::new(store_path);

    match cli.command {
        Command::Layout { snapshot, graph } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let pipeline = Pipeline::new(snapshot.clone(), snapshot, store, config, EventBus::new());
            let loaded = pipeline.load_graph(&graph).await?;
            if let Some(err) = &loaded.degraded {
                eprintln!("warning: node positions not saved: {err}");
            }
            print_json(&loaded.graph)
        }
        Command::Move { graph, node, x, y } => {
            let mut record = store.get_graph_node_geometry(&graph).await?;
            match record.iter_mut().find(|g| g.extension == node) {
                Some(entry) => {
                    entry.x = x;
                    entry.y = y;
                }
                None => record.push(NodeGeometry { extension: node, x, y }),
            }
            geometry::force_local_geometry(&store, &graph, record).await?;
            Ok(())
        }
        Command::Show { graph } => {
            let geometry = store.get_graph_node_geometry(&graph).await?;
            print_json(&geometry)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
