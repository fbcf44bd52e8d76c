//! Threat Model CLI
//!
//! Projects a threat model to a graph, renames technical assets with
//! reference repair, and lists the identifiers a model defines.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use threat_model_editor::document::{ID_FIELD, TECHNICAL_ASSETS};
use threat_model_editor::{
    Document, EditAction, EditSession, EditorConfig, FieldInput, FieldPath, IdentifierKind,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "threat-model")]
#[command(about = "Inspect and edit threat model documents")]
struct Cli {
    /// Config file, read on top of the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the model graph
    Graph {
        /// Model file (YAML or JSON)
        model: PathBuf,
        #[arg(short, long, value_enum, default_value_t = GraphFormat::Dot)]
        format: GraphFormat,
        /// Include data asset nodes and edges
        #[arg(long)]
        data_assets: bool,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rename a technical asset id and repair every reference to it
    RenameAsset {
        model: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Write the repaired model here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the identifiers defined by a model
    Ids { model: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum GraphFormat {
    Dot,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = EditorConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let mut session = EditSession::from_config(&config).context("loading schema")?;

    match cli.command {
        Commands::Graph {
            model,
            format,
            data_assets,
            output,
        } => {
            load(&mut session, &model)?;
            let mut projection = config.graph;
            projection.show_data_assets |= data_assets;
            let graph = session.set_projection(projection)?;

            let rendered = match format {
                GraphFormat::Dot => graph.to_dot(),
                GraphFormat::Json => graph.to_json()?,
            };
            let dangling = graph.dangling_edges().len();
            if dangling > 0 {
                eprintln!("⚠️  {} edge(s) reference unknown ids", dangling);
            }
            emit(&rendered, output.as_deref())
        }

        Commands::RenameAsset {
            model,
            from,
            to,
            output,
        } => {
            load(&mut session, &model)?;
            let key = session
                .document()?
                .entities(TECHNICAL_ASSETS)
                .find(|(_, asset)| Document::entity_id(asset) == Some(from.as_str()))
                .map(|(key, _)| key.to_string());
            let Some(key) = key else {
                bail!("no technical asset has id {:?}", from);
            };

            let root = FieldPath::from_keys([TECHNICAL_ASSETS, key.as_str()]);
            let action = EditAction::SetField {
                path: root.clone().key(ID_FIELD),
                input: FieldInput::text(to.as_str()),
            };
            let options = config.editor.entity_options();
            match session.apply(&root, &options, action)? {
                Some(outcome) => {
                    let rewritten = outcome.repair.map(|r| r.rewritten.len()).unwrap_or(0);
                    eprintln!("✅ Renamed {} → {} ({} reference(s) updated)", from, to, rewritten);
                }
                None => eprintln!("Nothing to rename"),
            }
            emit(&session.export()?, output.as_deref())
        }

        Commands::Ids { model } => {
            load(&mut session, &model)?;
            let index = session.identifiers()?;
            for kind in [
                IdentifierKind::TechnicalAsset,
                IdentifierKind::DataAsset,
                IdentifierKind::TrustBoundary,
            ] {
                println!("{}:", kind.section());
                for id in index.ids(kind) {
                    println!("  {}", id);
                }
            }
            Ok(())
        }
    }
}

fn load(session: &mut EditSession, model: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(model).with_context(|| format!("reading {:?}", model))?;
    session.load(&text)?;
    Ok(())
}

fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {:?}", path))?;
            eprintln!("✅ Wrote {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}
