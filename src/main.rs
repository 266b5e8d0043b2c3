use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use markup::{Criterion, EditOp, NodeId, Tree, debug::outline, diff_nodes, parse, to_markup};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "pagetree", about = "Parse, canonicalize and compare markup documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a document and print it back in canonical form
    Fmt {
        input: PathBuf,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the edit script turning the left document into the right one
    Diff {
        left: PathBuf,
        right: PathBuf,
        /// Compare only the first element with this tag on each side
        #[arg(short, long)]
        select: Option<String>,
        /// Emit the script as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Print an indented outline of the document tree
    Outline {
        input: PathBuf,
        /// Maximum number of lines
        #[arg(long, default_value_t = 200)]
        cap: usize,
    },
}

fn load(path: &Path) -> Result<Tree> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn select(tree: &Tree, tag: Option<&str>, path: &Path) -> Result<NodeId> {
    let Some(tag) = tag else {
        return Ok(tree.root_id());
    };
    tree.get_root()
        .descendant(&Criterion::tag(tag))
        .map(|node| node.id())
        .ok_or_else(|| anyhow!("no <{tag}> element in {}", path.display()))
}

fn describe(op: &EditOp, right: &Tree) -> String {
    match op {
        EditOp::AddNode { node, .. } => {
            let markup = right.get(*node).map(|n| n.to_markup()).unwrap_or_default();
            format!("{op} {markup}")
        }
        _ => op.to_string(),
    }
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Fmt { input, output } => {
            let printed = to_markup(&load(&input)?);
            match output {
                Some(path) => fs::write(&path, printed)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{printed}"),
            }
        }
        Command::Diff {
            left,
            right,
            select: tag,
            json,
        } => {
            let ltree = load(&left)?;
            let rtree = load(&right)?;
            let lid = select(&ltree, tag.as_deref(), &left)?;
            let rid = select(&rtree, tag.as_deref(), &right)?;
            let ops = diff_nodes(&ltree, lid, &rtree, rid);
            log::info!(
                "{} operations between {} and {}",
                ops.len(),
                left.display(),
                right.display()
            );
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ops).context("failed to encode edit script")?
                );
            } else {
                for op in &ops {
                    println!("{}", describe(op, &rtree));
                }
            }
            if !ops.is_empty() {
                return Ok(ExitCode::from(1));
            }
        }
        Command::Outline { input, cap } => {
            for line in outline(&load(&input)?, cap) {
                println!("{line}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
