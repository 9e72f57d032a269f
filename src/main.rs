use std::path::PathBuf;

use anyhow::anyhow;
use clap::Subcommand;
use indexmap::IndexMap;
use serde::Serialize;
use sqlineage::graph::{Graph, assemble};
use sqlineage::model::ParsedSql;
use sqlineage::parser::parse_sql;
use std::time::Instant;

#[derive(clap::Parser)]
#[command(name = "sqlineage")]
#[command(about = "SQL lineage extractor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one or more SQL files into the structured lineage document.
    Parse(InputArgs),
    /// Build the node/edge lineage graph from one or more SQL files.
    Graph(InputArgs),
}

#[derive(clap::Args)]
struct InputArgs {
    /// Path to the SQL file or directory containing SQL files.
    #[arg(value_name = "SQL_[FILE|DIR]")]
    sql: PathBuf,
    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Parsed(Box<ParsedSql>),
    Graph(Box<Graph>),
}

fn output_for_file(command: &Commands, sql_file_path: &PathBuf) -> anyhow::Result<Output> {
    let sql = std::fs::read_to_string(sql_file_path)
        .map_err(|_| anyhow!("Failed to read sql file {}", sql_file_path.display()))?;
    let parsed = parse_sql(&sql);
    Ok(match command {
        Commands::Parse(_) => Output::Parsed(Box::new(parsed)),
        Commands::Graph(_) => Output::Graph(Box::new(assemble(&parsed))),
    })
}

fn main() -> anyhow::Result<()> {
    let now = Instant::now();

    env_logger::init();
    let cli = <Cli as clap::Parser>::parse();

    let args = match &cli.command {
        Commands::Parse(args) | Commands::Graph(args) => args,
    };

    let out_str = if args.sql.is_dir() {
        let mut file_outputs: IndexMap<String, Output> = IndexMap::new();
        let sql_in_dir: Vec<_> = std::fs::read_dir(&args.sql)?
            .filter_map(|res| res.ok())
            .map(|entry| entry.path())
            .filter(|file| file.extension().is_some_and(|ext| ext == "sql"))
            .collect();

        for sql_file in sql_in_dir {
            let output = output_for_file(&cli.command, &sql_file)?;
            file_outputs.insert(std::path::absolute(&sql_file)?.display().to_string(), output);
        }

        if args.pretty {
            serde_json::to_string_pretty(&file_outputs)?
        } else {
            serde_json::to_string(&file_outputs)?
        }
    } else {
        let output = output_for_file(&cli.command, &args.sql)?;
        if args.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        }
    };
    println!("{}", out_str);

    let elapsed = now.elapsed();
    log::info!("Elapsed: {:.2?}", elapsed);

    Ok(())
}
