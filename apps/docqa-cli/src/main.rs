//! docqa command-line interface.
//!
//! ```bash
//! docqa ingest ./chunks --replace
//! docqa query "quarterly revenue" -n 5 --explain
//! docqa ask "What was the revenue?" --file report.pdf
//! docqa eval --mode auto --samples 300
//! docqa list
//! ```

mod app;
mod output;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use docqa_core::config::Config;
use docqa_core::records::RecordLoader;
use docqa_core::Filter;
use docqa_hybrid::DatasetMode;
use docqa_vector::self_recall;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use crate::app::App;

/// Hybrid (dense + lexical) retrieval and question answering over document chunks.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed and store chunk records from `.jsonl` files under a directory
    Ingest {
        dir: PathBuf,
        #[arg(long, default_value = "16")]
        batch_size: usize,
        /// Replace stored chunks of every ingested filename
        #[arg(long)]
        replace: bool,
    },
    /// Retrieve and rank chunks for a query
    Query {
        query: String,
        #[arg(short = 'n', long, default_value = "5")]
        top_k: usize,
        /// Restrict to one document
        #[arg(long)]
        file: Option<String>,
        /// Show per-signal scores
        #[arg(long)]
        explain: bool,
        #[arg(long)]
        json: bool,
    },
    /// Answer a question from retrieved chunks
    Ask {
        question: String,
        #[arg(long)]
        file: Option<String>,
        /// Skip bilingual query expansion
        #[arg(long)]
        no_expand: bool,
        #[arg(long)]
        json: bool,
    },
    /// Summarize one stored document
    Summarize { filename: String },
    /// Remove every chunk of a document
    Delete { filename: String },
    /// List stored documents
    List,
    /// Print the stored text of a document
    Show { filename: String },
    /// Check that stored chunks find themselves by exact search
    RecallCheck {
        #[arg(long, default_value = "20")]
        samples: usize,
    },
    /// Measure self-recall and document/page/chunk recall on generated questions
    Eval {
        /// load, generate or auto
        #[arg(long, default_value = "auto")]
        mode: DatasetMode,
        /// Saved question set (.jsonl)
        #[arg(long, default_value = "eval_cases.jsonl")]
        dataset: PathBuf,
        /// Questions to generate
        #[arg(long, default_value = "300")]
        samples: usize,
        #[arg(short = 'k', long, default_value = "50")]
        top_k: usize,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Config::load()?.settings()?;
    let app = App::open(settings).await?;

    match cli.command {
        Command::Ingest { dir, batch_size, replace } => {
            let records = RecordLoader::new().load_directory(&dir)?;
            if records.is_empty() {
                bail!("no chunk records found under {}", dir.display());
            }
            let pb = ProgressBar::new(records.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
                    .progress_chars("#>-"),
            );
            let ingestor = app.ingestor()?.with_batch_size(batch_size).replace_existing(replace);
            let report = ingestor
                .ingest_with_progress(records, |done, _| pb.set_position(done as u64))
                .await?;
            pb.finish_and_clear();
            print!("{}", output::format_ingest(&report));
        }
        Command::Query { query, top_k, file, explain, json } => {
            let filter = file.map(Filter::filename);
            let response = app.retriever()?.retrieve_detailed(&query, top_k, filter.as_ref()).await?;
            if json {
                println!("{}", output::format_results_json(&response, explain));
            } else {
                println!("{}", output::format_results_human(&query, &response, explain));
            }
        }
        Command::Ask { question, file, no_expand, json } => {
            let filter = file.map(Filter::filename);
            let answer = app.answerer(!no_expand)?.ask(&question, filter.as_ref()).await?;
            println!("{}", output::format_answer(&answer, json));
        }
        Command::Summarize { filename } => {
            println!("{}", app.answerer(false)?.summarize(&filename).await?);
        }
        Command::Delete { filename } => {
            app.store.delete_document(&filename).await?;
            println!("Deleted {filename} ({} chunks remain)", app.store.count().await?);
        }
        Command::List => {
            let names = app.store.list_filenames().await?;
            if names.is_empty() {
                println!("No documents stored.");
            }
            for name in names {
                println!("{name}");
            }
        }
        Command::Show { filename } => match app.store.document_text(&filename).await? {
            Some(text) => println!("{text}"),
            None => bail!("document `{filename}` not found"),
        },
        Command::RecallCheck { samples } => {
            let embedder = app.embedder()?;
            let report = self_recall(app.store.as_ref(), embedder.as_ref(), samples).await?;
            println!("{}", output::format_recall(&report));
        }
        Command::Eval { mode, dataset, samples, top_k, json } => {
            let evaluator = app.evaluator(top_k)?;
            let cases = evaluator.prepare_cases(mode, &dataset, samples).await?;
            let pb = ProgressBar::new(cases.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} questions")?
                    .progress_chars("#>-"),
            );
            let report = evaluator
                .evaluate_with_progress(&cases, |done, _| pb.set_position(done as u64))
                .await?;
            pb.finish_and_clear();
            println!("{}", output::format_eval(&report, json));
        }
    }
    Ok(())
}
