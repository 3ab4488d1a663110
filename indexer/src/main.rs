use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use search_core::builder::{build, parse_doc_id, BuildOptions, DEFAULT_BATCH_SIZE};
use search_core::persist::{load_index, save_index, IndexPaths};
use search_core::store::{DocumentStore, NewDocument};
use search_core::synth::SyntheticCorpus;
use search_core::InvertedIndex;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Accepted shapes of a `.json` input file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonInput {
    List(Vec<NewDocument>),
    Wrapped {
        #[serde(alias = "docs")]
        documents: Vec<NewDocument>,
    },
    Single(NewDocument),
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Ingest documents and build the boolean inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a single document to the store
    Add {
        /// Document store path
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    /// Ingest documents from a JSON/JSONL file or a directory of them
    Ingest {
        #[arg(long)]
        store: PathBuf,
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Print a stored document
    Get {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        id: String,
    },
    /// Insert a deterministic synthetic corpus
    Generate {
        #[arg(long)]
        store: PathBuf,
        /// Number of documents
        #[arg(long, default_value_t = 1000)]
        n: usize,
        #[arg(long, default_value = "seed")]
        seed: String,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Build the index from the document store
    Build {
        #[arg(long)]
        store: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Summarize a built index
    Stats {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Add { store, title, body } => {
            let store = DocumentStore::open(&store)?;
            let doc = store.insert(NewDocument::new(title, body))?;
            store.flush()?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "document": doc }))?);
        }
        Commands::Ingest { store, input, batch_size } => {
            let store = DocumentStore::open(&store)?;
            let count = ingest(&store, &input, batch_size)?;
            store.flush()?;
            println!("{}", serde_json::json!({ "count": count }));
        }
        Commands::Get { store, id } => {
            let id = parse_doc_id(&id)?;
            let store = DocumentStore::open(&store)?;
            match store.get(id)? {
                Some(doc) => println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "document": doc }))?),
                None => {
                    println!("{}", serde_json::json!({ "document": null }));
                    std::process::exit(2);
                }
            }
        }
        Commands::Generate { store, n, seed, batch_size } => {
            if n == 0 || batch_size == 0 {
                bail!("--n and --batch-size must be positive integers");
            }
            let store = DocumentStore::open(&store)?;
            generate(&store, n, &seed, batch_size)?;
            store.flush()?;
        }
        Commands::Build { store, output, batch_size } => {
            let store = DocumentStore::open(&store)?;
            let index = build(&store, &BuildOptions::default().with_batch_size(batch_size))?;
            let paths = IndexPaths::new(&output);
            save_index(&paths, &index)?;
            tracing::info!(output = %output.display(), "index written");
            print_summary(&index)?;
        }
        Commands::Stats { index } => {
            let index = load_index(&IndexPaths::new(&index))
                .with_context(|| format!("loading index from {}", index.display()))?;
            print_summary(&index)?;
        }
    }
    Ok(())
}

fn print_summary(index: &InvertedIndex) -> Result<()> {
    let summary = serde_json::json!({ "docCount": index.doc_count, "termCount": index.term_count() });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    for (term, postings) in index.postings.iter().take(10) {
        let head = &postings[..postings.len().min(5)];
        println!("{term} {}", serde_json::to_string(head)?);
    }
    Ok(())
}

fn ingest(store: &DocumentStore, input: &Path, batch_size: usize) -> Result<usize> {
    if batch_size == 0 {
        bail!("--batch-size must be a positive integer");
    }
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }

    let mut total = 0;
    for file in files {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        for chunk in docs.chunks(batch_size) {
            total += store.insert_batch(chunk.to_vec())?.len();
        }
        tracing::info!(file = %file.display(), total, "ingested file");
    }
    Ok(total)
}

fn read_jsonl(file: &Path) -> Result<Vec<NewDocument>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: NewDocument = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), n + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<NewDocument>> {
    let reader = BufReader::new(File::open(file)?);
    let input: JsonInput = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    Ok(match input {
        JsonInput::List(docs) | JsonInput::Wrapped { documents: docs } => docs,
        JsonInput::Single(doc) => vec![doc],
    })
}

fn generate(store: &DocumentStore, n: usize, seed: &str, batch_size: usize) -> Result<()> {
    let mut corpus = SyntheticCorpus::new(seed);
    let mut inserted = 0;
    while inserted < n {
        let size = batch_size.min(n - inserted);
        let docs: Vec<NewDocument> = (0..size).map(|_| corpus.next_document()).collect();
        inserted += store.insert_batch(docs)?.len();
        tracing::info!(inserted, n, "inserted synthetic documents");
    }
    Ok(())
}
