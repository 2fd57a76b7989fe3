//! CLI definition and command dispatch for Hukum.
//!
//! ## Configuration Precedence
//!
//! 1. `--config PATH`
//! 2. `HUKUM_CONFIG`
//! 3. `~/.hukum/config.yaml`
//! 4. Built-in defaults

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::ui::color::terminal_width;
use crate::ui::{format, table, ColorMode, MessageType, Progress, ProgressMode, Style};

use hukum_core::lexical::{load_lexical_meta, tokenize};
use hukum_core::{
    read_chunk_records, Chunk, Chunker, HukumConfig, HukumEngine, HukumError, HukumPorts,
    QueryOptions, QueryOutcome, SearchMethod,
};

// ============================================================================
// CLI Definition
// ============================================================================

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Hybrid retrieval and question answering over Indonesian legal documents
#[derive(Parser, Debug)]
#[command(name = "hukum")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "HUKUM_VERBOSE", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors and hide progress
    #[arg(short, long, global = true, env = "HUKUM_QUIET")]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.hukum/config.yaml)
    #[arg(long, global = true, env = "HUKUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode: always, never, or auto
    #[arg(long, global = true, env = "HUKUM_COLOR", default_value = "auto")]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk documents and build the search index
    #[command(after_help = r#"EXAMPLES:
    # Index every .txt file under a folder
    hukum index putusan/

    # Index pre-chunked JSONL records ({"id", "content", "metadata"} per line)
    hukum index chunks.jsonl --jsonl
"#)]
    Index {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Read JSONL chunk records instead of chunking text files
        #[arg(long)]
        jsonl: bool,

        /// Target chunk size in characters
        #[arg(long, default_value = "800")]
        chunk_size: usize,

        /// Characters shared between neighbouring chunks
        #[arg(long, default_value = "150")]
        chunk_overlap: usize,
    },

    /// Retrieve matching chunks without generating an answer
    #[command(after_help = r#"EXAMPLES:
    # Hybrid search (lexical + semantic)
    hukum search "Pasal 1365 KUHPerdata"

    # Lexical only, top 10
    hukum search "perbuatan melanggar hukum" --method bm25 -k 10

    # JSON for scripting
    hukum search "kepailitan" --json
"#)]
    Search {
        query: String,

        /// Number of results (default: query.finalTopK)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Retrieval method: bm25, semantic or hybrid
        #[arg(long, default_value = "hybrid")]
        method: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the indexed documents
    #[command(after_help = r#"EXAMPLES:
    # Ask a question
    hukum ask "Apa unsur perbuatan melanggar hukum menurut Pasal 1365?"

    # Stream tokens as they are generated
    hukum ask "Apa syarat kepailitan?" --stream

    # Full response as JSON
    hukum ask "Apa syarat kepailitan?" --json
"#)]
    Ask {
        query: String,

        /// Chunks kept after reranking (default: query.finalTopK)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Maximum generated tokens (default: generation.maxTokens)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Sampling temperature (default: generation.temperature)
        #[arg(long)]
        temperature: Option<f32>,

        /// Leave the assembled context out of the output
        #[arg(long)]
        no_context: bool,

        /// Stream the answer; skips reranking and the relevance gate
        #[arg(long, conflicts_with = "json")]
        stream: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Talk to the model directly, without retrieval
    Chat {
        question: String,

        #[arg(long)]
        max_tokens: Option<usize>,

        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Show index and backend statistics
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete the search index
    Clear {
        /// Also delete every vector from the vector store
        #[arg(long)]
        semantic: bool,
    },

    /// Show the lexical tokens for a piece of text
    #[command(after_help = r#"EXAMPLES:
    hukum tokenize "Pasal 1365 KUHPerdata jo. UU No. 40 Tahun 2007"
"#)]
    Tokenize {
        text: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Run function
// ============================================================================

/// Parse arguments, build the engine and dispatch.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let style = Style::new(cli.color);

    // No engine needed.
    if let Command::Tokenize { text, json } = &cli.command {
        return finish(&style, handle_tokenize(&style, text, *json));
    }

    let config = match HukumConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check ~/.hukum/config.yaml or $HUKUM_CONFIG".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context("Failed to load configuration", Some(&e.to_string()), Some(&hint))
            );
            return ExitCode::FAILURE;
        }
    };

    let engine = match HukumPorts::from_config(&config)
        .and_then(|ports| HukumEngine::new(config.clone(), ports))
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!(
                "{}",
                style.error_with_context("Failed to initialize Hukum engine", Some(&e.to_string()), None)
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Index {
            paths,
            jsonl,
            chunk_size,
            chunk_overlap,
        } => handle_index(&style, &engine, &paths, jsonl, chunk_size, chunk_overlap, cli.quiet),
        Command::Search {
            query,
            top_k,
            method,
            json,
        } => handle_search(&style, &engine, &query, top_k, &method, json),
        Command::Ask {
            query,
            top_k,
            max_tokens,
            temperature,
            no_context,
            stream,
            json,
        } => {
            let mut options = QueryOptions::from_config(engine.config());
            if let Some(k) = top_k {
                options.top_k = k;
            }
            if let Some(n) = max_tokens {
                options.max_tokens = n;
            }
            if let Some(t) = temperature {
                options.temperature = t;
            }
            options.include_context = !no_context;

            if stream {
                handle_ask_stream(&engine, &query, &options)
            } else {
                handle_ask(&style, &engine, &query, &options, json, cli.quiet, cli.verbose)
            }
        }
        Command::Chat {
            question,
            max_tokens,
            temperature,
        } => handle_chat(&engine, &question, max_tokens, temperature, cli.quiet),
        Command::Stats { json } => handle_stats(&style, &engine, json),
        Command::Clear { semantic } => handle_clear(&style, &engine, semantic),
        Command::Tokenize { text, json } => handle_tokenize(&style, &text, json),
    };

    finish(&style, result)
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hukum_core={level},hukum_db={level},hukum_model={level},hukum_cli={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn finish(style: &Style, result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let hint = e.downcast_ref::<HukumError>().and_then(error_hint);
            eprintln!("{}", style.error_with_context(&format!("{:#}", e), None, hint));
            ExitCode::FAILURE
        }
    }
}

fn error_hint(error: &HukumError) -> Option<&'static str> {
    match error {
        HukumError::BackendNotReady { .. } | HukumError::Generation { .. } => {
            Some("Is the generation server running? Check generation.baseUrl and generation.model")
        }
        HukumError::IndexNotReady => Some("Run `hukum index <PATHS>` first"),
        HukumError::IndexStoreParse { .. } => {
            Some("The index snapshot is unreadable; run `hukum clear` and re-index")
        }
        HukumError::SemanticSearch { .. } | HukumError::Embedding { .. } => {
            Some("Try `--method bm25`, or check the embedding and vectorStore settings")
        }
        _ => None,
    }
}

// ============================================================================
// Command handlers
// ============================================================================

fn handle_index(
    style: &Style,
    engine: &HukumEngine,
    paths: &[PathBuf],
    jsonl: bool,
    chunk_size: usize,
    chunk_overlap: usize,
    quiet: bool,
) -> anyhow::Result<()> {
    let progress = Progress::spinner("Reading documents...", ProgressMode::detect(quiet, false));

    let chunks = if jsonl {
        let mut chunks: Vec<Chunk> = Vec::new();
        for path in paths {
            chunks.extend(read_chunk_records(path)?);
        }
        chunks
    } else {
        Chunker::new(chunk_size, chunk_overlap).chunk_paths(paths)?
    };

    if chunks.is_empty() {
        progress.finish_clear();
        if jsonl {
            bail!("No chunk records found in the given files");
        }
        bail!("No .txt files with content found under the given paths");
    }

    progress.set_message(&format!("Indexing {} chunks...", chunks.len()));
    let report = engine.build_index(chunks)?;
    progress.set_message("Saving index...");
    let meta = engine.save()?;
    let elapsed = progress.elapsed();
    progress.finish_clear();

    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!(
                "Indexed {} chunks in {}",
                format::format_thousands(report.document_count as u64),
                format::format_millis(elapsed.as_millis() as u64)
            )
        )
    );
    println!(
        "{}",
        style.message_detail("Vocabulary", &format::format_thousands(report.vocabulary_size as u64))
    );
    let semantic = match report.semantic_indexed {
        Some(count) => format!("{} vectors", format::format_thousands(count as u64)),
        None => "skipped (lexical-only)".to_string(),
    };
    println!("{}", style.message_detail("Semantic", &semantic));
    println!(
        "{}",
        style.message_detail("Index", &engine.config().index_dir().display().to_string())
    );
    tracing::debug!("Snapshot version {} built at {}", meta.version, meta.built_at);
    Ok(())
}

fn handle_search(
    style: &Style,
    engine: &HukumEngine,
    query: &str,
    top_k: Option<usize>,
    method: &str,
    json: bool,
) -> anyhow::Result<()> {
    let method: SearchMethod = method.parse()?;
    let top_k = top_k.unwrap_or(engine.config().query.final_top_k);
    let results = engine.search(query, top_k, method)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("{}", style.section("SEARCH"));
    println!();
    println!("  {}", style.key_value("Query", query));
    println!("  {}", style.key_value("Method", method.as_str()));
    println!();

    if results.is_empty() {
        println!("{}", style.message(MessageType::Info, "No matching chunks."));
        if engine.lexical_index()?.is_empty() {
            println!("{}", style.message(MessageType::Hint, "Run `hukum index <PATHS>` first"));
        }
        return Ok(());
    }

    let rows: Vec<table::ResultRow> = results
        .iter()
        .map(|c| table::ResultRow {
            source: c.chunk.metadata.source().unwrap_or("unknown").to_string(),
            page: c.chunk.metadata.page(),
            score: c.score,
            via: c.source.to_string(),
            content: c.chunk.content.clone(),
        })
        .collect();
    println!("{}", table::render_results_table(&rows, terminal_width()));
    Ok(())
}

fn handle_ask(
    style: &Style,
    engine: &HukumEngine,
    query: &str,
    options: &QueryOptions,
    json: bool,
    quiet: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let progress = Progress::spinner("Connecting to model...", ProgressMode::detect(quiet, json));
    engine.ensure_ready()?;
    progress.set_message("Searching and generating...");
    let response = engine.answer(query, options)?;
    progress.finish_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", style.section("ANSWER"));
    println!();
    println!("{}", response.answer);
    println!();

    match response.outcome {
        QueryOutcome::NoDocuments => {
            println!("{}", style.message(MessageType::Hint, "Run `hukum index <PATHS>` to add documents"));
        }
        QueryOutcome::OffTopic => {
            println!(
                "{}",
                style.message(MessageType::Info, "No document was relevant enough to cite")
            );
        }
        QueryOutcome::Fallback | QueryOutcome::Apology => {
            println!(
                "{}",
                style.message(
                    MessageType::Warn,
                    &format!("Answered without document context ({})", response.outcome)
                )
            );
        }
        _ => {}
    }

    if !response.sources.is_empty() {
        let rows: Vec<table::SourceRow> = response
            .sources
            .iter()
            .map(|s| table::SourceRow {
                source: s.source.clone(),
                page: s.page.clone(),
                doc_type: s.doc_type.clone(),
                score: s.score,
            })
            .collect();
        println!("{}", style.section("SOURCES"));
        println!();
        println!("{}", table::render_sources_table(&rows));
    }

    if verbose {
        let threshold = engine.config().gate.threshold;
        let top = response
            .candidates
            .first()
            .and_then(|c| c.rerank_score)
            .map(|s| style.rerank_score(s, threshold))
            .unwrap_or_else(|| "-".to_string());
        let t = response.timings;
        println!();
        println!(
            "{}",
            style.muted(&format!(
                "{} | top rerank {} | retrieve {}, rerank {}, generate {}, total {}",
                response.outcome,
                top,
                format::format_millis(t.retrieve_ms),
                format::format_millis(t.rerank_ms),
                format::format_millis(t.generate_ms),
                format::format_millis(t.total_ms)
            ))
        );
    }
    Ok(())
}

fn handle_ask_stream(engine: &HukumEngine, query: &str, options: &QueryOptions) -> anyhow::Result<()> {
    engine.ensure_ready()?;
    let stream = engine.answer_stream(query, options)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for token in stream {
        write!(out, "{}", token?)?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn handle_chat(
    engine: &HukumEngine,
    question: &str,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    quiet: bool,
) -> anyhow::Result<()> {
    let generation = &engine.config().generation;
    let progress = Progress::spinner("Generating...", ProgressMode::detect(quiet, false));
    engine.ensure_ready()?;
    let answer = engine.chat(
        question,
        max_tokens.unwrap_or(generation.max_tokens),
        temperature.unwrap_or(generation.temperature),
    )?;
    progress.finish_clear();
    println!("{}", answer.trim());
    Ok(())
}

fn handle_stats(style: &Style, engine: &HukumEngine, json: bool) -> anyhow::Result<()> {
    let stats = engine.stats()?;
    let snapshot = load_lexical_meta(&engine.config().index_dir()).unwrap_or_else(|e| {
        tracing::warn!("Could not read index metadata: {}", e);
        None
    });

    if json {
        let output = serde_json::json!({
            "engine": stats,
            "snapshot": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", style.section("INDEX"));
    println!();
    println!(
        "  {}",
        style.key_value("Documents", &format::format_thousands(stats.document_count as u64))
    );
    println!(
        "  {}",
        style.key_value("Vocabulary", &format::format_thousands(stats.vocabulary_size as u64))
    );
    println!(
        "  {}",
        style.key_value("Avg length", &format!("{:.1} tokens", stats.average_document_length))
    );
    println!("  {}", style.key_value("Path", &stats.index_path.display().to_string()));
    match snapshot {
        Some(meta) => {
            let built = chrono::DateTime::parse_from_rfc3339(&meta.built_at)
                .map(|t| format::format_relative_time(t.with_timezone(&chrono::Utc)))
                .unwrap_or(meta.built_at);
            println!("  {}", style.key_value("Built", &built));
        }
        None => println!("  {}", style.key_value("Built", "not saved")),
    }

    println!();
    println!("{}", style.section("BACKENDS"));
    println!();
    let semantic = match (&stats.semantic_backend, stats.vector_count) {
        (Some(backend), Some(count)) => format!(
            "{} ({} vectors, {})",
            backend,
            format::format_thousands(count as u64),
            if stats.semantic_backend_connected { "connected" } else { "disconnected" }
        ),
        (Some(backend), None) => format!("{} (unavailable)", backend),
        _ => "disabled".to_string(),
    };
    println!("  {}", style.key_value("Semantic", &semantic));
    if let Some(model) = &stats.embedding_model {
        println!("  {}", style.key_value("Embedding", model));
    }
    let reranker = match (&stats.reranker_model, stats.reranker_enabled) {
        (Some(model), true) => model.clone(),
        _ => "disabled".to_string(),
    };
    println!("  {}", style.key_value("Reranker", &reranker));
    println!(
        "  {}",
        style.key_value(
            "Generator",
            &format!(
                "{} ({})",
                stats.generation_model,
                if stats.generation_backend_ready { "ready" } else { "unreachable" }
            )
        )
    );
    println!("  {}", style.key_value("Fusion", &stats.fusion_method));
    println!("  {}", style.key_value("Gate", &format!("{:.2}", stats.gate_threshold)));

    if stats.document_count == 0 {
        println!();
        println!("{}", style.message(MessageType::Hint, "Run `hukum index <PATHS>` to build the index"));
    }
    Ok(())
}

fn handle_clear(style: &Style, engine: &HukumEngine, semantic: bool) -> anyhow::Result<()> {
    engine
        .clear_index(semantic)
        .with_context(|| format!("Failed to clear {}", engine.config().index_dir().display()))?;
    let what = if semantic {
        "Cleared lexical index and vectors"
    } else {
        "Cleared lexical index"
    };
    println!("{}", style.message(MessageType::Ok, what));
    Ok(())
}

fn handle_tokenize(style: &Style, text: &str, json: bool) -> anyhow::Result<()> {
    let tokens = tokenize(text);

    if json {
        println!("{}", serde_json::to_string(&tokens)?);
        return Ok(());
    }

    if tokens.is_empty() {
        println!("{}", style.message(MessageType::Info, "No tokens (only stopwords or punctuation)"));
        return Ok(());
    }
    println!("{}", tokens.join(" "));
    println!("{}", style.muted(&format!("{} tokens", tokens.len())));
    Ok(())
}
