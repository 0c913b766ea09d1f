use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use lmpipe_agent::{AgentConfig, ReActAgent, ToolRegistry};
use lmpipe_cli::{
    ConsoleObserver, display_banner, init_logging, print_answer, print_chunks,
    print_ingest_report, print_summary_report,
};
use lmpipe_core::{GenerationConfig, LLMProvider, RAGQuery, Retriever, VectorStore};
use lmpipe_ollama::OllamaClient;
use lmpipe_rag::{
    IngestConfig, LocalVectorStore, ParentChildIngester, ParentStore, sentence_aware_split, semantic_split,
};
use lmpipe_summarizer::{DocumentReader, MapReduceSummarizer, SummarizerConfig, save_summary_as_markdown};

const CHILDREN_FILE: &str = "children.json";
const PARENTS_FILE: &str = "parents.json";

#[derive(Parser, Debug)]
#[command(name = "lmpipe", version)]
#[command(about = "Summarization, parent-child RAG and a ReAct agent on a local Ollama server", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip the startup banner
    #[arg(long, global = true)]
    no_banner: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a PDF or text document with map-reduce
    Summarize(SummarizeArgs),
    /// Index a document with parent-child chunking and retrieve context for a query
    Rag(RagArgs),
    /// Answer a question with the ReAct agent
    Agent(AgentArgs),
    /// Split a document into chunks and print them
    Chunk(ChunkArgs),
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// PDF or text file
    path: PathBuf,

    /// Title of the Markdown summary (defaults to the file name)
    #[arg(long)]
    title: Option<String>,

    /// Markdown output file (defaults to Summary_<timestamp>.md)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only summarize the first N characters of the cleaned text
    #[arg(long)]
    max_chars: Option<usize>,

    #[arg(long, default_value_t = 1024)]
    num_tokens: usize,

    #[arg(long, default_value_t = 128)]
    token_overlap: usize,

    #[arg(short, long, env = "OLLAMA_CHAT_MODEL", default_value = "gemma3:4b")]
    model: String,

    #[arg(long, default_value_t = 0.5)]
    temperature: f32,

    #[arg(long, default_value_t = 40)]
    top_k: u32,

    #[arg(long, default_value_t = 0.8)]
    top_p: f32,

    /// Context window in tokens
    #[arg(long, default_value_t = 8192)]
    num_ctx: u32,

    /// Chunk summaries requested in parallel
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

#[derive(Args, Debug)]
struct RagArgs {
    /// PDF or text file
    path: PathBuf,

    #[arg(short, long)]
    query: String,

    #[arg(long, default_value_t = 256)]
    parent_tokens: usize,

    #[arg(long, default_value_t = 32)]
    parent_overlap: usize,

    #[arg(long, default_value_t = 128)]
    child_tokens: usize,

    #[arg(long, default_value_t = 16)]
    child_overlap: usize,

    #[arg(short, long, default_value_t = 3)]
    n_results: usize,

    #[arg(long, env = "OLLAMA_EMBED_MODEL")]
    embed_model: Option<String>,

    /// Directory for the persisted parent and child stores
    #[arg(long)]
    store: Option<PathBuf>,

    /// Also answer the query from the retrieved context
    #[arg(long)]
    answer: bool,
}

#[derive(Args, Debug)]
struct AgentArgs {
    query: String,

    #[arg(short, long, default_value = "qwen3:1.7b")]
    model: String,

    #[arg(long, default_value_t = 0.1)]
    temperature: f32,

    /// Maximum reasoning steps
    #[arg(long, default_value_t = 5)]
    steps: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    Sentence,
    Semantic,
}

#[derive(Args, Debug)]
struct ChunkArgs {
    /// PDF or text file
    path: PathBuf,

    #[arg(long, value_enum, default_value_t = Strategy::Sentence)]
    strategy: Strategy,

    #[arg(long, default_value_t = 1024)]
    num_tokens: usize,

    #[arg(long, default_value_t = 128)]
    token_overlap: usize,

    /// Similarity percentile below which semantic chunks are split
    #[arg(long, default_value_t = 95.0)]
    percentile: f32,

    #[arg(long, env = "OLLAMA_EMBED_MODEL")]
    embed_model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    if !cli.no_banner {
        display_banner();
    }

    match cli.command {
        Commands::Summarize(args) => summarize(args).await,
        Commands::Rag(args) => rag(args).await,
        Commands::Agent(args) => agent(args, cli.verbose).await,
        Commands::Chunk(args) => chunk(args).await,
    }
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Summary".to_string())
}

async fn summarize(args: SummarizeArgs) -> Result<()> {
    let mut reader = DocumentReader::new();
    if let Some(max_chars) = args.max_chars {
        reader = reader.with_max_chars(max_chars);
    }
    let text = reader
        .read(&args.path)
        .await
        .with_context(|| format!("reading {}", args.path.display()))?;
    info!(chars = text.chars().count(), "document loaded");

    let generation = GenerationConfig {
        model_id: args.model.clone(),
        temperature: Some(args.temperature),
        top_k: Some(args.top_k),
        top_p: Some(args.top_p),
        num_ctx: Some(args.num_ctx),
        ..Default::default()
    };
    for warning in generation.recommended_range_warnings() {
        warn!("{}", warning);
    }

    let config = SummarizerConfig {
        num_tokens: args.num_tokens,
        token_overlap: args.token_overlap,
        generation,
        map_concurrency: args.concurrency,
        ..Default::default()
    };

    let client = OllamaClient::from_env()?.with_chat_model(args.model);
    let summarizer = MapReduceSummarizer::new(client, config)?;

    println!("{} Summarizing {}...", "🤖".blue(), args.path.display());
    let report = summarizer.summarize(&text).await?;
    print_summary_report(&report);

    let title = args.title.unwrap_or_else(|| default_title(&args.path));
    let path = save_summary_as_markdown(&report.final_summary, &title, args.output.as_deref()).await?;
    println!();
    println!("{} Summary saved to {}", "✅".green(), path.display());

    Ok(())
}

async fn rag(args: RagArgs) -> Result<()> {
    let text = DocumentReader::new()
        .read(&args.path)
        .await
        .with_context(|| format!("reading {}", args.path.display()))?;

    let mut client = OllamaClient::from_env()?;
    if let Some(model) = args.embed_model {
        client = client.with_embed_model(model);
    }
    let client = Arc::new(client);

    let mut store = match &args.store {
        Some(dir) => LocalVectorStore::open(dir.join(CHILDREN_FILE)).await?,
        None => LocalVectorStore::new(),
    };
    store.connect().await?;
    let store = Arc::new(store);

    let parents = match &args.store {
        Some(dir) if dir.join(PARENTS_FILE).exists() => ParentStore::load(dir.join(PARENTS_FILE)).await?,
        _ => ParentStore::default(),
    };

    let config = IngestConfig {
        parent_tokens: args.parent_tokens,
        parent_overlap: args.parent_overlap,
        child_tokens: args.child_tokens,
        child_overlap: args.child_overlap,
        n_results: args.n_results,
    };
    let ingester = ParentChildIngester::new(store.clone(), client.clone(), config)?.with_parents(parents);

    let report = ingester.debug_run(&text, &args.query).await?;
    print_ingest_report(&report);

    if let Some(dir) = &args.store {
        store.persist().await?;
        ingester.parents()?.save(dir.join(PARENTS_FILE)).await?;
        info!(dir = %dir.display(), "stores saved");
    }

    if args.answer {
        let query = RAGQuery::new(args.query.as_str(), args.n_results);
        let prompt = ingester.enhance_prompt(&args.query, &query).await?;
        debug!(%prompt, "answer prompt");

        let generation = GenerationConfig::for_model(client.config().chat_model.clone());
        let result = client.generate(&prompt, &generation).await?;
        print_answer(&result.text);
    }

    Ok(())
}

async fn agent(args: AgentArgs, verbose: bool) -> Result<()> {
    let config = AgentConfig {
        model_name: args.model,
        temperature: args.temperature,
        max_steps: args.steps,
    };
    for warning in config.generation().recommended_range_warnings() {
        warn!("{}", warning);
    }

    let client = OllamaClient::from_env()?;
    let agent = ReActAgent::new(client, ToolRegistry::with_default_tools(), config)
        .with_observer(Arc::new(ConsoleObserver::new(verbose)));
    debug!(prompt = %agent.system_prompt(), "agent system prompt");

    let answer = agent.run(&args.query).await?;
    print_answer(&answer.answer);

    Ok(())
}

async fn chunk(args: ChunkArgs) -> Result<()> {
    let text = DocumentReader::new()
        .read(&args.path)
        .await
        .with_context(|| format!("reading {}", args.path.display()))?;

    let chunks = match args.strategy {
        Strategy::Sentence => sentence_aware_split(&text, args.num_tokens, args.token_overlap)?,
        Strategy::Semantic => {
            let mut client = OllamaClient::from_env()?;
            if let Some(model) = args.embed_model {
                client = client.with_embed_model(model);
            }
            semantic_split(&text, &client, args.percentile).await?
        }
    };

    print_chunks(&chunks);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_summarize_defaults() {
        let cli = Cli::try_parse_from(["lmpipe", "summarize", "report.pdf", "--model", "gemma3:4b"]).unwrap();
        let Commands::Summarize(args) = cli.command else {
            panic!("expected summarize");
        };
        assert_eq!(args.path, PathBuf::from("report.pdf"));
        assert_eq!(args.num_tokens, 1024);
        assert_eq!(args.token_overlap, 128);
        assert_eq!(args.top_k, 40);
        assert_eq!(args.num_ctx, 8192);
        assert_eq!(args.concurrency, 1);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_rag_requires_query() {
        assert!(Cli::try_parse_from(["lmpipe", "rag", "doc.txt"]).is_err());

        let cli = Cli::try_parse_from(["lmpipe", "rag", "doc.txt", "-q", "What?", "--answer", "-n", "5"]).unwrap();
        let Commands::Rag(args) = cli.command else {
            panic!("expected rag");
        };
        assert_eq!(args.query, "What?");
        assert_eq!(args.n_results, 5);
        assert_eq!(args.parent_tokens, 256);
        assert_eq!(args.child_overlap, 16);
        assert!(args.answer);
    }

    #[test]
    fn test_agent_defaults_and_global_flags() {
        let cli = Cli::try_parse_from(["lmpipe", "agent", "Who won?", "--no-banner", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_banner);
        let Commands::Agent(args) = cli.command else {
            panic!("expected agent");
        };
        assert_eq!(args.model, "qwen3:1.7b");
        assert_eq!(args.temperature, 0.1);
        assert_eq!(args.steps, 5);
    }

    #[test]
    fn test_chunk_strategy() {
        let cli = Cli::try_parse_from(["lmpipe", "chunk", "doc.txt", "--strategy", "semantic"]).unwrap();
        let Commands::Chunk(args) = cli.command else {
            panic!("expected chunk");
        };
        assert_eq!(args.strategy, Strategy::Semantic);
        assert_eq!(args.percentile, 95.0);
        assert!(Cli::try_parse_from(["lmpipe", "chunk", "doc.txt", "--strategy", "words"]).is_err());
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title(Path::new("docs/annual-report.pdf")), "annual-report");
    }
}
