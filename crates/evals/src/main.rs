//! rag-eval: benchmark generation and evaluation for RAG systems

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::{pin_mut, StreamExt};
use llm::LlmClient;
use tracing::info;

use evals::config::{self, Config};
use evals::{
    read_jsonl, CorpusStore, Embedder, IpcRagClient, JsonlCorpus, JsonlWriter, JudgeModel,
    MetricsSummary, Progress, PromptKey, PromptTranslator, QuestionEvaluation, TestSet, TestSetEvaluator,
    TestSetGenerator,
};

#[derive(Parser)]
#[command(name = "rag-eval")]
#[command(about = "Generate benchmarks for and evaluate a RAG system")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the RAG daemon socket
    #[arg(short, long, global = true, env = "RAG_EVAL_SOCKET")]
    socket: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a benchmark from the documents of an index
    Generate {
        /// Index to read documents from
        #[arg(short, long)]
        index: Option<String>,

        /// Questions per document
        #[arg(short, long)]
        count: Option<usize>,

        /// Translate questions and answers into this language
        #[arg(short, long)]
        language: Option<String>,

        /// Read partitions from a JSON-lines export instead of the daemon
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Seed for keyphrase shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the benchmark (JSON lines)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Evaluate the RAG system against a benchmark
    Evaluate {
        /// Index to ask questions against
        #[arg(short, long)]
        index: Option<String>,

        /// Benchmark file (JSON lines)
        #[arg(long)]
        input: PathBuf,

        /// Where to write per-question results (JSON lines)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the summary of a finished evaluation
    Summarize {
        /// Evaluation results (JSON lines)
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the packaged prompt templates
    Prompts,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    match cli.command {
        Commands::Generate {
            index,
            count,
            language,
            corpus,
            seed,
            output,
        } => {
            let index = resolve_index(index, &config)?;
            let corpus: Arc<dyn CorpusStore> = match corpus {
                Some(path) => Arc::new(JsonlCorpus::new(path)),
                None => Arc::new(IpcRagClient::new(socket_path(cli.socket, &config)?)),
            };

            let mut options = config.generation.options();
            if let Some(count) = count {
                options.count = count;
            }
            if language.is_some() {
                options.language = language;
            }

            let judge: Arc<dyn JudgeModel> = Arc::new(LlmClient::new(config.judge.clone()));
            let mut generator = TestSetGenerator::new(judge, corpus).with_on_progress(Box::new(|progress: Progress| {
                info!("Generated {}/{}", progress.current, progress.total);
            }));
            if let Some(seed) = seed {
                generator = generator.with_seed(seed);
            }
            if options.language.is_some() {
                let translator_config = config
                    .translator
                    .clone()
                    .unwrap_or_else(|| config.judge.clone())
                    .with_env_fallback();
                generator = generator.with_translator(Arc::new(PromptTranslator::new(LlmClient::new(translator_config))));
            }

            run_generate(&generator, &index, options, &output).await
        }
        Commands::Evaluate { index, input, output } => {
            let index = resolve_index(index, &config)?;
            let socket_path = socket_path(cli.socket, &config)?;

            let llm = LlmClient::new(config.judge.clone());
            let judge: Arc<dyn JudgeModel> = Arc::new(llm.clone());
            let embedder: Arc<dyn Embedder> = Arc::new(llm);
            let system = Arc::new(IpcRagClient::new(&socket_path));

            println!("Evaluating against: {} (index {})", socket_path.display(), index);
            let evaluator = TestSetEvaluator::new(judge, embedder, system, index, config.evaluation.options());
            run_evaluate(&evaluator, &input, &output).await
        }
        Commands::Summarize { input, json } => {
            let evaluations: Vec<QuestionEvaluation> = read_jsonl(&input)?;
            let summary = MetricsSummary::from_evaluations(&evaluations);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                summary.print_summary();
            }
            Ok(())
        }
        Commands::Prompts => {
            for key in PromptKey::ALL {
                let kind = if key.expects_json() { "json" } else { "text" };
                println!("{:<40} {}", key.to_string(), kind);
            }
            Ok(())
        }
    }
}

fn resolve_index(index: Option<String>, config: &Config) -> Result<String> {
    index
        .or_else(|| config.target.index.clone())
        .context("Index not set. Use --index or set target.index in the config file")
}

fn socket_path(socket: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    match socket {
        Some(path) => Ok(path),
        None => config::get_socket_path(config),
    }
}

async fn run_generate(
    generator: &TestSetGenerator,
    index: &str,
    options: evals::GenerationOptions,
    output: &Path,
) -> Result<()> {
    let stream = generator.generate(index, options)?;
    pin_mut!(stream);

    let mut writer = JsonlWriter::<TestSet>::create(output)?;
    while let Some(test_set) = stream.next().await {
        let test_set = test_set.context("Test set generation failed")?;
        writer.write(&test_set)?;
    }

    println!("Wrote {} test sets to {}", writer.written(), writer.path().display());
    Ok(())
}

async fn run_evaluate(evaluator: &TestSetEvaluator, input: &Path, output: &Path) -> Result<()> {
    let test_sets: Vec<TestSet> = read_jsonl(input)?;
    println!("Evaluating {} question(s)...\n", test_sets.len());

    let stream = evaluator.evaluate(test_sets);
    pin_mut!(stream);

    let mut writer = JsonlWriter::<QuestionEvaluation>::create(output)?;
    let mut evaluations = Vec::new();
    while let Some(evaluation) = stream.next().await {
        let evaluation = evaluation.context("Evaluation failed")?;
        writer.write(&evaluation)?;
        evaluations.push(evaluation);
    }

    MetricsSummary::from_evaluations(&evaluations).print_summary();
    println!("Results written to {}", writer.path().display());
    Ok(())
}
