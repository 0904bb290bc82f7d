use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use convflow::annotate::SilverAnnotator;
use convflow::{Config, Conversation, HttpKb};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "convflow")]
#[command(about = "Silver annotation of conversational QA benchmarks by distant supervision")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate the train/dev/test splits from config, or a single file
    Annotate {
        /// Input dataset (JSON list of conversations); all configured splits if omitted
        #[arg(short, long, requires = "output")]
        input: Option<PathBuf>,

        /// Annotated dataset output
        #[arg(short, long, requires = "input")]
        output: Option<PathBuf>,

        /// Turn relevance dataset output
        #[arg(short, long, requires = "input")]
        relevance_output: Option<PathBuf>,
    },
    /// Annotate one conversation and print it as JSON
    Example {
        /// Position of the conversation in the dataset
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Dataset to read from; the configured train split if omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Also print the flow graph
        #[arg(long)]
        show_graph: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.convflow.log_level.as_str()),
    )
    .init();
    log::info!("Configuration loaded successfully");
    log::info!("KB service: {}", config.kb.base_url);

    let kb = HttpKb::from_config(&config.kb)?;

    match args.command {
        Command::Annotate {
            input,
            output,
            relevance_output,
        } => {
            let annotator = SilverAnnotator::from_config(kb, &config)?;
            match (input, output) {
                (Some(input), Some(output)) => {
                    annotator
                        .process_dataset(&input, &output, relevance_output.as_deref())
                        .await?;
                }
                _ => {
                    for split in config.splits() {
                        let start = Instant::now();
                        log::info!("Split {}: {}", split.name, split.input.display());
                        annotator
                            .process_dataset(&split.input, &split.output, Some(&split.relevance_output))
                            .await
                            .with_context(|| format!("Failed to annotate split {}", split.name))?;
                        log::info!("Split {} done in {:.1?}", split.name, start.elapsed());
                    }
                }
            }
        }
        Command::Example {
            index,
            input,
            show_graph,
        } => {
            let input = match input {
                Some(path) => path,
                None => config
                    .splits()
                    .into_iter()
                    .next()
                    .map(|split| split.input)
                    .context("No dataset split configured")?,
            };
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let mut conversations: Vec<Conversation> = serde_json::from_str(&content)?;
            let conversation = conversations.get_mut(index).with_context(|| {
                format!("{} has no conversation at index {}", input.display(), index)
            })?;

            let annotator = SilverAnnotator::from_config(kb, &config)?;
            let report = annotator.annotate_conversation(conversation).await?;
            match &report {
                Some(report) => log::info!(
                    "{} questions in graph, {} relevance examples",
                    report.question_count,
                    report.relevance_examples.len()
                ),
                None => log::warn!("First turn could not be grounded in the KB"),
            }
            println!("{}", serde_json::to_string_pretty(&*conversation)?);

            if show_graph {
                let graph = report.map(|report| report.graph);
                println!("{}", serde_json::to_string_pretty(&graph)?);
            }
        }
    }

    Ok(())
}
