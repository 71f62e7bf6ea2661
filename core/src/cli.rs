use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "litmus")]
#[command(about = "Litmus - run the code examples in your documents", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the tagged code blocks of one or more documents
    Run {
        /// Markdown documents to run
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write captured results back into the documents
        #[arg(short = 'u', long)]
        update: bool,

        /// Report every block, with console output
        #[arg(short = 'v', long)]
        verbose: bool,

        /// Use the offline SDK stub even when credentials are configured
        #[arg(long)]
        skip_auth: bool,

        /// Execution-context profile for blocks without `context=`
        #[arg(long)]
        context: Option<String>,

        /// Per-block timeout in milliseconds (0 disables it)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

impl Cli {
    /// Whether log output should be raised to `info`
    pub fn verbose(&self) -> bool {
        match &self.command {
            Commands::Run { verbose, .. } => *verbose,
        }
    }
}

/// Run a parsed command line, returning the process exit code
pub async fn run_cli_with_args(cli: Cli) -> Result<i32> {
    use crate::annotate::AnnotationInjector;
    use crate::block_executor::BlockExecutor;
    use crate::config::Config;
    use crate::context::{ExecutionContextFactory, LazyClient};
    use crate::executor::ScriptEvaluator;
    use crate::indexer::AstIndexer;
    use crate::runner::DocumentTestRunner;
    use crate::store::FileStore;

    let mut config = Config::builder()
        .config_path(cli.config.map(PathBuf::from))
        .dotenv(true)
        .build()
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            files,
            update,
            verbose,
            skip_auth,
            context,
            timeout_ms,
        } => {
            if let Some(context) = context {
                config.execution.default_context = context;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.execution.timeout_ms = timeout_ms;
            }

            let evaluator = match config.execution.timeout() {
                Some(timeout) => ScriptEvaluator::with_timeout(timeout),
                None => ScriptEvaluator::new(),
            };
            let sdk = LazyClient::new(
                config.sdk.clone(),
                skip_auth,
                Some(tokio::runtime::Handle::current()),
            );
            let contexts = ExecutionContextFactory::new(Arc::new(sdk))
                .with_profiles(config.profiles.clone())
                .with_default_profile(config.execution.default_context.clone());
            let executor = BlockExecutor::new(Arc::new(evaluator), Arc::new(AstIndexer), contexts)
                .with_format(config.format.clone());

            let runner = DocumentTestRunner::new(executor, Arc::new(FileStore))
                .with_update(update)
                .with_injector(AnnotationInjector::new(config.execution.indent.clone()));

            info!(documents = files.len(), update, "running documents");
            let report = runner.run(&files).await;
            print!("{}", report.render(verbose));
            Ok(report.exit_code())
        }
    }
}
