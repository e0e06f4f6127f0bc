//! examkit CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "examkit", version, about = "Timed computer-based exam practice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sit a timed exam in the terminal
    Take {
        /// Subject to draw questions from (e.g. "mathematics")
        #[arg(long)]
        subject: String,

        /// Test type: quick, subject, mock
        #[arg(long, default_value = "quick")]
        test_type: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured duration (seconds)
        #[arg(long)]
        duration: Option<u32>,

        /// Override the configured question count
        #[arg(long)]
        questions: Option<usize>,

        /// Report format: json, html, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Output directory for reports
        #[arg(long, default_value = "./examkit-results")]
        output: PathBuf,
    },

    /// Validate question bank TOML files
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Render a stored attempt
    Show {
        /// Attempt JSON file
        #[arg(long)]
        result: PathBuf,

        /// Output format: text, json, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("examkit=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            subject,
            test_type,
            config,
            duration,
            questions,
            format,
            output,
        } => {
            commands::take::execute(
                subject, test_type, config, duration, questions, format, output,
            )
            .await
        }
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Show {
            result,
            format,
            output,
        } => commands::show::execute(result, format, output),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
