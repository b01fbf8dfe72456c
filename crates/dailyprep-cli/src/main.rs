//! dailyprep CLI: the scheduled jobs and admin helpers of the practice backend.

use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::assign::KindArg;

#[derive(Parser)]
#[command(name = "dailyprep", version, about = "Daily UPSC practice backend jobs")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign today's question from the unused pool
    Assign {
        /// Which track to assign
        #[arg(long, value_enum, default_value = "both")]
        kind: KindArg,

        /// Calendar date (YYYY-MM-DD), default today in the configured offset
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Send a push notification to every registered device
    Push {
        /// Notification title (default: daily reminder)
        #[arg(long)]
        title: Option<String>,

        /// Notification body
        #[arg(long)]
        body: Option<String>,

        /// App screen to open on tap
        #[arg(long)]
        screen: Option<String>,
    },

    /// Check a Prelims dataset file without uploading it
    ValidateQuestions {
        /// JSON dataset file
        #[arg(long)]
        file: PathBuf,
    },

    /// Upload a Prelims dataset file into the question pool
    UploadQuestions {
        /// JSON dataset file
        #[arg(long)]
        file: PathBuf,

        /// Rows per insert request
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Record a user's answer to a Prelims question
    SubmitPrelims {
        #[arg(long)]
        user: String,

        #[arg(long)]
        question_id: String,

        /// Zero-based option index
        #[arg(long)]
        option: usize,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Upload answer photos and get an AI evaluation
    Evaluate {
        #[arg(long)]
        user: String,

        #[arg(long)]
        question_id: String,

        /// Image files (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        images: Vec<PathBuf>,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Store a peer review of another user's Mains answer
    Review {
        #[arg(long)]
        reviewer: String,

        /// Author of the reviewed answer
        #[arg(long)]
        author: String,

        /// Rubric JSON file
        #[arg(long)]
        rubric: PathBuf,

        /// Date of the reviewed answer
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show a user's streak and points
    Streak {
        #[arg(long)]
        user: String,
    },

    /// Show a user's evaluation and Prelims statistics
    Stats {
        #[arg(long)]
        user: String,
    },

    /// List shared answers, newest first
    Feed {
        /// Zero-based page number
        #[arg(long, default_value = "0")]
        page: usize,

        #[arg(long, default_value = "20")]
        page_size: usize,
    },

    /// Create a starter config and sample dataset
    Init,
}

fn env_filter() -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match "dailyprep=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Assign { kind, date } => commands::assign::execute(config, kind, date).await,
        Commands::Push {
            title,
            body,
            screen,
        } => commands::push::execute(config, title, body, screen).await,
        Commands::ValidateQuestions { file } => commands::validate_questions::execute(file),
        Commands::UploadQuestions { file, batch_size } => {
            commands::upload_questions::execute(config, file, batch_size).await
        }
        Commands::SubmitPrelims {
            user,
            question_id,
            option,
            date,
        } => commands::submit_prelims::execute(config, user, question_id, option, date).await,
        Commands::Evaluate {
            user,
            question_id,
            images,
            date,
        } => commands::evaluate::execute(config, user, question_id, images, date).await,
        Commands::Review {
            reviewer,
            author,
            rubric,
            date,
        } => commands::review::execute(config, reviewer, author, rubric, date).await,
        Commands::Streak { user } => commands::streak::execute(config, user).await,
        Commands::Stats { user } => commands::stats::execute(config, user).await,
        Commands::Feed { page, page_size } => {
            commands::feed::execute(config, page, page_size).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
