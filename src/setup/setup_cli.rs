use clap::{Parser, Subcommand};
use draft_backend::config::Config;
use draft_backend::helper::resolution_helpers;
use draft_backend::models::git_operations::github_operations::GitHubClient;
use draft_backend::setup;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "Operator tasks for the draft review service.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SecretAction {
    /// Print a new session-signing secret.
    Generate,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Report which required settings are missing.
    Check,
}

#[derive(Subcommand, Debug)]
enum DraftsAction {
    /// List open drafts on the configured repository.
    List,
}

#[actix_web::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match &cli.command {
        Commands::Secret { action: SecretAction::Generate } => {
            println!("{}", setup::generate_session_secret());
            ExitCode::SUCCESS
        }
        Commands::Config { action: ConfigAction::Check } => check_config(&config),
        Commands::Drafts { action: DraftsAction::List } => list_drafts(&config).await,
    }
}

fn check_config(config: &Config) -> ExitCode {
    println!("Repository: {}/{}", config.github.owner, config.github.repo);
    println!("Site URL:   {}", config.site_url);

    let report = setup::check_settings(config);
    for setting in &report {
        if setting.is_set {
            println!("✅ {} is set", setting.name);
        } else {
            println!("❌ {} is missing", setting.name);
        }
    }

    if report.iter().all(|s| s.is_set) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn list_drafts(config: &Config) -> ExitCode {
    let client = match GitHubClient::new(config.github.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Error creating GitHub client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match resolution_helpers::list_draft_prs(&client).await {
        Ok(drafts) if drafts.is_empty() => {
            println!("No open drafts.");
            ExitCode::SUCCESS
        }
        Ok(drafts) => {
            println!("Open drafts:");
            for draft in drafts {
                println!(
                    "- {} (PR #{}, branch {}, by {}, updated {})",
                    draft.slug, draft.pr_number, draft.branch, draft.author, draft.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error listing drafts: {}", e);
            ExitCode::FAILURE
        }
    }
}
