use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use mail2sheets::auth::{CredentialProvider, InstalledFlowCredentials, StaticToken, DEFAULT_SCOPES};
use mail2sheets::config::Config;
use mail2sheets::gmail::GmailClient;
use mail2sheets::http::build_client;
use mail2sheets::processor::{EmailProcessor, RunOptions};
use mail2sheets::sheets::SheetsClient;
use mail2sheets::store::ProcessedIds;

#[derive(Parser)]
#[command(name = "mail2sheets")]
#[command(about = "Append unread Gmail messages to a Google Sheet, one row per email")]
#[command(version)]
struct Args {
    /// Dry-run mode: list and print unread emails without writing anything
    #[arg(short, long)]
    dry_run: bool,

    /// Maximum number of unread emails to handle (default: unlimited)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    let config = Config::from_env()?;

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("🔑 Credentials: {}", config.auth.credentials_path);
        println!("💾 Token cache: {}", config.auth.token_cache_path);
        if config.auth.access_token.is_some() {
            println!("🎟️  Using GOOGLE_ACCESS_TOKEN (OAuth flow bypassed)");
        }
        println!("📧 Gmail query: {}", config.gmail.query);
        println!("📊 Spreadsheet: {} (range {})", config.sheets.spreadsheet_id, config.sheets.range);
        println!("🗂️  Processed IDs: {}", config.processed_ids_path);
        return Ok(());
    }

    if args.dry_run {
        info!("🧪 Starting email processing in DRY-RUN mode");
    } else {
        info!("🚀 Starting email processing");
    }

    let processed = ProcessedIds::load(&config.processed_ids_path);
    info!("Loaded {} previously processed message ID(s)", processed.len());

    let credentials = match build_credentials(&config).await {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("❌ Authentication failed: {:#}", e);
            return Err(e);
        }
    };

    let http = build_client(config.http_timeout_secs).context("Unable to build HTTP client")?;
    let gmail = GmailClient::new(http.clone(), credentials.clone(), &config.gmail);
    let sheets = SheetsClient::new(http, credentials, &config.sheets);

    let processor = EmailProcessor::new(
        gmail,
        sheets,
        RunOptions {
            dry_run: args.dry_run,
            limit: args.limit,
        },
    );

    let outcome = match processor.run(processed).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("❌ Error while processing emails: {:#}", e);
            return Err(e);
        }
    };

    if args.dry_run {
        return Ok(());
    }

    if let Err(e) = outcome.processed.save(&config.processed_ids_path) {
        error!("❌ Failed to save processed IDs: {:#}", e);
        return Err(e);
    }

    info!(
        "✅ Saved {} processed message ID(s). Processed {} new email(s).",
        outcome.processed.len(),
        outcome.report.appended
    );

    Ok(())
}

/// A token is requested up front so a broken OAuth setup aborts before any
/// mailbox access.
async fn build_credentials(config: &Config) -> Result<Arc<dyn CredentialProvider>> {
    let credentials: Arc<dyn CredentialProvider> = match &config.auth.access_token {
        Some(token) => {
            info!("Using access token from GOOGLE_ACCESS_TOKEN");
            Arc::new(StaticToken::new(token.clone()))
        }
        None => Arc::new(InstalledFlowCredentials::new(&config.auth, &DEFAULT_SCOPES).await?),
    };

    credentials
        .access_token()
        .await
        .context("Unable to obtain a Google access token")?;
    info!("Authenticated with Gmail and Google Sheets APIs");

    Ok(credentials)
}
