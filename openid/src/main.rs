use std::process::ExitCode;

use clap::Parser;
use openid::{AccountId, OpenIdBuilder, PasskeyConfig, RelyingParty};
use tracing_subscriber::EnvFilter;

/// Admin command line interface for OpenID passkeys
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://openid.db")]
    db_url: String,

    /// Public URL users load the site from; determines the relying party id
    #[arg(long, env = "OPENID_PUBLIC_URL", default_value = "http://localhost:8080")]
    public_url: String,

    /// Relying party name shown by authenticators
    #[arg(long, env = "OPENID_SITE_NAME", default_value = "OpenID")]
    site_name: String,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Print an account's passkeys as JSON
    Credentials { account_id: i64 },
    /// Delete one of an account's passkeys
    Revoke {
        account_id: i64,
        /// Base64url credential id as printed by `credentials`
        credential_id: String,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Version = cli.command {
        println!("OpenID v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let relying_party = RelyingParty::from_public_url(cli.site_name, &cli.public_url)?;
    let openid = OpenIdBuilder::new(PasskeyConfig::new(relying_party))
        .with_sqlite(&cli.db_url)
        .await?
        .build_webauthn()
        .await?;

    match cli.command {
        Commands::Migrate => {
            openid.migrate().await?;
            println!("Migrations applied");
        }
        Commands::Credentials { account_id } => {
            let credentials = openid.list_passkeys(&AccountId::new(account_id)).await?;
            println!("{}", serde_json::to_string_pretty(&credentials)?);
        }
        Commands::Revoke {
            account_id,
            credential_id,
        } => {
            openid
                .delete_passkey(&AccountId::new(account_id), &credential_id)
                .await?;
            println!("Revoked {credential_id}");
        }
        Commands::Version => {}
    }

    Ok(())
}
