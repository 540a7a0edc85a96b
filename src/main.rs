use anyhow::{Context, Result};
use doc_translator::cli::{self, Command};
use doc_translator::config::Config;
use doc_translator::server::{self, AppState};
use doc_translator::DocumentTranslator;
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so `translate` output stays clean on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("doc_translator=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse_args(&args)?;

    let config = Config::from_env().context("Invalid configuration")?;
    let translator =
        DocumentTranslator::from_config(&config).context("Failed to build translator")?;

    match command {
        Command::Serve => serve(translator, &config).await,
        Command::Translate(args) => {
            let output = cli::run_translate(&translator, &args).await?;
            println!("{}", output);
            Ok(())
        }
    }
}

async fn serve(translator: DocumentTranslator, config: &Config) -> Result<()> {
    let app = server::router(AppState::new(translator, config.api_key.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Translation API listening on http://{}", addr);
    if config.api_key.is_none() {
        info!("API_KEY not set, HTTP API is unauthenticated");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
