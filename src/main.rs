use std::sync::Arc;

use mailpush::config::Config;
use mailpush::dispatch::HttpDispatcher;
use mailpush::server::SmtpServer;
use mailpush::session::Backend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let Some(config) = Config::from_env() else {
        eprintln!("Error: MAILPUSH_DOMAIN not set");
        eprintln!("  export MAILPUSH_DOMAIN=push.example.com");
        std::process::exit(1);
    };

    eprintln!("mailpush v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listen: {}", config.listen_addr);
    eprintln!("   Domain: {}", config.domain);
    eprintln!(
        "   Prefix: {}",
        if config.addr_prefix.is_empty() {
            "(none)"
        } else {
            config.addr_prefix.as_str()
        }
    );
    eprintln!("   Publish to: {}\n", config.base_url);

    let dispatcher = Arc::new(HttpDispatcher::new(&config.base_url));
    let backend = Arc::new(Backend::new(&config, dispatcher));
    let server = Arc::new(SmtpServer::new(backend, config.domain.clone()));

    let listener = server.bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "SMTP listener started");

    tokio::select! {
        result = Arc::clone(&server).serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
