use std::sync::Arc;

use catch_that_phish::classifier::load_classifier;
use catch_that_phish::config::AppConfig;
use catch_that_phish::mail::{ImapConnector, ReplyComposer, SmtpReplyTransport};
use catch_that_phish::poller::InboxPoller;
use catch_that_phish::routes::classify_routes;
use catch_that_phish::scheduler::spawn_poll_scheduler;

#[tokio::main]
async fn main() -> catch_that_phish::error::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export CATCH_EMAIL_USER=catch@example.com");
        eprintln!("  export CATCH_EMAIL_PASS=...");
        std::process::exit(1);
    });

    eprintln!("🎣 catch-that-phish v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mailbox: {} @ {}:{}", config.mail.username, config.mail.imap_host, config.mail.imap_port);
    eprintln!("   Replies: {} via {}:{}", config.mail.from_address, config.mail.smtp_host, config.mail.smtp_port);
    eprintln!("   Poll interval: {}s", config.mail.poll_interval.as_secs());
    eprintln!("   Classify API: http://0.0.0.0:{}/classify\n", config.http_port);

    // Loaded once, shared read-only by the poller and the HTTP handlers.
    let classifier = load_classifier(&config.model)?;

    // ── Inbox poller ────────────────────────────────────────────────────
    let connector = Arc::new(ImapConnector::new(config.mail.clone())?);
    let transport = Arc::new(SmtpReplyTransport::new(&config.mail)?);
    let poller = Arc::new(InboxPoller::new(
        connector,
        Arc::clone(&classifier),
        ReplyComposer::new(config.mail.from_address.clone()),
        transport,
    ));
    let (_poll_handle, _poll_shutdown) = spawn_poll_scheduler(poller, config.mail.poll_interval);

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = classify_routes(classifier);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!(port = config.http_port, "Classification server started");
    axum::serve(listener, app).await?;

    Ok(())
}
