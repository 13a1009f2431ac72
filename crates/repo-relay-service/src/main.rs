//! # Repo-Relay Service
//!
//! Binary entry point for the repo-relay HTTP service.
//!
//! This executable:
//! - Parses command-line flags and loads layered configuration
//! - Initializes logging
//! - Resolves the webhook secret and wires the routing pipeline
//! - Announces itself in the configured conversation
//! - Starts the HTTP server from repo-relay-api

mod cli;
mod keybase;
mod secret_source;

use anyhow::Context;
use clap::Parser;
use cli::{load_config, Cli};
use keybase::KeybaseChatTransport;
use repo_relay_api::{start_server, LoggingConfig, OperatorAlerts, ServiceConfig, ServiceError};
use repo_relay_core::adapters::{FileSubscriptionStore, InMemorySubscriptionStore};
use repo_relay_core::{
    ChatTransport, ConversationId, DirectMessageRedirector, Dispatcher, MessageFormatter,
    SecretValidator, SubscriptionStore,
};
use secret_source::resolve_secret;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ANNOUNCEMENT: &str = "🦜 chirp. chirp.";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config_file.as_deref())
        .and_then(|mut config| cli.apply_overrides(&mut config).map(|()| config))
    {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet
            eprintln!("repo-relay: {e}");
            std::process::exit(3);
        }
    };

    init_logging(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting repo-relay");
    if let Some(path) = &cli.config_file {
        info!(path = %path.display(), "Loaded configuration from explicit path");
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    let (dispatcher, alerts, transport) = match build_pipeline(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to initialize; aborting");
            std::process::exit(3);
        }
    };

    if let Some(conversation) = config.chat.announcement.as_deref() {
        announce(transport.as_ref(), conversation).await;
    }

    if let Err(e) = start_server(config, dispatcher, alerts).await {
        error!(error = %e, "HTTP server stopped");

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    info!("repo-relay stopped");
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the dispatcher and its collaborators from validated configuration.
async fn build_pipeline(
    config: &ServiceConfig,
) -> anyhow::Result<(Arc<Dispatcher>, Option<OperatorAlerts>, Arc<dyn ChatTransport>)> {
    let secret = resolve_secret(config.relay.secret.as_ref())
        .await
        .context("resolving webhook secret")?;

    let store = build_store(config);

    let transport: Arc<dyn ChatTransport> = Arc::new(KeybaseChatTransport::new(
        config.chat.keybase_binary.as_str(),
        config.chat.home_dir.clone(),
    ));

    let redirector = if config.relay.direct_messages {
        let directory = config
            .relay
            .user_directory()
            .context("building user directory")?;
        if directory.is_empty() {
            warn!("Direct messages are enabled but relay.user_map is empty; all events will be broadcast");
        } else {
            info!(users = directory.len(), "Direct messages enabled");
        }
        Some(DirectMessageRedirector::new(
            Arc::new(directory),
            transport.clone(),
        ))
    } else {
        None
    };

    let formatter = MessageFormatter::new(config.relay.gitea_url.as_deref());

    let dispatcher = Arc::new(Dispatcher::new(
        store,
        transport.clone(),
        SecretValidator::new(secret),
        formatter,
        redirector,
    ));

    let alerts = config
        .chat
        .error_report_conversation
        .as_deref()
        .map(ConversationId::new)
        .transpose()
        .context("chat.error_report_conversation")?
        .map(|conversation| OperatorAlerts::new(transport.clone(), conversation));

    Ok((dispatcher, alerts, transport))
}

fn build_store(config: &ServiceConfig) -> Arc<dyn SubscriptionStore> {
    if let Some(path) = &config.subscriptions.file {
        if !config.subscriptions.static_subscriptions.is_empty() {
            warn!("subscriptions.static_subscriptions is ignored when subscriptions.file is set");
        }
        info!(path = %path.display(), "Reading subscriptions from file");
        return Arc::new(FileSubscriptionStore::new(path.clone()));
    }

    let pairs: Vec<_> = config
        .subscriptions
        .static_subscriptions
        .iter()
        .flat_map(|entry| {
            entry
                .conversations
                .iter()
                .map(|conversation| (entry.repository.clone(), conversation.clone()))
        })
        .collect();

    info!(
        subscriptions = pairs.len(),
        "Using static in-memory subscriptions"
    );
    Arc::new(InMemorySubscriptionStore::with_subscriptions(pairs))
}

async fn announce(transport: &dyn ChatTransport, conversation: &str) {
    let conversation = match ConversationId::new(conversation) {
        Ok(conversation) => conversation,
        Err(e) => {
            warn!(error = %e, "Invalid announcement conversation; skipping announcement");
            return;
        }
    };

    match transport.send(&conversation, ANNOUNCEMENT).await {
        Ok(()) => info!(conversation = %conversation, "Startup announcement sent"),
        Err(e) => warn!(conversation = %conversation, error = %e, "Failed to send startup announcement"),
    }
}
