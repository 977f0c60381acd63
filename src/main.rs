//! Standalone authorization server binary.
//!
//! This is a thin host around the [`authkeep`] library: parse CLI args,
//! load configuration, bootstrap the token/key/store stack, and serve the
//! router over HTTP. Embedders that want the core without the standalone
//! process should depend on the library directly and call
//! [`authkeep::bootstrap`] themselves.
//!
//! # Application Lifecycle
//!
//! 1. **Unknown** -> parse CLI args
//! 2. **Initializing** -> load configuration
//! 3. **StartingNetwork** -> generate/rotate signing keys, bind the listener
//! 4. **Ready** -> serving requests
//! 5. **Terminating** -> shutting down

use authkeep::config::AuthServerConfig;
use clap::{CommandFactory, FromArgMatches, Parser};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

/// Layer that filters out specific noisy log lines.
struct FilteringLayer<L> {
    inner: L,
}

impl<L, S> Layer<S> for FilteringLayer<L>
where
    L: Layer<S>,
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);
        if event.metadata().level() == &tracing::Level::ERROR
            && visitor.message.contains("Error reading from stream")
        {
            return;
        }
        self.inner.on_event(event, ctx);
    }

    fn enabled(
        &self,
        metadata: &tracing::Metadata<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        self.inner.enabled(metadata, ctx)
    }

    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.inner.on_new_span(attrs, id, ctx);
    }

    fn on_record(
        &self,
        span: &tracing::Id,
        values: &tracing::span::Record<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.inner.on_record(span, values, ctx);
    }

    fn on_enter(&self, id: &tracing::Id, ctx: tracing_subscriber::layer::Context<'_, S>) {
        self.inner.on_enter(id, ctx);
    }

    fn on_exit(&self, id: &tracing::Id, ctx: tracing_subscriber::layer::Context<'_, S>) {
        self.inner.on_exit(id, ctx);
    }

    fn on_close(&self, id: tracing::Id, ctx: tracing_subscriber::layer::Context<'_, S>) {
        self.inner.on_close(id, ctx);
    }
}

struct MessageVisitor {
    message: String,
}

impl MessageVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

/// CLI arguments for the standalone authorization server binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "authkeep", version, about = "Embeddable OAuth2/OIDC authorization server", long_about = None)]
struct Args {
    /// Config file path (overrides default path and AUTHKEEP_CONFIG_PATH)
    #[arg(long = "config-file", value_name = "FILE", env = "AUTHKEEP_CONFIG_PATH")]
    config_file: Option<std::path::PathBuf>,

    /// HTTP bind address override (optional)
    #[arg(long = "bind-address", value_name = "BIND_ADDRESS", env = "AUTHKEEP_BIND_ADDRESS")]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).expect("invalid args");

    let env_filter = if let Ok(v) = std::env::var("RUST_LOG") {
        format!("{},log=warn", v)
    } else {
        "info,log=warn".to_string()
    };
    let fmt_layer = fmt::layer().with_target(false).compact();
    let filtering_layer = FilteringLayer { inner: fmt_layer };
    tracing_subscriber::registry()
        .with(filtering_layer)
        .with(tracing_subscriber::filter::EnvFilter::new(env_filter))
        .init();

    let mut config = AuthServerConfig::load(args.config_file.clone())?;
    if let Some(bind_address) = args.bind_address.clone() {
        config.bind_address = bind_address;
    }
    tracing::debug!("configuration loaded, issuer={}", config.issuer);

    let bind_address = config.bind_address.clone();
    let server = authkeep::bootstrap(config).await?;
    tracing::info!("signing key ready, kid={:?}", server.state.keys.active_kid().await);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("listening on {bind_address}");

    axum::serve(
        listener,
        server.router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
