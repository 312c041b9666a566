//! Standalone server exposing the demo `Books` resource.
//!
//! ```text
//! test-server --port 8080
//! curl -X POST localhost:8080/api/Books/checkout -d '{"title":"Dune"}'
//! curl localhost:8080/api/Books/1/archive
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hyperroute_server::demo::{self, Library};
use hyperroute_server::network::{NetworkConfig, NetworkModule};
use hyperroute_server::service::{
    BackgroundWorker, DispatchConfig, DuplicatePolicy, OperationDispatcher, RegistrationRunnable,
    RouterEvent, RouterRegistry, ServiceContext, ServiceRegistry,
};
use hyperroute_server::telemetry::{init_tracing, LogFormat};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "test-server", about = "Hyperroute dispatch server with a demo resource")]
struct Args {
    #[arg(long, env = "HYPERROUTE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// 0 picks an ephemeral port.
    #[arg(long, env = "HYPERROUTE_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "HYPERROUTE_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    #[arg(long, env = "HYPERROUTE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "HYPERROUTE_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    drain_timeout_secs: u64,

    #[arg(long, env = "HYPERROUTE_DUPLICATE_POLICY", value_enum, default_value_t = DuplicatePolicy::Reject)]
    duplicate_policy: DuplicatePolicy,

    #[arg(long, env = "HYPERROUTE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl Args {
    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        }
    }

    fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            duplicate_policy: self.duplicate_policy,
            ..DispatchConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format, "info")?;

    let dispatch_config = args.dispatch_config();
    let collaborators = demo::collaborators();
    let registry = Arc::new(
        RouterRegistry::new(
            collaborators.name_registry(),
            collaborators.identifier_mapper(),
            collaborators.provider_manager(),
        )
        .with_config(&dispatch_config),
    );

    let services = ServiceRegistry::new();
    services.register_shared(Arc::clone(&registry));
    services
        .init_all(&ServiceContext {
            config: Arc::new(dispatch_config.clone()),
        })
        .await?;

    let mut worker = BackgroundWorker::start_with_capacity(
        RegistrationRunnable::new(Arc::clone(&registry)),
        dispatch_config.registry_report_interval_ms,
        dispatch_config.registration_channel_capacity,
    );
    worker
        .submit(RouterEvent::Registered(demo::descriptor(Arc::new(
            Library::seeded(),
        ))))
        .await?;

    let mut network = NetworkModule::new(
        args.network_config(),
        Arc::new(OperationDispatcher::new(Arc::clone(&registry))),
        collaborators.representor(),
    );
    let port = network.start().await?;
    info!(port, "test-server listening");

    network
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    worker.stop().await;
    services.shutdown_all(false).await?;
    info!("test-server stopped");
    Ok(())
}
