use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use chatstatus::{
    Config, ExecutorPool, Gateway, StartupError, StatusService, Stores, heartbeat, server,
};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "chatstatus";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

// Not `#[tokio::main]`: the blocking Postgres client refuses to run inside a
// runtime, so the pools are built before any runtime exists.
fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{APP_NAME} failed: {e}");
            ExitCode::FAILURE
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(config.log_level.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

fn run(config: Config) -> Result<(), StartupError> {
    let stores = Arc::new(Stores::connect(&config.postgres, &config.redis)?);
    let gateway = Arc::new(Gateway::from_entries(&config.chat_servers)?);
    let contexts = Arc::new(ExecutorPool::new(config.workers)?);
    let shutdown = CancellationToken::new();

    contexts.next().spawn(heartbeat::run(
        config.heartbeat_interval,
        Arc::clone(&gateway),
        Arc::clone(&stores),
        shutdown.clone(),
    ))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    let service = StatusService::new(Arc::clone(&gateway));
    let served = runtime.block_on(listen(
        &config,
        Arc::clone(&contexts),
        service,
        shutdown.clone(),
    ));

    // === Phase 1: Stop background tasks ===
    shutdown.cancel();

    // === Phase 2: Stop execution contexts ===
    contexts.stop();

    // === Phase 3: Close backend pools ===
    stores.close();

    drop(runtime);
    info!("{APP_NAME} stopped");

    served
}

async fn listen(
    config: &Config,
    contexts: Arc<ExecutorPool>,
    service: StatusService,
    shutdown: CancellationToken,
) -> Result<(), StartupError> {
    let listener = server::bind(config.listen_addr).map_err(|source| StartupError::Bind {
        addr: config.listen_addr,
        source,
    })?;

    info!("{APP_NAME} listening on {}", config.listen_addr);

    let stop = async move {
        tokio::select! {
            _ = signal::ctrl_c() => info!("{APP_NAME} shutting down"),
            _ = shutdown.cancelled() => {}
        }
    };

    server::serve(listener, contexts, service, stop).await?;
    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
