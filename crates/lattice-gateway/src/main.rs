use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use lattice_gateway::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lattice_gateway=info,tower_http=debug".into()),
        )
        .init();

    // Config: explicit LATTICE_CONFIG path > ~/.lattice/lattice.toml > defaults.
    let config_path = std::env::var("LATTICE_CONFIG").ok();
    let config = lattice_core::config::LatticeConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("config load failed ({e}), using defaults");
            lattice_core::config::LatticeConfig::default()
        });

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Startup order: store, coordination store, broker, LLM registry.
    // Teardown runs in reverse on shutdown.
    let store = lattice_store::Store::open(&config.database.path)?;
    let coord = Arc::new(lattice_coord::CoordStore::new());
    let mut broker = lattice_mq::Broker::open(&config.database.path, config.broker.clone())?;
    let llm = Arc::new(lattice_llm::ProviderRegistry::from_config(&config.llm));

    let deps = lattice_agent::Deps {
        config: Arc::new(config.clone()),
        store,
        coord,
        broker: broker.handle(),
        llm,
    };

    lattice_agent::pipeline::register(&mut broker, deps.clone());
    lattice_learner::register(&mut broker, deps.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let broker_task = tokio::spawn(broker.run(shutdown_rx));

    // Periodic sweep of expired coordination keys. Correctness never
    // depends on it; it only bounds memory on long-idle key sets.
    let sweeper = deps.coord.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            sweeper.purge_expired();
        }
    });

    let state = Arc::new(app::AppState::new(deps));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("lattice gateway listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Reverse-order teardown: stop the broker after the HTTP surface quiesces.
    let _ = shutdown_tx.send(true);
    let _ = broker_task.await;
    Ok(())
}
