use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tokio::time::interval;
use tracing::{debug, info, warn};

use slv_leads::server::{build_router, AccessPolicy, RateLimiter, ServeState};
use slv_leads::store::{ConnectionCache, InMemoryLeadStore, LeadStore, MongoLeadStore};
use slv_leads::ServiceConfig;

#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind (overrides BIND_ADDR)
    #[arg(long = "bind", value_name = "IP")]
    pub bind: Option<IpAddr>,

    /// Keep leads in process memory instead of MongoDB (local testing only)
    #[arg(long = "in-memory")]
    pub in_memory: bool,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
    }
}

pub async fn cmd_serve(args: ServeArgs, mut config: ServiceConfig) -> Result<()> {
    args.apply(&mut config);

    let store = build_store(&args, &config);
    let access = AccessPolicy::new(config.cors_origins.iter());
    if access.allowed_origins().is_empty() {
        warn!("CORS_ORIGINS is empty; browser requests from any origin will be denied");
    } else {
        info!(origins = ?access.allowed_origins(), "CORS allow-list active");
    }

    let state = ServeState::new(store, access, config.trust_proxy_hops);
    for limiter in state.limiters() {
        spawn_rate_limit_cleanup(
            limiter,
            config.rate_limit_bucket_ttl,
            config.rate_limit_gc_interval,
        );
    }
    let router = build_router(state);

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind lead server on {}", addr))?;
    info!(
        %addr,
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        built = env!("BUILD_DATE"),
        trusted_hops = config.trust_proxy_hops,
        "Lead server listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("lead server exited unexpectedly")?;

    info!("Lead server stopped");
    Ok(())
}

fn build_store(args: &ServeArgs, config: &ServiceConfig) -> Arc<dyn LeadStore> {
    if args.in_memory {
        warn!("Using in-memory lead store; submissions are lost on restart");
        return Arc::new(InMemoryLeadStore::new());
    }

    if config.mongo_uri.is_none() {
        warn!("MONGO_URI is not set; lead endpoints will fail until it is configured");
    }
    let cache = Arc::new(ConnectionCache::from_config(config));
    info!(
        db = cache.db_name(),
        max_pool_size = config.max_pool_size,
        "MongoDB lead store configured"
    );
    Arc::new(MongoLeadStore::new(cache))
}

fn spawn_rate_limit_cleanup(rate_limiter: Arc<RateLimiter>, ttl: Duration, every: Duration) {
    let kind = rate_limiter.kind();
    if ttl.is_zero() {
        info!(?kind, "Rate limiter window GC disabled (ttl=0)");
        return;
    }
    info!(
        ?kind,
        ttl_secs = ttl.as_secs(),
        interval_secs = every.as_secs(),
        "Rate limiter GC enabled"
    );
    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            let removed = rate_limiter.prune_idle(ttl);
            if removed > 0 {
                debug!(?kind, removed, "Pruned stale rate limit windows");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
