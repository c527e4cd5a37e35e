use clap::Parser;
use dcron_node::cli::Cli;
use dcron_node::http::AppState;
use dcron_node::{config, http, metrics, startup, wiring};
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    startup::init_logging();

    info!("Starting dcron-node...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = run().await {
        error!("node error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut node_config = config::load(&cli.config_dir)?;

    if let Some(name) = cli.name {
        node_config.name = name;
    }

    startup::prepare_data_dir(&node_config.instance_dir())?;

    if !node_config.dns_cluster.is_empty() {
        discover_cluster(&node_config).await;
    }

    let prometheus = metrics::install_recorder();
    let node = wiring::build(&node_config, prometheus.clone());

    let listen_addr = dcron_discovery::bind_all_rewrite(&node_config.api_addr, node_config.bind_all);

    // Offset by one from the runner's own cluster id (see `wiring::build`):
    // both generators seed from the same node name, and two generators with
    // an identical seed would mint colliding tokens in the shared waiter
    // registry since each starts its own counter at zero.
    let state = AppState::new(
        node_config.name.clone(),
        node_config.server_url.clone(),
        node_config.client_port,
        node.log.clone(),
        node.applier.clone(),
        node.waiters.clone(),
        seed_cluster_id(&node_config.name).wrapping_add(1),
        node_config.election_ms,
        prometheus,
    );

    let router = http::create_router(state);

    info!("Listening on http://{}", listen_addr);
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(startup::shutdown_signal())
        .await?;

    node.scheduler.stop().await;
    info!("dcron-node shutdown complete");
    Ok(())
}

/// DNS-SRV cluster discovery: resolves both the peer (`etcd-server`) and
/// client (`etcd-client`) services, then reconciles this node's membership
/// against the peer endpoints before `wiring::build` starts the log — a
/// stale self from a prior run must be evicted and rejoined before this
/// node begins driving consensus under its old member identity.
async fn discover_cluster(config: &config::NodeConfig) {
    let resolver = dcron_discovery::system_resolver();
    let local_ips = match dcron_discovery::local_interface_ips() {
        Ok(ips) => ips,
        Err(err) => {
            warn!(error = %err, "could not enumerate local interfaces, skipping discovery");
            return;
        }
    };

    let configured_port = config
        .server_url
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .unwrap_or(0);

    let peers = match dcron_discovery::resolve_service(
        &resolver,
        "etcd-server",
        &config.dns_cluster,
        configured_port,
        &local_ips,
    )
    .await
    {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!(error = %err, "DNS-SRV peer resolution failed");
            return;
        }
    };

    match dcron_discovery::resolve_service(
        &resolver,
        "etcd-client",
        &config.dns_cluster,
        config.client_port,
        &local_ips,
    )
    .await
    {
        Ok(resolved) => info!(clients = resolved.records.len(), "resolved client service via DNS-SRV"),
        Err(err) => warn!(error = %err, "DNS-SRV client resolution failed"),
    }

    let self_endpoint = peers.matched.endpoint();
    let endpoints: Vec<String> = peers
        .records
        .iter()
        .map(|r| r.endpoint())
        .filter(|e| *e != self_endpoint)
        .collect();

    let connector = UnavailableClusterConnector;
    match dcron_discovery::reconcile_membership(
        &connector,
        &endpoints,
        Duration::from_millis(config.election_ms * 3),
        &config.name,
        &self_endpoint,
    )
    .await
    {
        Ok(state) => info!(?state, peers = endpoints.len(), "cluster membership reconciled"),
        Err(err) => warn!(error = %err, "membership reconciliation failed"),
    }
}

/// No concrete admin-API client for the consensus engine exists upstream,
/// same gap `wiring::TracingStorage`/`LoggingExecutor` fill on the
/// job-execution side. Connecting always reports no cluster reachable,
/// which `reconcile_membership` reads as a fresh bootstrap.
struct UnavailableClusterConnector;

#[async_trait::async_trait]
impl dcron_discovery::ClusterConnector for UnavailableClusterConnector {
    async fn connect(
        &self,
        _endpoints: &[String],
        _dial_timeout: Duration,
    ) -> dcron_core::DcronResult<Box<dyn dcron_discovery::MembershipClient>> {
        Err(dcron_core::DcronError::Internal(
            "no consensus engine admin client configured".into(),
        ))
    }
}

fn seed_cluster_id(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
