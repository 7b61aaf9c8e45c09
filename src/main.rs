use axum::{
    Router,
    extract::Extension,
    routing::{delete, get, post, put},
};
use clap::Parser;
use federated_routing::config::{
    Cli, CommonArgs, ManagerArgs, Role, RouterArgs, SeedArgs, WorkerArgs,
};
use federated_routing::http::PeerClient;
use federated_routing::lease::client::{HttpLeaseSource, LeaseClient};
use federated_routing::lease::coordinator::LeaseCoordinator;
use federated_routing::lease::handlers::{handle_get_holder, handle_lease, handle_list_shards};
use federated_routing::lease::store::MemoryCoordinationStore;
use federated_routing::netgen::generate_network;
use federated_routing::router::client::HttpShardClient;
use federated_routing::router::federation::FederatedRouter;
use federated_routing::router::handlers as router_handlers;
use federated_routing::shard::handlers as shard_handlers;
use federated_routing::shard::service::ShardGraphService;
use federated_routing::snapshot::layout::discover_shards;
use federated_routing::snapshot::store::{BlobStore, FsBlobStore, MemoryBlobStore};
use federated_routing::snapshot::versioned::VersionedSnapshotStore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let blobs: Arc<dyn BlobStore> = match &cli.common.blob_dir {
        Some(dir) => {
            tracing::info!("Snapshot store at {}", dir.display());
            Arc::new(FsBlobStore::new(dir.clone()))
        }
        None => {
            tracing::warn!("No --blob-dir given, snapshots live in memory only");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match cli.role {
        Role::Manager(args) => run_manager(&cli.common, args, blobs, cancel).await,
        Role::Worker(args) => run_worker(&cli.common, args, blobs, cancel).await,
        Role::Router(args) => run_router(&cli.common, args, blobs, cancel).await,
        Role::Seed(args) => run_seed(args, blobs).await,
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    tracing::info!("Shutting down");
    cancel.cancel();
}

async fn serve(common: &CommonArgs, app: Router, cancel: CancellationToken) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", common.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(common.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}

async fn run_manager(
    common: &CommonArgs,
    args: ManagerArgs,
    blobs: Arc<dyn BlobStore>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    // 1. Shards: discovered from the snapshot store plus any named explicitly.
    let mut shards: BTreeSet<String> = discover_shards(blobs.as_ref()).await?.into_iter().collect();
    shards.extend(args.shards.iter().filter(|s| !s.is_empty()).cloned());
    if shards.is_empty() {
        tracing::warn!("No shards found; workers will never be granted a lease");
    }

    // 2. Coordination store and coordinator:
    let store = Arc::new(MemoryCoordinationStore::new());
    let coordinator = Arc::new(LeaseCoordinator::new(
        store.clone(),
        shards.into_iter().collect(),
        args.lease_duration(),
    ));

    // 3. Housekeeping for expired entries:
    let purge_cancel = cancel.clone();
    let purge_every = args.lease_duration().max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            tokio::select! {
                _ = purge_cancel.cancelled() => break,
                _ = interval.tick() => store.purge_expired(),
            }
        }
    });

    // 4. HTTP Router:
    let app = Router::new()
        .route("/lease", post(handle_lease))
        .route("/shards", get(handle_list_shards))
        .route("/holder/:shard", get(handle_get_holder))
        .layer(Extension(coordinator));

    serve(common, app, cancel).await
}

async fn run_worker(
    common: &CommonArgs,
    args: WorkerArgs,
    blobs: Arc<dyn BlobStore>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let identity = args.identity(common.bind);
    tracing::info!("Worker identity {} (manager {})", identity, args.manager);

    // 1. Shard service, fed by lease events:
    let service = ShardGraphService::new(VersionedSnapshotStore::new(blobs));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(service.clone().follow_leases(events_rx));

    // 2. Lease loop, on its own task so request load never delays renewals:
    let peers = PeerClient::new(common.request_timeout());
    let source = Arc::new(HttpLeaseSource::new(peers, args.manager.clone()));
    let lease_client = LeaseClient::new(source, identity, args.retry_backoff());
    let lease_handle = tokio::spawn(lease_client.run(events_tx, cancel.clone()));

    // 3. HTTP Router:
    let app = Router::new()
        .route("/status", get(shard_handlers::handle_status))
        .route("/passthrough/:last_token", get(shard_handlers::handle_passthrough))
        .route("/internal_connection/:n1/:n2", get(shard_handlers::handle_internal_connection))
        .route("/distances/:n1", get(shard_handlers::handle_distances))
        .route("/add_node/:node/:role", put(shard_handlers::handle_add_node))
        .route("/add_edge/:n1/:n2/:length", put(shard_handlers::handle_add_edge))
        .route("/delete_edge/:edge_id", delete(shard_handlers::handle_delete_edge))
        .route("/set_node_role/:node/:role", put(shard_handlers::handle_set_node_role))
        .layer(Extension(service));

    serve(common, app, cancel).await?;
    lease_handle.await?;
    Ok(())
}

async fn run_router(
    common: &CommonArgs,
    args: RouterArgs,
    blobs: Arc<dyn BlobStore>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!("Router using manager {}", args.manager);

    let peers = PeerClient::new(common.request_timeout());
    let client = Arc::new(HttpShardClient::new(peers, args.manager));
    let router = FederatedRouter::new(client, VersionedSnapshotStore::new(blobs));

    let app = Router::new()
        .route("/route/:start/:end", get(router_handlers::handle_route))
        .route("/distance/:start/:end", get(router_handlers::handle_distance))
        .route("/add_edge/:n1/:n2/:length", put(router_handlers::handle_add_edge))
        .route("/delete_edge/:edge_id", delete(router_handlers::handle_delete_edge))
        .layer(Extension(router));

    serve(common, app, cancel).await
}

async fn run_seed(args: SeedArgs, blobs: Arc<dyn BlobStore>) -> anyhow::Result<()> {
    let params = args.params()?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let network = generate_network(&params, &mut rng);
    for (shard, topology) in &network.shards {
        tracing::info!(
            "{}: {} node(s), {} edge(s), gateways {:?}",
            shard,
            topology.nodes().len(),
            topology.edges.len(),
            topology.gateways
        );
    }

    network.publish(&VersionedSnapshotStore::new(blobs)).await?;
    Ok(())
}
