//! The `worker` command.

use darkroom::{
    ConnectionSupervisor, DarkroomResult, MetadataAccessor, PhotoCatalog, RasterCodec,
    RedisConnector, ScratchDir, VariantDeriver, WorkerConfig, open_store,
};
use std::sync::Arc;

/// Run the derivation worker until Ctrl-C.
pub async fn work(config: &WorkerConfig) -> DarkroomResult<()> {
    let store = open_store(&config.storage).await?;
    let catalog: Arc<dyn MetadataAccessor> = Arc::new(PhotoCatalog::new(Arc::clone(&store)));
    let deriver = VariantDeriver::new(
        store,
        catalog,
        RasterCodec::new(),
        ScratchDir::new(&config.derivation.scratch_dir)?,
    )
    .with_policy(config.encode_policy())
    .with_failure_policy(config.derivation.failure_policy);

    let connector = RedisConnector::new(config.redis_streams())?;
    let mut supervisor = ConnectionSupervisor::new(connector, config.supervisor()?);

    tracing::info!(
        queue = %config.broker.queue,
        failure_policy = %config.derivation.failure_policy,
        "Worker starting"
    );
    supervisor
        .run(&deriver, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await;

    let stats = supervisor.stats();
    tracing::info!(
        connections = stats.connections(),
        faults = stats.faults(),
        acknowledged = stats.acknowledged(),
        dead_lettered = stats.dead_lettered(),
        "Worker stopped"
    );
    Ok(())
}
