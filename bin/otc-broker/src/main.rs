//! Wires configuration, storage, chain plugins, the engine, and the
//! JSON-RPC surface together, then runs the tick loop until asked to
//! stop.

use clap::Parser;
use eyre::WrapErr;
use jsonrpsee::server::Server;
use otc_chain_api::memory::MemoryChainPlugin;
use otc_chain_api::ChainPlugin;
use otc_config::Config;
use otc_engine::{Engine, EngineConfig};
use otc_registry::{AssetInfo, AssetRegistry};
use otc_rpc::{OtcRpcApiServer, RpcConfig, RpcServerImpl};
use otc_store::RocksStore;
use otc_watcher::Watcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The chain plugins this binary knows how to construct on its own.
///
/// Real deployments supply production adapters (spec.md §1 names the
/// plugin implementations themselves as external collaborators); this
/// binary only wires the in-memory fake, configured per chain named
/// by `--operator-address`, so the broker is runnable standalone.
fn build_plugins(config: &Config) -> HashMap<String, Arc<dyn ChainPlugin>> {
    config
        .operator_addresses()
        .keys()
        .map(|chain_id| {
            let plugin: Arc<dyn ChainPlugin> = Arc::new(MemoryChainPlugin::new(chain_id.clone(), 1));
            (chain_id.clone(), plugin)
        })
        .collect()
}

fn build_registry(plugins: &HashMap<String, Arc<dyn ChainPlugin>>) -> AssetRegistry {
    let mut registry = AssetRegistry::new();
    for chain_id in plugins.keys() {
        registry.register(AssetInfo {
            chain_id: chain_id.clone(),
            asset_code: chain_id.clone(),
            decimals: 18,
            is_native: true,
        });
    }
    registry
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    otc_tracing::init();

    let config = Config::parse();
    std::fs::create_dir_all(&config.data_dir)
        .wrap_err_with(|| format!("creating data dir {}", config.data_dir.display()))?;

    let store: Arc<dyn otc_store::Store> =
        Arc::new(RocksStore::open(&config.data_dir).wrap_err("opening rocksdb store")?);

    let plugins = build_plugins(&config);
    let registry = Arc::new(build_registry(&plugins));

    let watchers = plugins
        .iter()
        .map(|(chain_id, plugin)| {
            (chain_id.clone(), Arc::new(Watcher::new(plugin.clone(), store.clone())))
        })
        .collect();

    let engine = Arc::new(Engine::new(
        store,
        registry,
        plugins,
        watchers,
        EngineConfig {
            max_attempts_per_item: config.max_attempts_per_item,
            operator_addresses: config.operator_addresses(),
        },
    ));

    let shutdown = CancellationToken::new();

    let rpc_handle = {
        let server = Server::builder()
            .build(format!("0.0.0.0:{}", config.port))
            .await
            .wrap_err("binding JSON-RPC server")?;
        let addr = server.local_addr().wrap_err("reading bound address")?;
        let module = RpcServerImpl::new(engine.clone(), RpcConfig { base_url: config.base_url.clone() })
            .into_rpc();
        info!(%addr, "JSON-RPC server listening");
        server.start(module)
    };

    let tick_task = {
        let engine = engine.clone();
        let shutdown = shutdown.clone();
        let interval = config.tick_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = engine.tick().await {
                            tracing::warn!(%err, "engine tick failed");
                        }
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received ctrl-c, shutting down"),
        _ = rpc_handle.clone().stopped() => info!("rpc server stopped"),
    }

    shutdown.cancel();
    let _ = tick_task.await;
    let _ = rpc_handle.stop();

    Ok(())
}
