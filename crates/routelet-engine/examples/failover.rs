//! Select/report-failure loop against a local instance pool.
//!
//! Run with: cargo run -p routelet-engine --example failover

use routelet_core::{BlacklistConfig, EngineConfig, LoadBalanceStrategy, ServiceInstance};
use routelet_engine::SelectionEngine;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,routelet_engine=debug".into()),
        )
        .init();

    let engine = SelectionEngine::new(EngineConfig {
        blacklist: BlacklistConfig {
            ttl_seconds: 5.0,
            probe_interval_secs: 1.0,
            connection_timeout_secs: 0.5,
        },
        default_strategy: LoadBalanceStrategy::RoundRobin,
    })?;

    let instances = vec![
        ServiceInstance::new("user-service", "127.0.0.1", 18080),
        ServiceInstance::new("user-service", "127.0.0.1", 18081).with_weight(2.0),
        ServiceInstance::new("user-service", "127.0.0.1", 18082),
    ];

    // Pretend the second instance stopped accepting connections
    engine.report_failure("127.0.0.1", 18081, "connection refused").await;

    for _ in 0..6 {
        let picked = engine.select(&instances, "user-service", None).await?;
        println!("routing to {}", picked.url());
    }

    println!(
        "blacklist: {}",
        serde_json::to_string_pretty(&engine.blacklist().snapshot().await)?
    );

    // Let a probe cycle run, then shut down cleanly
    tokio::time::sleep(Duration::from_secs(2)).await;
    engine.stop().await;
    Ok(())
}
