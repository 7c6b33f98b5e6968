// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod heartbeat;
pub mod logging;
pub mod manager;
pub mod plan;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::manager::DeploymentManager;
use crate::plan::{ContainerAssignment, PropertyPartitionResolver};
use crate::transport::{spawn_local_containers, ChannelBackend, LocalContainerOptions};

pub use crate::manager::PlannerConfig;

/// High-level entry point used by `main.rs`.
///
/// Loads the topology, plans it and deploys it onto simulated containers,
/// then prints every assignment.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading topology from {}", args.config))?;
    let graph = cfg.to_graph()?;
    let manager = Arc::new(DeploymentManager::new(
        graph,
        &PropertyPartitionResolver,
        cfg.planner_config(),
    ));

    let required = manager.required_container_count();
    info!(required, "containers required for deployment");

    if args.dry_run {
        print_dry_run(&manager);
        return Ok(());
    }

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let (container_tx, containers) = spawn_local_containers(
        LocalContainerOptions {
            count: required,
            buffer_host: args.buffer_host.clone(),
            base_port: args.base_port,
            heartbeat_interval: Duration::from_millis(manager.window().size_millis),
        },
        rt_tx,
    );

    let core = CoreRuntime::new(
        Arc::clone(&manager),
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    let runtime = Runtime::new(core, rt_rx, ChannelBackend::new(container_tx));
    runtime.run().await?;
    containers.await.context("local container task panicked")?;

    for container_id in manager.assigned_containers() {
        let assignment = manager.assignment(&container_id)?;
        print_assignment(&assignment);
    }

    let remaining = manager.required_container_count();
    if remaining > 0 {
        anyhow::bail!("deployment incomplete: {remaining} more container(s) needed");
    }
    debug!("deployment complete");
    Ok(())
}

fn print_dry_run(manager: &DeploymentManager) {
    let graph = manager.graph();
    println!("streamplan dry-run");
    println!("  window_size_millis = {}", manager.window().size_millis);
    println!(
        "  required containers = {}",
        manager.required_container_count()
    );
    println!();

    let groups = manager.groups();
    println!("deployment groups ({}):", groups.len());
    for group in &groups {
        println!("  - {}", group.names(graph).join(", "));
    }
}

fn print_assignment(assignment: &ContainerAssignment) {
    println!(
        "{} (window {} ms from {})",
        assignment.container_id, assignment.window_size_millis, assignment.window_start_millis
    );
    for op in &assignment.operators {
        match &op.partition {
            Some(key) => println!("  operator {} {} [partition {}]", op.id, op.logical_name, key),
            None => println!("  operator {} {}", op.id, op.logical_name),
        }
    }
    for stream in &assignment.streams {
        println!(
            "  stream {} {} -> {}{} via {}",
            stream.name,
            stream.source,
            stream.target,
            if stream.inline { " (inline)" } else { "" },
            stream.buffer_server
        );
    }
}
