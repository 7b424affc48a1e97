// src/lib.rs

pub mod cli;
pub mod config;
pub mod deployer;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod publish;
pub mod scheduler;
pub mod time;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate};
use crate::deployer::InstructionDeployer;
use crate::engine::{PlanRunner, RunOutcome, RunReport};
use crate::exec::ShellExecutor;
use crate::publish::{BroadcastSink, MemoryQueueStore, StatusChanged};
use crate::scheduler::{InstructionScheduler, SchedulerServices};
use crate::time::{Clock, TokioClock, TokioTimer};

const STATUS_LOGGER_GRACE: Duration = Duration::from_millis(200);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - clock, timer, queue store and status broadcast
/// - the instruction scheduler (through the deployer)
/// - the shell executor and plan runner
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunReport> {
    let cfg = load_and_validate(&args.config)?;
    let queue_id = args
        .queue
        .clone()
        .unwrap_or_else(|| cfg.config.instruction_queue_id.clone());

    if args.dry_run {
        print_dry_run(&cfg, &queue_id);
        return Ok(RunReport::default());
    }

    let sink = BroadcastSink::new(cfg.config.notification_capacity);
    let status_logger = tokio::spawn(log_status_changes(sink.subscribe()));

    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let services = SchedulerServices {
        clock: Arc::clone(&clock),
        timer: Arc::new(TokioTimer::current()?),
        store: Arc::new(MemoryQueueStore::new()),
        sink: Arc::new(sink),
    };
    let deployer = InstructionDeployer::new(services);
    let scheduler = deployer.write_configuration(&queue_id);

    // Ctrl-C → cancel everything still cancellable.
    let ctrl_c = tokio::spawn(shutdown_on_ctrl_c(scheduler.clone()));

    let runner = PlanRunner::new(scheduler, clock, Arc::new(ShellExecutor::new()));
    let report = runner.run(cfg.plan()).await;

    ctrl_c.abort();
    deployer.close();

    // The logger ends once the last sink is gone.
    drop(runner);
    drop(deployer);
    match tokio::time::timeout(STATUS_LOGGER_GRACE, status_logger).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "status logger ended abnormally"),
        Err(_) => debug!("status logger still subscribed; detaching it"),
    }

    print_report(&report);
    Ok(report)
}

async fn shutdown_on_ctrl_c(scheduler: InstructionScheduler) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl+C");
        return;
    }
    info!("Ctrl+C received; cancelling pending instructions");
    scheduler.shutdown();
}

async fn log_status_changes(mut rx: broadcast::Receiver<StatusChanged>) {
    loop {
        match rx.recv().await {
            Ok(event) => info!(
                queue = %event.queue,
                instruction = %event.id,
                status = %event.status,
                details = ?event.details,
                "instruction status changed"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "status logger lagging; events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Print the validated plan in submission order.
fn print_dry_run(cfg: &ConfigFile, queue_id: &str) {
    println!("progsched dry-run");
    println!("  queue = {queue_id}");
    println!(
        "  config.notification_capacity = {}",
        cfg.config.notification_capacity
    );
    println!("  default.deadline = {}", cfg.default.deadline);
    println!();

    println!("instructions ({}), in submission order:", cfg.plan().len());
    for planned in cfg.plan() {
        println!("  - {}", planned.id);
        println!("      cmd: {}", planned.cmd);
        println!("      deadline: {:?}", planned.deadline);
        if !planned.after.is_empty() {
            let after: Vec<&str> = planned.after.iter().map(|id| id.as_str()).collect();
            println!("      after: {:?}", after);
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_report(report: &RunReport) {
    println!("instruction outcomes:");
    for (id, outcome) in &report.outcomes {
        match outcome {
            RunOutcome::Rejected(err) => println!("  {id}: rejected ({err})"),
            RunOutcome::NotAdmitted(not_admitted) => {
                println!("  {id}: {} before execution", not_admitted.status);
            }
            RunOutcome::Executed(result) => match &result.details {
                Some(details) if details.message.is_some() || !details.unmet_dependencies.is_empty() => {
                    println!("  {id}: {} ({details:?})", result.status);
                }
                Some(_) | None => println!("  {id}: {}", result.status),
            },
            RunOutcome::Abandoned => println!("  {id}: abandoned"),
        }
    }
    if !report.unflushed.is_empty() {
        println!("left in the graph: {:?}", report.unflushed);
    }
}
