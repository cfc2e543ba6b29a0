mod config;
mod host;
mod source;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use vigia_alarm::actor::MutationActor;
use vigia_alarm::engine::Evaluator;
use vigia_alarm::lifecycle::{BackgroundHost, LifecyclePolicy};
use vigia_alarm::MetricSource;
use vigia_common::types::{CompareOp, Metric, Rule};
use vigia_notify::channels::log::LogChannel;
use vigia_notify::channels::sms::SmsGatewayChannel;
use vigia_notify::NotificationSink;
use vigia_store::RuleStore;

use crate::config::ServiceConfig;
use crate::host::EvalLoopHost;
use crate::source::InfluxMetricSource;

const DEFAULT_CONFIG_PATH: &str = "config/vigia.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vigia-service [config.toml]                                Run the monitoring service");
    eprintln!("  vigia-service add-rule <metric> <op> <threshold> [config.toml]");
    eprintln!("  vigia-service list-rules [config.toml]");
    eprintln!("  vigia-service remove-rule <id> [config.toml]");
    eprintln!("  vigia-service enable-rule <id> [config.toml]");
    eprintln!("  vigia-service disable-rule <id> [config.toml]");
    eprintln!();
    eprintln!("Metrics: f_index, temperature, humidity, wind_speed");
    eprintln!("Operators: gte, lte, eq");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vigia=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("add-rule") => {
            let (Some(metric), Some(op), Some(threshold)) =
                (args.get(2), args.get(3), args.get(4))
            else {
                print_usage();
                anyhow::bail!("add-rule requires <metric> <op> <threshold>");
            };
            let metric: Metric = metric.parse().map_err(anyhow::Error::msg)?;
            let operator: CompareOp = op.parse().map_err(anyhow::Error::msg)?;
            let threshold: f64 = threshold.parse()?;
            run_edit(args.get(5).map(String::as_str), move |actor| {
                actor.create(Rule::new(metric, operator, threshold));
            })
            .await
        }
        Some("list-rules") => run_list(args.get(2).map(String::as_str)),
        Some("remove-rule") => {
            let id = parse_id(args.get(2))?;
            run_edit(args.get(3).map(String::as_str), move |actor| actor.remove(id)).await
        }
        Some("enable-rule") => {
            let id = parse_id(args.get(2))?;
            run_edit(args.get(3).map(String::as_str), move |actor| {
                actor.set_enabled(id, true);
            })
            .await
        }
        Some("disable-rule") => {
            let id = parse_id(args.get(2))?;
            run_edit(args.get(3).map(String::as_str), move |actor| {
                actor.set_enabled(id, false);
            })
            .await
        }
        Some("help" | "--help" | "-h") => {
            print_usage();
            Ok(())
        }
        path => run_service(path).await,
    }
}

fn parse_id(arg: Option<&String>) -> Result<i64> {
    let Some(arg) = arg else {
        print_usage();
        anyhow::bail!("missing rule id");
    };
    arg.parse()
        .map_err(|_| anyhow::anyhow!("invalid rule id: {arg}"))
}

fn load_config(path: Option<&str>) -> Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load(path),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            ServiceConfig::load(DEFAULT_CONFIG_PATH)
        }
        None => Ok(ServiceConfig::default()),
    }
}

fn build_engine(config: &ServiceConfig) -> Result<(Arc<RuleStore>, Arc<Evaluator>)> {
    let store = Arc::new(RuleStore::open(&config.rules_path));
    let source: Arc<dyn MetricSource> = Arc::new(InfluxMetricSource::new(
        &config.source.influx_url,
        &config.source.database,
        Duration::from_secs(config.source.timeout_secs),
    )?);
    let sink: Arc<dyn NotificationSink> = match &config.sms {
        Some(sms) => {
            tracing::info!(gateway = %sms.gateway_url, recipients = sms.phone_numbers.len(), "SMS delivery enabled");
            Arc::new(SmsGatewayChannel::new(
                &sms.gateway_url,
                &sms.api_key,
                sms.phone_numbers.clone(),
            ))
        }
        None => {
            tracing::info!("no SMS gateway configured, alarms go to the log");
            Arc::new(LogChannel)
        }
    };
    let evaluator = Arc::new(Evaluator::new(
        store.clone(),
        source,
        sink,
        Duration::from_secs(config.evaluation.window_secs),
        Duration::from_secs(config.evaluation.cooldown_secs),
    ));
    Ok((store, evaluator))
}

async fn run_service(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let (store, evaluator) = build_engine(&config)?;

    let host: Arc<dyn BackgroundHost> = Arc::new(EvalLoopHost::new(
        evaluator,
        Duration::from_secs(config.evaluation.period_secs),
        Duration::from_secs(config.evaluation.phase_offset_secs),
    ));

    // Boot/resume hook: pick the evaluation loop back up if any rule was
    // armed when the process last went down.
    let armed = store.read().iter().any(|r| r.enabled);
    if armed {
        host.start().await;
    }

    let policy = LifecyclePolicy::new(
        host.clone(),
        Duration::from_millis(config.evaluation.debounce_ms),
        Some(armed),
    );
    let _policy_task = policy.spawn(store.changes());

    tracing::info!(
        rules_path = %config.rules_path,
        armed,
        period_secs = config.evaluation.period_secs,
        "vigia service started"
    );

    signal::ctrl_c().await?;
    tracing::info!("interrupted, shutting down");
    host.stop().await;
    Ok(())
}

/// Routes one edit through the mutation actor, waits for the queue to
/// drain, then prints the resulting list.
async fn run_edit<F>(config_path: Option<&str>, edit: F) -> Result<()>
where
    F: FnOnce(&MutationActor),
{
    let config = load_config(config_path)?;
    let (store, evaluator) = build_engine(&config)?;
    let (actor, task) = MutationActor::spawn(store.clone(), evaluator);
    edit(&actor);
    drop(actor);
    task.await?;
    print_rules(&store.read());
    Ok(())
}

fn run_list(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = RuleStore::open(&config.rules_path);
    print_rules(&store.read());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_rules(rules: &[Rule]) {
    if rules.is_empty() {
        println!("no rules");
        return;
    }
    for rule in rules {
        let status = if rule.enabled { "armed" } else { "disarmed" };
        println!("{:>15}  {:<8}  {}", rule.id, status, rule.describe());
    }
}
