use colored::Colorize;
use odb_broker::BrokerError;
use odb_config::BrokerConfig;
use odb_core::{Classify, RequestContext};

pub async fn instances(config: &BrokerConfig) -> anyhow::Result<()> {
    let broker = super::build_broker(config)?;
    let ctx = super::request_context(config, "instances");

    let instances = broker.instances(&ctx).await?;
    if instances.is_empty() {
        println!("{}", "No service instances".dimmed());
        return Ok(());
    }

    println!("{}", format!("{} service instances:", instances.len()).bold());
    for instance in &instances {
        let plan = config
            .service_catalog
            .find_plan(&instance.plan_unique_id)
            .map(|plan| plan.name.as_str())
            .unwrap_or("(unknown plan)");
        println!("  {} {}", instance.guid.cyan(), plan);
    }
    Ok(())
}

pub async fn orphans(config: &BrokerConfig) -> anyhow::Result<()> {
    let broker = super::build_broker(config)?;
    let ctx = super::request_context(config, "orphan-deployments");

    let orphans = broker.orphan_deployments(&ctx).await?;
    if orphans.is_empty() {
        println!("{}", "✓ No orphan deployments".green());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} orphan deployments:", orphans.len()).yellow().bold()
    );
    for name in &orphans {
        println!("  {}", name);
    }
    Ok(())
}

pub async fn metrics(config: &BrokerConfig, json: bool) -> anyhow::Result<()> {
    let broker = super::build_broker(config)?;
    let ctx = super::request_context(config, "metrics");

    let metrics = broker
        .service_metrics(&ctx)
        .await
        .map_err(|e| report(&ctx, e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }
    for metric in &metrics {
        println!("{} {} {}", metric.key.cyan(), metric.value, metric.unit.dimmed());
    }
    Ok(())
}

pub async fn upgrade(config: &BrokerConfig, instance_id: &str) -> anyhow::Result<()> {
    let broker = super::build_broker(config)?;
    let ctx = super::request_context(config, "upgrade").with_instance_id(instance_id);

    let token = broker
        .upgrade(&ctx, instance_id)
        .await
        .map_err(|e| report(&ctx, e))?;

    tracing::info!(instance_id, task_id = %token.task_id, "Upgrade submitted");
    println!(
        "{} {} (task {})",
        "✓ Upgrade submitted for".green(),
        instance_id.cyan(),
        token.task_id
    );
    println!("  operation: {}", token.encode()?);
    Ok(())
}

/// Print the user-facing status line and keep the full error for the exit
fn report(ctx: &RequestContext, err: BrokerError) -> anyhow::Error {
    tracing::error!(
        request_id = %ctx.request_id(),
        operation = ctx.operation().unwrap_or_default(),
        status = err.http_status(),
        retryable = err.is_retryable(),
        error = %err,
        "Management request failed"
    );
    eprintln!(
        "{} {}",
        format!("[{}]", err.http_status()).red().bold(),
        err.user_message(ctx)
    );
    err.into()
}
