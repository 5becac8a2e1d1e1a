use colored::Colorize;
use odb_config::BrokerConfig;

pub async fn handle(config: &BrokerConfig) -> anyhow::Result<()> {
    println!("{}", "Running broker startup checks...".blue());

    let broker = super::build_broker(config)?;
    let ctx = super::request_context(config, "startup-checks");

    match broker.startup_checks(&ctx).await {
        Ok(()) => {
            println!("{}", "✓ Startup checks passed".green().bold());
            println!(
                "  offering: {} ({} plans)",
                config.service_catalog.name.cyan(),
                config.service_catalog.plans.len()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup checks failed");
            println!("{}", "✗ Startup checks failed".red().bold());
            println!("  {}", e);
            Err(e.into())
        }
    }
}
