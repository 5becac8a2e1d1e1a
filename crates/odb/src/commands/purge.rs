use colored::Colorize;
use odb_broker::Purger;
use odb_config::BrokerConfig;
use odb_core::RequestContext;
use std::io::Write;

pub async fn handle(config: &BrokerConfig, broker_name: &str, yes: bool) -> anyhow::Result<()> {
    let offering = &config.service_catalog;

    println!(
        "{}",
        format!(
            "This deletes every instance of {} and deregisters broker {}.",
            offering.name, broker_name
        )
        .yellow()
        .bold()
    );

    if !yes {
        print!("Continue? [y/N]: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", "Aborted".dimmed());
            return Ok(());
        }
    }

    let purger = Purger::new(super::registry_client(config), &offering.id, &config.purge);
    // polls for minutes; no request deadline
    let ctx = RequestContext::new(offering.name.clone()).with_operation("purge");

    tracing::info!(offering = %offering.id, broker_name, "Starting purge");
    purger.purge(&ctx, broker_name).await?;
    println!("{}", "✓ Purge complete".green().bold());
    Ok(())
}
