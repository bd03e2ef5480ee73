use anyhow::{anyhow, Result};
use chrono::Local;
use log::{info, warn};

use insider_monitor::config::MonitorConfig;
use insider_monitor::dashboard::DashboardClient;
use insider_monitor::edgar::client::{EdgarClient, INDEX_FETCH_TIMEOUT};
use insider_monitor::edgar::index::{daily_index_url, last_business_day, parse_master_index};
use insider_monitor::pipeline::{self, RunStatus};
use insider_monitor::report;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = MonitorConfig::from_env()?;
    let edgar = EdgarClient::new(
        &config.user_agent,
        config.request_delay,
        config.archives_url.clone(),
    )?;
    let dashboard = DashboardClient::new(&config)?;

    // The index for today is usually not published yet; target the most
    // recent weekday instead.
    let target_date = last_business_day(Local::now().date_naive());
    info!("Targeting Form 4 filings from {}", target_date);

    let index_url = daily_index_url(target_date)?;
    let references = match edgar.get_text(&index_url, INDEX_FETCH_TIMEOUT).await {
        Ok(content) => parse_master_index(&content),
        Err(e) if e.status() == Some(404) => {
            warn!("Daily index not yet published for {}", target_date);
            Vec::new()
        }
        Err(e) => return Err(anyhow!("Failed to download daily index: {}", e)),
    };
    info!("Found {} Form 4 filing(s) for processing", references.len());

    let summary = pipeline::run(&config, &edgar, &dashboard, &references).await?;
    report::print_report(&config, &summary);

    if summary.status == RunStatus::Aborted {
        return Err(anyhow!(
            "Run aborted: {}",
            summary.fatal.as_deref().unwrap_or("unknown fatal error")
        ));
    }

    Ok(())
}
