use std::num::NonZeroU64;

use karga_rps::{transport, Banner, LoadConfig, Rate, RequestExecutor, Scheduler};
use reqwest::Url;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let config = LoadConfig::builder()
        .target(Url::parse("http://localhost:3000")?)
        .rate(Rate::new(500.0)?)
        .duration_secs(NonZeroU64::new(5).ok_or("duration must be positive")?)
        .system_proxy(false)
        .build();

    println!("{}", Banner::from(&config));

    let executor = RequestExecutor::new(transport(&config)?, &config)?;
    let summary = Scheduler::new(executor, &config).run().await;

    println!("\n{summary}");
    println!("{summary:#?}");
    Ok(())
}
