use std::time::Instant;

use anyhow::Context;
use dragnet::configuration::get_configuration;
use dragnet::pipeline::Pipeline;
use env_logger::Env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let (query, radius_miles) = match (args.next(), args.next()) {
        (Some(query), Some(radius)) => {
            let radius_miles: f64 = radius.parse().context("radius must be a number of miles")?;
            (query, radius_miles)
        }
        _ => anyhow::bail!("usage: dragnet \"<query>\" <radius-miles>"),
    };

    let configuration = get_configuration().expect("Failed to read configuration.");
    let pipeline = Pipeline::new(configuration)?;

    let mut progress = pipeline.subscribe();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let update = progress.borrow_and_update().clone();
            match update.total {
                0 => log::info!("{}", update.stage),
                total => log::info!("{} [{}/{}]", update.stage, update.completed, total),
            }
        }
    });

    let started = Instant::now();
    let report = pipeline.run(&query, radius_miles).await?;
    log::info!(
        "{} ads exported to {} in {}s",
        report.rows,
        report.path.display(),
        started.elapsed().as_secs()
    );

    Ok(())
}
