use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use board::Station;
use config::StationConfig;
use log::info;

mod board;
mod config;
mod retry;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = StationConfig::from_env().context("invalid station configuration")?;
    let station = Station::new(config);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    info!("reading {} sensors", station.name());

    let reading = station.measure()?;
    info!(
        "Temp={:.2}*C Humidity={:.2}% Pressure={:.2}hPa",
        reading.temperature_c,
        reading.humidity_pct,
        reading.pressure_hpa()
    );

    println!(
        "{} Temp={:.2}*C Humidity={:.2}% Pressure={:.2}Pa",
        timestamp, reading.temperature_c, reading.humidity_pct, reading.pressure_pa
    );
    Ok(())
}
