//! Live Dashboard Example for the Air-Quality Twin
//!
//! Fetches the current reading for the configured location, places two
//! interventions and prints the projected scenario.
//!
//! Run with: cargo run --example live_dashboard
//! Set `RUST_LOG=aqi_twin=debug` to see the pipeline's events.

use aqi_twin::{
    AcquisitionPipeline, Config, HttpTransport, LngLat, Session, StrategyId, ViewMode,
    to_feature_collection,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_default_sources()?;
    let mut session = Session::new(config.default_location.clone());
    let pipeline = AcquisitionPipeline::new(HttpTransport::default(), config);

    println!("📡 Fetching live data for {}", session.location().label);
    let cycle = session.begin_fetch();
    let report = pipeline.run(cycle).await;
    let next = report.next_fetch_in;
    session.apply(report);

    let status = session.status();
    println!(
        "Source: {:?} (live: {}), next fetch in {}s",
        status.source,
        status.is_live,
        next.as_secs()
    );
    let reading = session.reading();
    println!(
        "PM2.5 {} µg/m³ | PM10 {} µg/m³ | CO {} | NO2 {} µg/m³",
        reading.pm2_5, reading.pm10, reading.co, reading.no2
    );
    let aqi = session.current_aqi();
    println!("AQI {} ({})\n", aqi.value, aqi.label());

    // Two interventions near the centre of the map
    let center = session.location().coordinates;
    session.set_slider(StrategyId::Ev, 60);
    session.place_intervention(StrategyId::Ev, center, None);
    session.set_slider(StrategyId::Trees, 40);
    session.place_intervention(
        StrategyId::Trees,
        LngLat::new(center.lng + 0.003, center.lat - 0.002),
        None,
    );

    for view in [ViewMode::default(), ViewMode::Aqi, ViewMode::Co2] {
        session.set_view(view);
        let projection = session.projection();
        println!(
            "{view:>6}: {:.1} → {:.1} {}",
            projection.display.current,
            projection.display.projected,
            view.unit()
        );
    }

    let projection = session.projection();
    println!(
        "\nProjected AQI {} ({}), change: {:?}",
        projection.projected_aqi.value,
        projection.projected_aqi.label(),
        session.aqi_delta()
    );
    println!("Net CO2 change: {:+.1}%", projection.co2_change_percent());

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let points = session.heat_field(&mut rng);
    let geojson = to_feature_collection(&points);
    println!(
        "Heat field: {} points, {} bytes of GeoJSON",
        points.len(),
        geojson.to_string().len()
    );

    println!("\n📋 Audit log:");
    for entry in session.audit().iter() {
        println!("  [{}] {} - {}", entry.status, entry.action, entry.details);
    }

    Ok(())
}
