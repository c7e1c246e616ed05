use sea_orm::Database;

use weatherbot_server::broadcast;
use weatherbot_server::messaging::LineClient;
use weatherbot_server::services::user;
use weatherbot_server::weather::WeatherClient;

/// One-shot broadcast run; an external scheduler (cron or similar) is
/// expected to start this binary once per day.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    let config = weatherbot_common::config::Config::new()?;

    // Initialize the tracer
    weatherbot_common::observability::tracing::init_tracer(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
        &config,
    );

    let db = Database::connect(&config.database_url).await?;

    let users = user::Service::new(db.clone());
    let line = LineClient::new(&config.line_channel_access_token, &config.line_api_server);
    let weather = WeatherClient::new(&config.openweathermap_api_key, &config.weather_api_server);

    broadcast::run(&users, &weather, &line).await?;

    db.close().await?;
    weatherbot_common::observability::tracing::shutdown_tracer();

    Ok(())
}
