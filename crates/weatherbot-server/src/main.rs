use std::sync::Arc;

use sea_orm::Database;
use weatherbot_migrator::MigratorTrait;

use weatherbot_server::messaging::LineClient;
use weatherbot_server::services::user;
use weatherbot_server::weather::WeatherClient;
use weatherbot_server::webhook::{self, AppState};

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
    weatherbot_migrator::Migrator::up(&db, None).await?;

    let state = Arc::new(AppState {
        channel_secret: config.line_channel_secret.clone(),
        users: user::Service::new(db.clone()),
        line: LineClient::new(&config.line_channel_access_token, &config.line_api_server),
        weather: WeatherClient::new(&config.openweathermap_api_key, &config.weather_api_server),
    });

    let app = webhook::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    db.close().await?;

    Ok(())
}
