use std::time::Duration;

use serde::Deserialize;

/// Response language requested from the provider. User-facing strings in
/// this crate are written for the same locale.
const LANG: &str = "en";
const UNITS: &str = "metric";

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("no city name given")]
    EmptyCity,
    #[error("weather provider rejected the API key")]
    Auth,
    #[error("no weather data for city {0:?}")]
    CityNotFound(String),
    #[error("weather provider error for {city:?}: {message}")]
    Api { city: String, message: String },
    #[error("unexpected weather provider status: {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to reach the weather provider: {0}")]
    Network(reqwest::Error),
    #[error("unexpected weather payload for city {0:?}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStyle {
    /// Description, current temperature, and humidity.
    Current,
    /// Same, plus the day's min/max temperature lines.
    WithRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub description: String,
    pub temperature: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: i64,
}

impl WeatherReport {
    pub fn render(&self, style: ReportStyle) -> String {
        let mut lines = vec![
            format!("Weather in {}", self.city),
            format!("weather: {}", self.description),
            format!("temperature: {}°C", self.temperature),
        ];
        if style == ReportStyle::WithRange {
            lines.push(format!("min: {}°C", self.temp_min));
            lines.push(format!("max: {}°C", self.temp_max));
        }
        lines.push(format!("humidity: {}%", self.humidity));

        lines.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    cod: Option<serde_json::Value>,
    message: Option<String>,
    #[serde(default)]
    weather: Vec<ApiCondition>,
    main: Option<ApiMain>,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<i64>,
}

// The provider encodes `cod` as a number on success and a string on errors.
fn cod_is_ok(cod: &serde_json::Value) -> bool {
    match cod {
        serde_json::Value::Number(n) => n.as_i64() == Some(200),
        serde_json::Value::String(s) => s == "200",
        _ => false,
    }
}

impl WeatherClient {
    pub fn new(api_key: &str, api_server: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_owned(),
            base_url: api_server.trim_end_matches('/').to_owned(),
        }
    }

    /// Fetch current weather for `city`. Blank input is rejected before any
    /// network traffic happens.
    #[tracing::instrument(skip(self))]
    pub async fn current_weather(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::EmptyCity);
        }

        let url = format!("{}/data/2.5/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", UNITS),
                ("lang", LANG),
            ])
            .send()
            .await
            .map_err(|err| WeatherError::Network(err.without_url()))?;

        let status = response.status();
        match status.as_u16() {
            200 => {}
            401 => return Err(WeatherError::Auth),
            404 => return Err(WeatherError::CityNotFound(city.to_owned())),
            _ => return Err(WeatherError::Status(status)),
        }

        let payload: ApiResponse = response
            .json()
            .await
            .map_err(|_| WeatherError::Malformed(city.to_owned()))?;

        if let Some(cod) = payload.cod.as_ref() {
            if !cod_is_ok(cod) {
                return Err(WeatherError::Api {
                    city: city.to_owned(),
                    message: payload
                        .message
                        .unwrap_or_else(|| "unknown provider error".to_owned()),
                });
            }
        }

        let description = payload.weather.first().and_then(|w| w.description.clone());
        let main = payload.main.ok_or_else(|| WeatherError::Malformed(city.to_owned()))?;

        match (description, main.temp, main.temp_min, main.temp_max, main.humidity) {
            (Some(description), Some(temperature), Some(temp_min), Some(temp_max), Some(humidity)) => {
                Ok(WeatherReport {
                    city: city.to_owned(),
                    description,
                    temperature,
                    temp_min,
                    temp_max,
                    humidity,
                })
            }
            _ => Err(WeatherError::Malformed(city.to_owned())),
        }
    }

    /// Lookup that always produces a sendable string. Every failure kind is
    /// mapped to its user-facing message here; callers never see an error.
    pub async fn lookup_message(&self, city: &str, style: ReportStyle) -> String {
        match self.current_weather(city).await {
            Ok(report) => report.render(style),
            Err(err) => user_message(&err),
        }
    }
}

fn user_message(err: &WeatherError) -> String {
    match err {
        WeatherError::EmptyCity => "No city name given.".to_owned(),
        WeatherError::Auth => {
            "Weather lookup failed: authentication failed, please check the API key.".to_owned()
        }
        WeatherError::CityNotFound(city) => {
            format!("Could not find a city named \"{}\".", city)
        }
        WeatherError::Api { city, message } => {
            format!("Weather lookup for {} failed: {}", city, message)
        }
        WeatherError::Status(status) => {
            tracing::error!("weather lookup failed: {}", err);
            format!("Weather lookup failed with an unexpected response ({}).", status)
        }
        WeatherError::Network(detail) => {
            tracing::error!("weather lookup failed: {}", err);
            format!("Weather lookup failed: {}", detail)
        }
        WeatherError::Malformed(city) => {
            format!("Could not parse weather data for {}.", city)
        }
    }
}
