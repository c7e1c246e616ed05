use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    pub database_url: String,

    pub line_channel_access_token: String,
    pub line_channel_secret: String,
    pub openweathermap_api_key: String,

    #[serde(default = "Config::default_otel_exporter_endpoint")]
    pub otel_exporter_endpoint: String,
    #[serde(default)]
    pub otel_exporter: OtelExporter,
    #[serde(default = "Config::default_otel_sample_rate")]
    pub otel_sample_rate: f64,

    #[serde(default = "Config::default_line_api_server")]
    pub line_api_server: String,
    #[serde(default = "Config::default_weather_api_server")]
    pub weather_api_server: String,

    #[serde(default = "Config::default_listen_address")]
    pub listen_address: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OtelExporter {
    #[default]
    OtlpGrpc,
    OtlpHttp,
}

impl Config {
    pub fn new() -> envy::Result<Self> {
        let config = envy::from_env::<Config>()?;
        Ok(config)
    }

    fn default_otel_exporter_endpoint() -> String {
        "http://localhost:4317".into()
    }

    fn default_otel_sample_rate() -> f64 {
        1.0
    }

    fn default_line_api_server() -> String {
        "https://api.line.me".into()
    }

    fn default_weather_api_server() -> String {
        "https://api.openweathermap.org".into()
    }

    fn default_listen_address() -> String {
        "0.0.0.0:8080".into()
    }
}
