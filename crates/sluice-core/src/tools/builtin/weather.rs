use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use sluice_tools::Presentation;
use sluice_tools::tools::weather::{
    WEATHER_COMPONENT, WeatherError, WeatherParams, WeatherReport, WeatherToolSpec,
};

use crate::tools::tool::{Tool, ToolContext};

const GEO_LOOKUP_URL: &str = "https://geoapi.qweather.com/v2/city/lookup";
const WEATHER_NOW_URL: &str = "https://devapi.qweather.com/v7/weather/now";

#[async_trait]
pub trait WeatherBackend: Send + Sync + 'static {
    async fn current(&self, location: &str) -> Result<WeatherReport, WeatherError>;
}

/// Fixed conditions for any location. Used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineWeather;

#[async_trait]
impl WeatherBackend for OfflineWeather {
    async fn current(&self, location: &str) -> Result<WeatherReport, WeatherError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(WeatherError::UnknownLocation {
                location: String::new(),
            });
        }
        Ok(WeatherReport {
            city: location.to_string(),
            temperature: "24°C".to_string(),
            weather: "sunny".to_string(),
            humidity: "60%".to_string(),
            wind: "NE 2".to_string(),
            message: format!("{location}: 24°C, sunny"),
        })
    }
}

/// QWeather backend: a city lookup followed by a current-conditions request.
#[derive(Debug, Clone)]
pub struct QWeather {
    http: reqwest::Client,
    api_key: String,
    geo_url: String,
    weather_url: String,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    code: String,
    #[serde(default)]
    location: Vec<GeoLocation>,
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NowResponse {
    code: String,
    now: Option<NowConditions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NowConditions {
    temp: String,
    text: String,
    humidity: String,
    wind_dir: String,
    wind_scale: String,
}

impl QWeather {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            geo_url: GEO_LOOKUP_URL.to_string(),
            weather_url: WEATHER_NOW_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_endpoints(mut self, geo_url: impl Into<String>, weather_url: impl Into<String>) -> Self {
        self.geo_url = geo_url.into();
        self.weather_url = weather_url.into();
        self
    }

    /// Point both requests at a per-account API host such as
    /// `abc1234.re.qweatherapi.com`. A missing scheme means https.
    #[must_use]
    pub fn with_api_host(self, host: &str) -> Self {
        let host = host.trim().trim_end_matches('/');
        let base = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        self.with_endpoints(
            format!("{base}/geo/v2/city/lookup"),
            format!("{base}/v7/weather/now"),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let failed = |e: reqwest::Error| WeatherError::RequestFailed {
            message: e.to_string(),
        };
        self.http
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?
            .json::<T>()
            .await
            .map_err(failed)
    }

    async fn location_id(&self, city: &str) -> Result<String, WeatherError> {
        let geo: GeoResponse = self
            .get_json(
                &self.geo_url,
                &[("location", city), ("range", "cn"), ("key", self.api_key.as_str())],
            )
            .await?;
        if geo.code != "200" {
            return Err(WeatherError::Service { code: geo.code });
        }
        geo.location
            .into_iter()
            .next()
            .map(|location| location.id)
            .ok_or_else(|| WeatherError::UnknownLocation {
                location: city.to_string(),
            })
    }
}

fn report_from_now(city: &str, response: NowResponse) -> Result<WeatherReport, WeatherError> {
    if response.code != "200" {
        return Err(WeatherError::Service {
            code: response.code,
        });
    }
    let now = response.now.ok_or_else(|| WeatherError::Service {
        code: response.code.clone(),
    })?;
    Ok(WeatherReport {
        city: city.to_string(),
        message: format!("{city}: {}°C, {}", now.temp, now.text),
        temperature: format!("{}°C", now.temp),
        weather: now.text,
        humidity: format!("{}%", now.humidity),
        wind: format!("{} {}", now.wind_dir, now.wind_scale),
    })
}

#[async_trait]
impl WeatherBackend for QWeather {
    async fn current(&self, location: &str) -> Result<WeatherReport, WeatherError> {
        let location_id = self.location_id(location).await?;
        debug!(target: "sluice::tools::weather", "Resolved {} to {}", location, location_id);
        let now: NowResponse = self
            .get_json(
                &self.weather_url,
                &[("location", location_id.as_str()), ("key", self.api_key.as_str())],
            )
            .await?;
        report_from_now(location, now)
    }
}

/// `get_weather`, rendered inline as a weather card.
#[derive(Clone)]
pub struct WeatherTool {
    backend: Arc<dyn WeatherBackend>,
}

impl WeatherTool {
    pub fn new(backend: impl WeatherBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn offline() -> Self {
        Self::new(OfflineWeather)
    }
}

#[async_trait]
impl Tool for WeatherTool {
    type Spec = WeatherToolSpec;

    const DESCRIPTION: &'static str = "Get the current weather for a specific location. Only call this when the user explicitly asks about the weather and names a valid place.";

    fn presentation(&self) -> Presentation {
        Presentation::inline(WEATHER_COMPONENT)
    }

    #[instrument(skip(self, ctx), fields(tool.id = %ctx.tool_call_id))]
    async fn execute(
        &self,
        params: WeatherParams,
        ctx: &ToolContext,
    ) -> Result<WeatherReport, WeatherError> {
        self.backend.current(&params.location).await
    }
}
