use serde::{Deserialize, Serialize};

/// WMO weather interpretation code, one variant per code Open-Meteo reports.
/// See: https://open-meteo.com/en/docs#weathervariables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    ClearSky,
    MainlyClear,
    PartlyCloudy,
    Overcast,
    Fog,
    RimeFog,
    LightDrizzle,
    ModerateDrizzle,
    DenseDrizzle,
    LightFreezingDrizzle,
    DenseFreezingDrizzle,
    SlightRain,
    ModerateRain,
    HeavyRain,
    LightFreezingRain,
    HeavyFreezingRain,
    SlightSnow,
    ModerateSnow,
    HeavySnow,
    SnowGrains,
    LightRainShowers,
    ModerateRainShowers,
    ViolentRainShowers,
    SlightSnowShowers,
    HeavySnowShowers,
    Thunderstorm,
    ThunderstormWithHail,
    ThunderstormWithHeavyHail,
    /// A code outside the WMO table
    Unknown(i32),
}

impl WeatherCondition {
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::ClearSky,
            1 => Self::MainlyClear,
            2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 => Self::Fog,
            48 => Self::RimeFog,
            51 => Self::LightDrizzle,
            53 => Self::ModerateDrizzle,
            55 => Self::DenseDrizzle,
            56 => Self::LightFreezingDrizzle,
            57 => Self::DenseFreezingDrizzle,
            61 => Self::SlightRain,
            63 => Self::ModerateRain,
            65 => Self::HeavyRain,
            66 => Self::LightFreezingRain,
            67 => Self::HeavyFreezingRain,
            71 => Self::SlightSnow,
            73 => Self::ModerateSnow,
            75 => Self::HeavySnow,
            77 => Self::SnowGrains,
            80 => Self::LightRainShowers,
            81 => Self::ModerateRainShowers,
            82 => Self::ViolentRainShowers,
            85 => Self::SlightSnowShowers,
            86 => Self::HeavySnowShowers,
            95 => Self::Thunderstorm,
            96 => Self::ThunderstormWithHail,
            99 => Self::ThunderstormWithHeavyHail,
            other => Self::Unknown(other),
        }
    }

    pub fn wmo_code(&self) -> i32 {
        match self {
            Self::ClearSky => 0,
            Self::MainlyClear => 1,
            Self::PartlyCloudy => 2,
            Self::Overcast => 3,
            Self::Fog => 45,
            Self::RimeFog => 48,
            Self::LightDrizzle => 51,
            Self::ModerateDrizzle => 53,
            Self::DenseDrizzle => 55,
            Self::LightFreezingDrizzle => 56,
            Self::DenseFreezingDrizzle => 57,
            Self::SlightRain => 61,
            Self::ModerateRain => 63,
            Self::HeavyRain => 65,
            Self::LightFreezingRain => 66,
            Self::HeavyFreezingRain => 67,
            Self::SlightSnow => 71,
            Self::ModerateSnow => 73,
            Self::HeavySnow => 75,
            Self::SnowGrains => 77,
            Self::LightRainShowers => 80,
            Self::ModerateRainShowers => 81,
            Self::ViolentRainShowers => 82,
            Self::SlightSnowShowers => 85,
            Self::HeavySnowShowers => 86,
            Self::Thunderstorm => 95,
            Self::ThunderstormWithHail => 96,
            Self::ThunderstormWithHeavyHail => 99,
            Self::Unknown(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ClearSky => "Clear sky",
            Self::MainlyClear => "Mainly clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Foggy",
            Self::RimeFog => "Depositing rime fog",
            Self::LightDrizzle => "Light drizzle",
            Self::ModerateDrizzle => "Moderate drizzle",
            Self::DenseDrizzle => "Dense drizzle",
            Self::LightFreezingDrizzle => "Light freezing drizzle",
            Self::DenseFreezingDrizzle => "Dense freezing drizzle",
            Self::SlightRain => "Slight rain",
            Self::ModerateRain => "Moderate rain",
            Self::HeavyRain => "Heavy rain",
            Self::LightFreezingRain => "Light freezing rain",
            Self::HeavyFreezingRain => "Heavy freezing rain",
            Self::SlightSnow => "Slight snow",
            Self::ModerateSnow => "Moderate snow",
            Self::HeavySnow => "Heavy snow",
            Self::SnowGrains => "Snow grains",
            Self::LightRainShowers => "Light rain showers",
            Self::ModerateRainShowers => "Moderate rain showers",
            Self::ViolentRainShowers => "Violent rain showers",
            Self::SlightSnowShowers => "Slight snow showers",
            Self::HeavySnowShowers => "Heavy snow showers",
            Self::Thunderstorm => "Thunderstorm",
            Self::ThunderstormWithHail => "Thunderstorm with hail",
            Self::ThunderstormWithHeavyHail => "Thunderstorm with heavy hail",
            Self::Unknown(_) => "Unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::ClearSky => "☀️",
            Self::MainlyClear => "🌤️",
            Self::PartlyCloudy => "⛅",
            Self::Overcast => "☁️",
            Self::Fog | Self::RimeFog => "🌫️",
            Self::LightDrizzle | Self::ModerateDrizzle | Self::LightRainShowers => "🌦️",
            Self::DenseDrizzle | Self::SlightRain | Self::ModerateRain | Self::HeavyRain | Self::ModerateRainShowers => "🌧️",
            Self::LightFreezingDrizzle | Self::DenseFreezingDrizzle | Self::LightFreezingRain | Self::HeavyFreezingRain | Self::SlightSnowShowers | Self::HeavySnowShowers => "🌨️",
            Self::SlightSnow | Self::ModerateSnow | Self::HeavySnow | Self::SnowGrains => "❄️",
            Self::ViolentRainShowers | Self::Thunderstorm | Self::ThunderstormWithHail | Self::ThunderstormWithHeavyHail => "⛈️",
            Self::Unknown(_) => "🌤️",
        }
    }
}

/// US AQI severity bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_aqi(aqi: f64) -> Self {
        match aqi {
            a if a <= 50.0 => Self::Good,
            a if a <= 100.0 => Self::Moderate,
            a if a <= 150.0 => Self::UnhealthyForSensitiveGroups,
            a if a <= 200.0 => Self::Unhealthy,
            a if a <= 300.0 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }
}

/// A named place with coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    /// First-level administrative region (state, province)
    #[serde(default)]
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Placeholder used when coordinates could not be reverse geocoded
    pub fn unnamed(latitude: f64, longitude: f64) -> Self {
        Self {
            name: "Current Location".to_string(),
            country: None,
            admin1: None,
            latitude,
            longitude,
        }
    }

    /// "Name, Region, Country" with empty parts skipped
    pub fn display_name(&self) -> String {
        [
            Some(self.name.as_str()),
            self.admin1.as_deref(),
            self.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// One geocoding search candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityMatch {
    /// "lat,lon"
    pub id: String,
    pub location: Location,
    pub timezone: Option<String>,
    pub population: u64,
}

/// Current conditions block of a forecast response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentWeather {
    pub time: String,
    pub temperature_2m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub precipitation: Option<f64>,
    pub weather_code: Option<i32>,
    pub pressure_msl: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
    pub uv_index: Option<f64>,
}

/// Hourly series; every vector is index-aligned with `time`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub apparent_temperature: Vec<Option<f64>>,
    pub precipitation_probability: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub weather_code: Vec<Option<i32>>,
    pub pressure_msl: Vec<Option<f64>>,
    pub wind_speed_10m: Vec<Option<f64>>,
    pub wind_direction_10m: Vec<Option<f64>>,
    pub uv_index: Vec<Option<f64>>,
    pub visibility: Vec<Option<f64>>,
}

/// Daily series; every vector is index-aligned with `time`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailySeries {
    pub time: Vec<String>,
    pub weather_code: Vec<Option<i32>>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub apparent_temperature_max: Vec<Option<f64>>,
    pub apparent_temperature_min: Vec<Option<f64>>,
    pub sunrise: Vec<String>,
    pub sunset: Vec<String>,
    pub uv_index_max: Vec<Option<f64>>,
    pub precipitation_sum: Vec<Option<f64>>,
    pub rain_sum: Vec<Option<f64>>,
    pub precipitation_probability_max: Vec<Option<f64>>,
    pub wind_speed_10m_max: Vec<Option<f64>>,
    pub wind_direction_10m_dominant: Vec<Option<f64>>,
}

/// Forecast response: current + hourly + daily plus site metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPayload {
    pub current: CurrentWeather,
    #[serde(default)]
    pub hourly: HourlySeries,
    #[serde(default)]
    pub daily: DailySeries,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub elevation: Option<f64>,
}

impl WeatherPayload {
    pub fn condition(&self) -> Option<WeatherCondition> {
        self.current.weather_code.map(WeatherCondition::from_wmo_code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirQualityCurrent {
    pub time: String,
    pub us_aqi: Option<f64>,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub carbon_monoxide: Option<f64>,
    pub nitrogen_dioxide: Option<f64>,
    pub sulphur_dioxide: Option<f64>,
    pub ozone: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirQualityHourly {
    pub time: Vec<String>,
    pub us_aqi: Vec<Option<f64>>,
    pub pm10: Vec<Option<f64>>,
    pub pm2_5: Vec<Option<f64>>,
}

/// Air-quality response: current + hourly pollutant readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityPayload {
    pub current: AirQualityCurrent,
    #[serde(default)]
    pub hourly: AirQualityHourly,
}

impl AirQualityPayload {
    pub fn category(&self) -> Option<AqiCategory> {
        self.current.us_aqi.map(AqiCategory::from_aqi)
    }
}
