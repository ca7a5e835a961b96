//! Runtime configuration
//!
//! Everything comes from the environment (a `.env` file is loaded in main),
//! with working defaults for a local feed server. The two chart layouts the
//! feed supports are preset series lists selected by `CHART_SERIES`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::chart::{AxisSide, SeriesField, SeriesSpec};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/data";

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Invalid interval '{0}': expected milliseconds or a number with ms/s/m/h suffix")]
    InvalidInterval(String),
    #[error("Invalid value '{1}' for {0}: expected true/false/1/0")]
    InvalidFlag(&'static str, String),
    #[error("Unknown series layout '{0}': expected 'full' or 'ratio'")]
    UnknownLayout(String),
    #[error("Invalid number '{1}' for {0}")]
    InvalidNumber(&'static str, String),
}

/// Sync loop configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Absolute URL of the data feed
    pub endpoint: String,
    /// Delay between refresh cycles
    pub interval: Duration,
    /// Run one cycle at start instead of waiting for the first tick
    pub render_immediately: bool,
    /// Which series are plotted and how
    pub series: Vec<SeriesSpec>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            interval: DEFAULT_INTERVAL,
            render_immediately: true,
            series: full_series(),
        }
    }
}

/// Static styling for the PNG surface
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub caption: String,
    pub x_desc: String,
    pub y_left_desc: String,
    pub y_right_desc: String,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ratio_chart.png"),
            width: 1280,
            height: 720,
            caption: "Ratio sqm price vs. BTC price".to_string(),
            x_desc: "Date".to_string(),
            y_left_desc: "Ratio".to_string(),
            y_right_desc: "Price (EUR)".to_string(),
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub chart: ChartStyle,
}

/// The single-series layout: just the ratio line
pub fn ratio_series() -> Vec<SeriesSpec> {
    vec![SeriesSpec {
        field: SeriesField::Ratio,
        axis: AxisSide::Left,
        color: (247, 147, 26),
        label: "Ratio sqm price vs. BTC price".to_string(),
    }]
}

/// The dual-axis layout: ratio on the left axis, raw prices on the right
pub fn full_series() -> Vec<SeriesSpec> {
    vec![
        SeriesSpec {
            field: SeriesField::Ratio,
            axis: AxisSide::Left,
            color: (54, 162, 235),
            label: "Ratio sqm price vs. BTC price".to_string(),
        },
        SeriesSpec {
            field: SeriesField::BtcPrice,
            axis: AxisSide::Right,
            color: (247, 147, 26),
            label: "BTC Price".to_string(),
        },
        SeriesSpec {
            field: SeriesField::SqmPrice,
            axis: AxisSide::Right,
            color: (163, 190, 140),
            label: "SQM Price".to_string(),
        },
    ]
}

/// Parse an interval value.
/// A bare number is milliseconds; otherwise a number with an ms/s/m/h suffix.
pub fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim().to_lowercase();

    // Find where the digits end
    let split_idx = value.chars().take_while(|c| c.is_ascii_digit()).count();
    if split_idx == 0 {
        return Err(ConfigError::InvalidInterval(raw.to_string()));
    }

    let amount: u64 = value[..split_idx]
        .parse()
        .map_err(|_| ConfigError::InvalidInterval(raw.to_string()))?;

    let duration = match &value[split_idx..] {
        "" | "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount * 60),
        "h" => Duration::from_secs(amount * 3600),
        _ => return Err(ConfigError::InvalidInterval(raw.to_string())),
    };

    Ok(duration)
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag(name, raw.to_string())),
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber(name, raw.to_string()))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// Read the full configuration from the environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = env_or("FEED_ENDPOINT", DEFAULT_ENDPOINT);
        let interval = parse_interval(&env_or("FEED_INTERVAL", "60s"))?;
        let render_immediately =
            parse_flag("RENDER_IMMEDIATELY", &env_or("RENDER_IMMEDIATELY", "true"))?;

        let series = match env_or("CHART_SERIES", "full").trim().to_lowercase().as_str() {
            "full" => full_series(),
            "ratio" => ratio_series(),
            other => return Err(ConfigError::UnknownLayout(other.to_string())),
        };

        let chart = ChartStyle {
            path: PathBuf::from(env_or("CHART_OUTPUT", "ratio_chart.png")),
            width: parse_number("CHART_WIDTH", &env_or("CHART_WIDTH", "1280"))?,
            height: parse_number("CHART_HEIGHT", &env_or("CHART_HEIGHT", "720"))?,
            ..ChartStyle::default()
        };

        Ok(Self {
            sync: SyncConfig {
                endpoint,
                interval,
                render_immediately,
                series,
            },
            chart,
        })
    }
}
