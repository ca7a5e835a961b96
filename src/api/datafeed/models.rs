use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One record from the feed endpoint.
///
/// `date` is an opaque ordinal label shared by every series; it is never
/// parsed or reordered. `ratio` is mandatory, the raw prices are only present
/// on feeds that publish them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub date: String,
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btc_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqm_price: Option<f64>,
}

/// Errors from one fetch cycle against the feed endpoint
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Transport/connection failure, including the request timeout
    #[error("request failed: {0}")]
    Network(String),
    /// The endpoint answered with a non-success status
    #[error("feed returned HTTP {0}: {1}")]
    Status(u16, String),
    /// The body was not a JSON array of records in the expected shape
    #[error("failed to parse feed payload: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_full_record() {
        let json = r#"{"date":"01-02-2023","ratio":0.085,"btc_price":30000.0,"sqm_price":2550.0}"#;
        let point: DataPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.date, "01-02-2023");
        assert_eq!(point.ratio, 0.085);
        assert_eq!(point.btc_price, Some(30000.0));
        assert_eq!(point.sqm_price, Some(2550.0));
    }

    #[test]
    fn prices_are_optional() {
        let json = r#"{"date":"01-02-2023","ratio":0.085}"#;
        let point: DataPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.btc_price, None);
        assert_eq!(point.sqm_price, None);
    }

    #[test]
    fn missing_ratio_is_rejected() {
        let json = r#"{"date":"01-02-2023","btc_price":30000.0}"#;
        assert!(serde_json::from_str::<DataPoint>(json).is_err());
    }
}
