//! Forecast collaborator
//!
//! Forecasting runs out of process. [`ProcessForecaster`] launches the
//! configured command, writes a [`ForecastRequest`] as JSON to its standard
//! input and reads a JSON array of [`RawForecastPoint`] from its standard
//! output. The bundled `scripts/forecast_service.py` speaks this protocol
//! on top of Prophet.
//!
//! ```text
//! stdin:  {"dates": ["2020-01-01", ...], "values": [1.0, ...], "period": 30}
//! stdout: [{"ds": "2020-01-01 00:00:00", "yhat": 1.2, "yhat_lower": 0.9, "yhat_upper": 1.5}, ...]
//! ```
//!
//! The child is spawned with `kill_on_drop`, so dropping the forecast future
//! (timeout or client disconnect) also terminates the process.

use crate::error::ForecastError;
use crate::types::{parse_date, DATE_FORMAT};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Series handed to the forecaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Dates as `YYYY-MM-DD`, parallel to `values`
    pub dates: Vec<String>,
    /// Observed values
    pub values: Vec<f64>,
    /// Number of days to forecast past the last observation
    pub period: u32,
}

/// One point as produced by the forecast process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecastPoint {
    /// Date or date-time of the point
    pub ds: String,
    /// Predicted value
    pub yhat: f64,
    /// Lower bound of the uncertainty interval
    pub yhat_lower: f64,
    /// Upper bound of the uncertainty interval
    pub yhat_upper: f64,
}

/// One point of the forecast response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastPoint {
    /// Point date
    #[serde(rename = "Date", serialize_with = "serialize_date")]
    pub date: NaiveDate,
    /// Predicted value, rounded half to even
    #[serde(rename = "Yhat")]
    pub yhat: i64,
    /// Lower bound, rounded half to even
    #[serde(rename = "Yhat_lower")]
    pub yhat_lower: i64,
    /// Upper bound, rounded half to even
    #[serde(rename = "Yhat_upper")]
    pub yhat_upper: i64,
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DATE_FORMAT))
}

impl TryFrom<RawForecastPoint> for ForecastPoint {
    type Error = ForecastError;

    fn try_from(raw: RawForecastPoint) -> Result<Self, Self::Error> {
        let date = parse_date(&raw.ds)
            .ok_or_else(|| ForecastError::MalformedOutput(format!("bad date {:?}", raw.ds)))?;
        Ok(Self {
            date,
            yhat: round_value(raw.yhat)?,
            yhat_lower: round_value(raw.yhat_lower)?,
            yhat_upper: round_value(raw.yhat_upper)?,
        })
    }
}

fn round_value(value: f64) -> Result<i64, ForecastError> {
    if !value.is_finite() {
        return Err(ForecastError::MalformedOutput(format!(
            "non-finite value {}",
            value
        )));
    }
    Ok(value.round_ties_even() as i64)
}

/// Convert raw points into response points ordered by date
pub fn finish(raw: Vec<RawForecastPoint>) -> Result<Vec<ForecastPoint>, ForecastError> {
    let mut points = raw
        .into_iter()
        .map(ForecastPoint::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    points.sort_by_key(|p| p.date);
    Ok(points)
}

// =============================================================================
// Forecaster Trait
// =============================================================================

/// Produces a forecast from an observed series
#[async_trait]
pub trait Forecaster: Send + Sync + 'static {
    /// Forecast `request.period` days past the observations
    async fn forecast(
        &self,
        request: ForecastRequest,
    ) -> Result<Vec<RawForecastPoint>, ForecastError>;
}

/// Forecaster used when forecasting is switched off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledForecaster;

#[async_trait]
impl Forecaster for DisabledForecaster {
    async fn forecast(
        &self,
        _request: ForecastRequest,
    ) -> Result<Vec<RawForecastPoint>, ForecastError> {
        Err(ForecastError::Disabled)
    }
}

/// Forecaster backed by an external process
#[derive(Debug, Clone)]
pub struct ProcessForecaster {
    command: String,
    args: Vec<String>,
}

impl ProcessForecaster {
    /// Run `command` with `args` for every forecast
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Program that is launched
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Forecaster for ProcessForecaster {
    async fn forecast(
        &self,
        request: ForecastRequest,
    ) -> Result<Vec<RawForecastPoint>, ForecastError> {
        let payload = serde_json::to_vec(&request)
            .map_err(|e| ForecastError::MalformedOutput(e.to_string()))?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ForecastError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        debug!(
            command = %self.command,
            observations = request.values.len(),
            period = request.period,
            "Started forecast process"
        );

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ForecastError::MalformedOutput("stdin not captured".into()))?;
        let write = async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(command = %self.command, status = %output.status, "Forecast process failed");
            return Err(ForecastError::Exit {
                status: output.status.to_string(),
                stderr,
            });
        }
        // Output decides when the process exits before reading its input
        if let Err(e) = written {
            debug!(error = %e, "Forecast process closed stdin early");
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ForecastError::MalformedOutput(e.to_string()))
    }
}
