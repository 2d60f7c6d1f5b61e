//! Device location acquisition contract.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::model::Coordinate;

/// Reference bound on a single position request.
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a position could not be obtained. Every variant is recoverable by retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationFailure {
    #[error("location permission denied; allow location access and try again")]
    PermissionDenied,
    #[error("position unavailable; enable GPS and try again")]
    PositionUnavailable,
    #[error("timed out waiting for a position fix")]
    Timeout,
    #[error("geolocation is not supported on this device")]
    Unsupported,
}

/// Options passed with every position request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: LOCATION_TIMEOUT,
        }
    }
}

/// A source of the device's current position.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn request_current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinate, LocationFailure>;
}

/// Request a position, mapping an overrun of `options.timeout` to
/// [`LocationFailure::Timeout`].
pub async fn request_with_timeout<S>(
    source: &S,
    options: PositionOptions,
) -> Result<Coordinate, LocationFailure>
where
    S: LocationSource + ?Sized,
{
    match tokio::time::timeout(options.timeout, source.request_current_position(options)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = options.timeout.as_millis() as u64, "position request timed out");
            Err(LocationFailure::Timeout)
        }
    }
}

/// A source that always reports the same outcome. Used for manual entry and tests.
#[derive(Debug, Clone)]
pub struct FixedLocation {
    outcome: Result<Coordinate, LocationFailure>,
}

impl FixedLocation {
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            outcome: Ok(coordinate),
        }
    }

    pub fn failing(failure: LocationFailure) -> Self {
        Self {
            outcome: Err(failure),
        }
    }
}

#[async_trait]
impl LocationSource for FixedLocation {
    async fn request_current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinate, LocationFailure> {
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl LocationSource for Stalled {
        async fn request_current_position(
            &self,
            _options: PositionOptions,
        ) -> Result<Coordinate, LocationFailure> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(LocationFailure::PositionUnavailable)
        }
    }

    #[tokio::test]
    async fn fixed_source_reports_coordinate() {
        let here = Coordinate::new(-6.2, 106.8).unwrap();
        let got = request_with_timeout(&FixedLocation::at(here), PositionOptions::default()).await;
        assert_eq!(got, Ok(here));
    }

    #[tokio::test]
    async fn failures_pass_through() {
        let source = FixedLocation::failing(LocationFailure::PermissionDenied);
        let got = request_with_timeout(&source, PositionOptions::default()).await;
        assert_eq!(got, Err(LocationFailure::PermissionDenied));
    }

    #[tokio::test]
    async fn stalled_source_times_out() {
        let options = PositionOptions {
            timeout: Duration::from_millis(20),
            ..PositionOptions::default()
        };
        let got = request_with_timeout(&Stalled, options).await;
        assert_eq!(got, Err(LocationFailure::Timeout));
    }
}
