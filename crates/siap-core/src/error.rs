use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("coordinate must be finite: ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("accuracy must be a finite non-negative number of meters: {0}")]
    InvalidAccuracy(f64),

    #[error("viewport must have a positive finite size: {width}x{height}")]
    InvalidViewport { width: f64, height: f64 },

    #[error("raster size must be non-zero: {width}x{height}")]
    InvalidRaster { width: u32, height: u32 },
}
