//! Position samples and the settings handed to a position source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single reported position sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Estimated horizontal error radius in metres.
    pub horizontal_accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy: f64) -> Self {
        Self::at(latitude, longitude, horizontal_accuracy, Utc::now())
    }

    pub fn at(
        latitude: f64,
        longitude: f64,
        horizontal_accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy,
            timestamp,
        }
    }

    /// Whether this fix's error radius is within `acceptable` (inclusive).
    pub fn is_within(&self, acceptable: f64) -> bool {
        self.horizontal_accuracy <= acceptable
    }
}

/// Permission status reported by the permission subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedAlways,
    AuthorizedWhenInUse,
}

impl AuthorizationStatus {
    /// Background sampling only works with "always" authorization.
    pub fn allows_background(self) -> bool {
        self == AuthorizationStatus::AuthorizedAlways
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredAccuracy {
    /// Highest accuracy the hardware offers.
    Best,
    Meters(f64),
}

/// How the controller wants the position source configured.
///
/// Applied once when the controller is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub desired_accuracy: DesiredAccuracy,
    /// Minimum movement in metres before a new fix is delivered.
    /// `None` delivers every fix.
    pub distance_filter: Option<f64>,
    pub allows_background_updates: bool,
    pub pauses_automatically: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            desired_accuracy: DesiredAccuracy::Best,
            distance_filter: None,
            allows_background_updates: true,
            pauses_automatically: false,
        }
    }
}
