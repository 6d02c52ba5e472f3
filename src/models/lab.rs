use serde::{Deserialize, Serialize};

use super::enums::ResultStatus;

/// A measured laboratory value attached to a saved case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabMeasurement {
    pub parameter_name: String,
    pub value: f64,
    pub unit: String,
    pub reference_min: Option<f64>,
    pub reference_max: Option<f64>,
    pub status: ResultStatus,
}
