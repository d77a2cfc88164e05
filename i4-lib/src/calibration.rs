use crate::error::I4Error;
use crate::ids::SensorId;
use crate::payload::PeakRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Photoelastic coefficient of the fiber (P_epsilon)
pub const PHOTOELASTIC_COEFFICIENT: f64 = 0.28;

/// Strain per newton of the sensing element
pub const GAUGE_FACTOR_PER_N: f64 = 1.0 / 460.0 / 0.02986;

/// Bench grating wavelengths in nanometers, sensor 0 and sensor 1 of every channel
static I4_SENSOR_WAVELENGTHS_NM: [f64; 2] = [1534.63, 1549.65];

/// Force in millinewtons from a grating's reference and measured wavelengths.
///
/// `reference_m` must be non-zero; [`ReferenceTable`] guarantees it.
pub fn compute_force(reference_m: f64, measured_m: f64) -> f64 {
    let delta = measured_m - reference_m;
    let strain = delta / reference_m / (1.0 - PHOTOELASTIC_COEFFICIENT);
    strain / GAUGE_FACTOR_PER_N * 1000.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub channel: u8,
    pub fiber: u8,
    pub sensor: u8,
    pub wavelength_nm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub sensors: Vec<ReferenceEntry>,
}

/// Unstrained wavelength of every configured grating, in meters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    wavelengths: BTreeMap<SensorId, f64>,
}

impl ReferenceTable {
    /// Four channels, one fiber each, two gratings per fiber.
    pub fn i4_default() -> Self {
        let wavelengths = (0..4u8)
            .flat_map(|channel| {
                I4_SENSOR_WAVELENGTHS_NM
                    .iter()
                    .enumerate()
                    .map(move |(sensor, nm)| (SensorId::new(channel, 0, sensor as u8), nm / 1e9))
            })
            .collect();
        Self { wavelengths }
    }

    pub fn from_config(config: &ReferenceConfig) -> Result<Self, I4Error> {
        let mut wavelengths = BTreeMap::new();
        for entry in &config.sensors {
            let id = SensorId::new(entry.channel, entry.fiber, entry.sensor);
            if !id.is_encodable() {
                return Err(I4Error::Config(format!("sensor id out of range: {}", id)));
            }
            if !entry.wavelength_nm.is_finite() || entry.wavelength_nm <= 0.0 {
                return Err(I4Error::Config(format!(
                    "invalid reference wavelength {} nm for {}",
                    entry.wavelength_nm, id
                )));
            }
            if wavelengths.insert(id, entry.wavelength_nm / 1e9).is_some() {
                return Err(I4Error::Config(format!("duplicate reference for {}", id)));
            }
        }
        debug!("Loaded {} reference wavelengths", wavelengths.len());
        Ok(Self { wavelengths })
    }

    pub fn from_json_str(json: &str) -> Result<Self, I4Error> {
        let config: ReferenceConfig = serde_json::from_str(json)?;
        Self::from_config(&config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, I4Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| I4Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Reference wavelength in meters
    pub fn get(&self, id: SensorId) -> Option<f64> {
        self.wavelengths.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }
}

/// A peak converted to force
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForceReading {
    pub id: SensorId,
    pub reference_wavelength_m: f64,
    pub measured_wavelength_m: f64,
    pub force_mn: f64,
}

impl fmt::Display for ForceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\tForce: {:.5} mN", self.id, self.force_mn)
    }
}

/// Converts decoded peaks to forces using a shared, read-only reference table.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    references: Arc<ReferenceTable>,
}

impl CalibrationEngine {
    pub fn new(references: Arc<ReferenceTable>) -> Self {
        Self { references }
    }

    /// `None` when the peak's grating has no configured reference.
    pub fn force_for(&self, peak: &PeakRecord) -> Option<ForceReading> {
        let Some(reference) = self.references.get(peak.id) else {
            warn!("No reference wavelength for {}", peak.id);
            return None;
        };

        Some(ForceReading {
            id: peak.id,
            reference_wavelength_m: reference,
            measured_wavelength_m: peak.wavelength_m,
            force_mn: compute_force(reference, peak.wavelength_m),
        })
    }
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::new(Arc::new(ReferenceTable::i4_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_force_at_reference() {
        assert_eq!(compute_force(1534.63e-9, 1534.63e-9), 0.0);
    }

    #[test]
    fn test_force_is_linear_in_delta() {
        let reference = 1549.65e-9;
        let f1 = compute_force(reference, reference + 0.1e-9);
        let f2 = compute_force(reference, reference + 0.2e-9);
        let f_neg = compute_force(reference, reference - 0.1e-9);
        assert!((f2 - 2.0 * f1).abs() < 1e-6 * f1.abs());
        assert!((f_neg + f1).abs() < 1e-6 * f1.abs());
        assert!(f1 > 0.0);
    }

    #[test]
    fn test_force_known_value() {
        // 1 nm shift on 1534.63 nm: strain = 1/1534.63/0.72, force = strain * 460 * 0.02986 * 1000
        let reference = 1534.63e-9;
        let expected = 1.0 / 1534.63 / 0.72 * 460.0 * 0.02986 * 1000.0;
        let force = compute_force(reference, reference + 1e-9);
        assert!((force - expected).abs() < 1e-6, "got {}", force);
    }

    #[test]
    fn test_default_table() {
        let table = ReferenceTable::i4_default();
        assert_eq!(table.len(), 8);
        assert_eq!(table.get(SensorId::new(0, 0, 0)), Some(1534.63 / 1e9));
        assert_eq!(table.get(SensorId::new(3, 0, 1)), Some(1549.65 / 1e9));
        assert_eq!(table.get(SensorId::new(4, 0, 0)), None);
        assert_eq!(table.get(SensorId::new(0, 1, 0)), None);
    }

    #[test]
    fn test_table_from_json() {
        let json = r#"{"sensors":[
            {"channel":1,"fiber":0,"sensor":0,"wavelength_nm":1530.0},
            {"channel":1,"fiber":0,"sensor":1,"wavelength_nm":1550.0}
        ]}"#;
        let table = ReferenceTable::from_json_str(json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(SensorId::new(1, 0, 1)), Some(1550.0 / 1e9));
    }

    #[test]
    fn test_table_rejects_bad_entries() {
        let zero = r#"{"sensors":[{"channel":0,"fiber":0,"sensor":0,"wavelength_nm":0.0}]}"#;
        assert!(matches!(ReferenceTable::from_json_str(zero), Err(I4Error::Config(_))));

        let wide = r#"{"sensors":[{"channel":16,"fiber":0,"sensor":0,"wavelength_nm":1530.0}]}"#;
        assert!(matches!(ReferenceTable::from_json_str(wide), Err(I4Error::Config(_))));

        let dup = r#"{"sensors":[
            {"channel":0,"fiber":0,"sensor":0,"wavelength_nm":1530.0},
            {"channel":0,"fiber":0,"sensor":0,"wavelength_nm":1531.0}
        ]}"#;
        assert!(matches!(ReferenceTable::from_json_str(dup), Err(I4Error::Config(_))));

        assert!(matches!(ReferenceTable::from_json_str("{"), Err(I4Error::Json(_))));
    }

    #[test]
    fn test_engine_force_for_peak() {
        let engine = CalibrationEngine::default();
        let peak = PeakRecord {
            id: SensorId::new(2, 0, 1),
            wavelength_m: 1549.65e-9,
            timestamp_s: None,
        };
        let reading = engine.force_for(&peak).unwrap();
        assert_eq!(reading.id, peak.id);
        assert!(reading.force_mn.abs() < 1e-9);

        let unknown = PeakRecord {
            id: SensorId::new(9, 0, 0),
            ..peak
        };
        assert!(engine.force_for(&unknown).is_none());
    }
}
