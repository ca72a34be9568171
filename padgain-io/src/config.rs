//! Configuration and geometry file loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use padgain_core::{CalibConfig, Geometry};

use crate::Result;

/// Loads a calibration configuration from JSON.
///
/// Absent fields take their defaults, so a partial file only naming
/// the options a run changes is valid.
///
/// # Errors
/// Returns an error if the file cannot be opened or parsed, or if the
/// resulting configuration is inconsistent.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CalibConfig> {
    let file = File::open(path)?;
    let config: CalibConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;
    Ok(config)
}

/// Loads a detector geometry from JSON.
///
/// # Errors
/// Returns an error if the file cannot be opened or parsed.
pub fn load_geometry<P: AsRef<Path>>(path: P) -> Result<Geometry> {
    let file = File::open(path)?;
    let geometry: Geometry = serde_json::from_reader(BufReader::new(file))?;
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use padgain_core::{FitFunction, GroupId};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_config_takes_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"fit_function": "Fermi", "min_histogram_entries": 250}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.fit_function, FitFunction::Fermi);
        assert_eq!(config.min_histogram_entries, 250);
        // Untouched fields keep their defaults.
        assert_eq!(config.histogram_bins, CalibConfig::default().histogram_bins);
    }

    #[test]
    fn test_inconsistent_config_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"min_acceptable_gain": 3.0, "max_acceptable_gain": 0.5}}"#
        )
        .unwrap();
        file.flush().unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_geometry_loading() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"chambers": [{{"id": 1, "sectors": [{{"id": 2, "pads_per_padrow": [4, 6]}}]}}]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let geometry = load_geometry(file.path()).unwrap();
        assert_eq!(geometry.channel_count(), 10);
        assert!(geometry.contains_group(GroupId::new(1, 2)));
    }
}
