//! padgain-io: Event file I/O and gain table persistence.
//!
//! This crate provides memory-mapped reading of per-sector cluster
//! event files, JSON round trips for gain tables (also the update-mode
//! input), the XML gain export consumed downstream, and configuration
//! and geometry file loading.
//!

mod config;
mod error;
pub mod events;
pub mod gains;

pub use config::{load_config, load_geometry};
pub use error::{Error, Result};
pub use events::{EventFileReader, EventFileWriter};
pub use gains::{
    from_records, read_gain_json, to_records, write_gain_json, write_gain_xml,
    write_gain_xml_file, write_results_csv, GainRecord,
};
