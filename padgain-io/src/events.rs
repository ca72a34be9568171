//! Memory-mapped cluster event files.
//!
//! One file holds the clusters of a single sector. The layout is a
//! 12-byte header followed by fixed-size little-endian records:
//!
//! - header: magic `PGCE`, format version (u16), chamber (u16),
//!   sector (u16), reserved (u16)
//! - record (20 bytes): charge (f32), max ADC (f32), time slice (u16),
//!   pixels (u16), time slices (u16), pads (u16), padrow (u16),
//!   pad (u16)
#![allow(clippy::cast_possible_truncation)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use padgain_core::{ClusterEvent, GroupId};

use crate::{Error, Result};

const MAGIC: [u8; 4] = *b"PGCE";
const VERSION: u16 = 1;
const HEADER_LEN: usize = 12;
const RECORD_LEN: usize = 20;

/// Reader for one sector's cluster event file.
///
/// Uses memmap2 to access file contents without loading the entire
/// file into memory.
pub struct EventFileReader {
    mmap: Mmap,
    path: PathBuf,
    chamber: u16,
    sector: u16,
}

impl EventFileReader {
    /// Opens and validates an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, or if
    /// the header or length is not a valid event file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not
        // modified concurrently. This is the standard safety contract
        // for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_LEN {
            return Err(Error::InvalidFormat(format!(
                "file too short for a header: {} bytes",
                mmap.len()
            )));
        }
        if mmap[0..4] != MAGIC {
            return Err(Error::InvalidFormat("bad magic".into()));
        }
        let version = u16::from_le_bytes([mmap[4], mmap[5]]);
        if version != VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported format version {version}"
            )));
        }
        if !(mmap.len() - HEADER_LEN).is_multiple_of(RECORD_LEN) {
            return Err(Error::InvalidFormat(format!(
                "payload length {} is not a multiple of {RECORD_LEN}",
                mmap.len() - HEADER_LEN
            )));
        }

        let chamber = u16::from_le_bytes([mmap[6], mmap[7]]);
        let sector = u16::from_le_bytes([mmap[8], mmap[9]]);
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
            chamber,
            sector,
        })
    }

    /// Returns the chamber the events belong to.
    #[must_use]
    pub fn chamber(&self) -> u16 {
        self.chamber
    }

    /// Returns the sector the events belong to.
    #[must_use]
    pub fn sector(&self) -> u16 {
        self.sector
    }

    /// Returns the group the events belong to.
    #[must_use]
    pub fn group(&self) -> GroupId {
        GroupId::new(self.chamber, self.sector)
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of event records.
    #[must_use]
    pub fn event_count(&self) -> usize {
        (self.mmap.len() - HEADER_LEN) / RECORD_LEN
    }

    /// Iterates over the events in file order.
    pub fn events(&self) -> impl Iterator<Item = ClusterEvent> + '_ {
        self.mmap[HEADER_LEN..]
            .chunks_exact(RECORD_LEN)
            .map(decode_record)
    }
}

fn decode_record(record: &[u8]) -> ClusterEvent {
    let f32_at = |offset: usize| {
        f32::from_le_bytes(record[offset..offset + 4].try_into().unwrap())
    };
    let u16_at = |offset: usize| {
        u16::from_le_bytes(record[offset..offset + 2].try_into().unwrap())
    };
    ClusterEvent {
        charge: f64::from(f32_at(0)),
        max_adc: f64::from(f32_at(4)),
        time_slice: u16_at(8),
        n_pixels: u16_at(10),
        n_time_slices: u16_at(12),
        n_pads: u16_at(14),
        padrow: u16_at(16),
        pad: u16_at(18),
    }
}

/// Writer for one sector's cluster event file.
pub struct EventFileWriter {
    writer: BufWriter<File>,
    events_written: usize,
}

impl EventFileWriter {
    /// Creates an event file and writes its header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P, chamber: u16, sector: u16) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&chamber.to_le_bytes())?;
        writer.write_all(&sector.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?;
        Ok(Self {
            writer,
            events_written: 0,
        })
    }

    /// Appends one event record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be written.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_event(&mut self, event: &ClusterEvent) -> Result<()> {
        self.writer.write_all(&(event.charge as f32).to_le_bytes())?;
        self.writer.write_all(&(event.max_adc as f32).to_le_bytes())?;
        self.writer.write_all(&event.time_slice.to_le_bytes())?;
        self.writer.write_all(&event.n_pixels.to_le_bytes())?;
        self.writer.write_all(&event.n_time_slices.to_le_bytes())?;
        self.writer.write_all(&event.n_pads.to_le_bytes())?;
        self.writer.write_all(&event.padrow.to_le_bytes())?;
        self.writer.write_all(&event.pad.to_le_bytes())?;
        self.events_written += 1;
        Ok(())
    }

    /// Returns the number of events written so far.
    #[must_use]
    pub fn events_written(&self) -> usize {
        self.events_written
    }

    /// Flushes buffered records to disk.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_event(charge: f64, pad: u16) -> ClusterEvent {
        ClusterEvent {
            charge,
            max_adc: 120.5,
            time_slice: 33,
            n_pixels: 9,
            n_time_slices: 4,
            n_pads: 3,
            padrow: 2,
            pad,
        }
    }

    #[test]
    fn test_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventFileWriter::create(file.path(), 2, 5).unwrap();
        writer.write_event(&sample_event(1500.25, 1)).unwrap();
        writer.write_event(&sample_event(2750.0, 7)).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.events_written(), 2);
        drop(writer);

        let reader = EventFileReader::open(file.path()).unwrap();
        assert_eq!(reader.chamber(), 2);
        assert_eq!(reader.sector(), 5);
        assert_eq!(reader.group(), GroupId::new(2, 5));
        assert_eq!(reader.event_count(), 2);

        let events: Vec<ClusterEvent> = reader.events().collect();
        assert!((events[0].charge - 1500.25).abs() < 1e-3);
        assert!((events[0].max_adc - 120.5).abs() < 1e-3);
        assert_eq!(events[0].time_slice, 33);
        assert_eq!(events[0].pad, 1);
        assert_eq!(events[1].pad, 7);
        assert_eq!(events[1].padrow, 2);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"NOPE00000000").unwrap();
        assert!(matches!(
            EventFileReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventFileWriter::create(file.path(), 1, 1).unwrap();
        writer.write_event(&sample_event(100.0, 1)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        // Chop three bytes off the last record.
        let mut bytes = std::fs::read(file.path()).unwrap();
        bytes.truncate(bytes.len() - 3);
        std::fs::write(file.path(), &bytes).unwrap();

        assert!(matches!(
            EventFileReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = NamedTempFile::new().unwrap();
        let writer = EventFileWriter::create(file.path(), 3, 1).unwrap();
        drop(writer);

        let reader = EventFileReader::open(file.path()).unwrap();
        assert_eq!(reader.event_count(), 0);
        assert_eq!(reader.events().count(), 0);
    }
}
