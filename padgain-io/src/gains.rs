//! Gain table persistence: JSON for round trips, XML for downstream.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use padgain_core::{ChannelId, GainTable};

use crate::Result;

/// One row of a serialized gain table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainRecord {
    /// Chamber identifier.
    pub chamber: u16,
    /// Sector identifier.
    pub sector: u16,
    /// Padrow identifier.
    pub padrow: u16,
    /// Pad number.
    pub pad: u16,
    /// Gain value, or the invalid sentinel.
    pub gain: f64,
}

/// Flattens a gain table into serializable rows, in channel order.
#[must_use]
pub fn to_records(gains: &GainTable) -> Vec<GainRecord> {
    gains
        .iter()
        .map(|(id, gain)| GainRecord {
            chamber: id.chamber,
            sector: id.sector,
            padrow: id.padrow,
            pad: id.pad,
            gain,
        })
        .collect()
}

/// Rebuilds a gain table from serialized rows.
#[must_use]
pub fn from_records(records: &[GainRecord]) -> GainTable {
    records
        .iter()
        .map(|record| {
            (
                ChannelId::new(record.chamber, record.sector, record.padrow, record.pad),
                record.gain,
            )
        })
        .collect()
}

/// Writes a gain table as JSON.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_gain_json<P: AsRef<Path>>(path: P, gains: &GainTable) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &to_records(gains))?;
    writer.flush()?;
    Ok(())
}

/// Reads a gain table from JSON, e.g. a previous run's output for
/// update mode.
///
/// # Errors
/// Returns an error if the file cannot be opened or parsed.
pub fn read_gain_json<P: AsRef<Path>>(path: P) -> Result<GainTable> {
    let file = File::open(path)?;
    let records: Vec<GainRecord> = serde_json::from_reader(BufReader::new(file))?;
    Ok(from_records(&records))
}

/// Writes the XML gain document consumed by the reconstruction side.
///
/// Channels appear in chamber, sector, padrow, pad order; each padrow's
/// gains are one whitespace-separated list.
///
/// # Errors
/// Returns an error if writing fails.
pub fn write_gain_xml<W: Write>(writer: &mut W, gains: &GainTable) -> Result<()> {
    writeln!(writer, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
    writeln!(writer)?;
    writeln!(writer, "<PadByPadGain>")?;

    let mut previous: Option<ChannelId> = None;
    for (id, gain) in gains.iter() {
        match previous {
            None => {
                open_chamber(writer, id)?;
                open_sector(writer, id)?;
                open_padrow(writer, id)?;
            }
            Some(last) if last.chamber != id.chamber => {
                close_padrow(writer)?;
                close_sector(writer)?;
                close_chamber(writer)?;
                open_chamber(writer, id)?;
                open_sector(writer, id)?;
                open_padrow(writer, id)?;
            }
            Some(last) if last.sector != id.sector => {
                close_padrow(writer)?;
                close_sector(writer)?;
                open_sector(writer, id)?;
                open_padrow(writer, id)?;
            }
            Some(last) if last.padrow != id.padrow => {
                close_padrow(writer)?;
                open_padrow(writer, id)?;
            }
            Some(_) => {}
        }
        write!(writer, "{gain} ")?;
        previous = Some(id);
    }
    if previous.is_some() {
        close_padrow(writer)?;
        close_sector(writer)?;
        close_chamber(writer)?;
    }

    writeln!(writer, "</PadByPadGain>")?;
    Ok(())
}

/// Writes the XML gain document to a file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_gain_xml_file<P: AsRef<Path>>(path: P, gains: &GainTable) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_gain_xml(&mut writer, gains)?;
    writer.flush()?;
    Ok(())
}

/// Writes per-channel responses and gains as CSV, for diagnostics.
///
/// Channels without a response estimate get an empty response field.
///
/// # Errors
/// Returns an error if writing fails.
pub fn write_results_csv<W: Write>(
    writer: &mut W,
    gains: &GainTable,
    responses: &BTreeMap<ChannelId, f64>,
) -> Result<()> {
    writeln!(writer, "chamber,sector,padrow,pad,response,gain")?;
    for (id, gain) in gains.iter() {
        match responses.get(&id) {
            Some(response) => writeln!(
                writer,
                "{},{},{},{},{response},{gain}",
                id.chamber, id.sector, id.padrow, id.pad
            )?,
            None => writeln!(
                writer,
                "{},{},{},{},,{gain}",
                id.chamber, id.sector, id.padrow, id.pad
            )?,
        }
    }
    Ok(())
}

fn open_chamber<W: Write>(writer: &mut W, id: ChannelId) -> Result<()> {
    writeln!(writer, "  <Chamber id=\"{}\">", id.chamber)?;
    Ok(())
}

fn close_chamber<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "  </Chamber>")?;
    Ok(())
}

fn open_sector<W: Write>(writer: &mut W, id: ChannelId) -> Result<()> {
    writeln!(writer, "    <Sector id=\"{}\">", id.sector)?;
    Ok(())
}

fn close_sector<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "    </Sector>")?;
    Ok(())
}

fn open_padrow<W: Write>(writer: &mut W, id: ChannelId) -> Result<()> {
    writeln!(writer, "      <Padrow id=\"{}\">", id.padrow)?;
    write!(writer, "        <PadGains> ")?;
    Ok(())
}

fn close_padrow<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "</PadGains>")?;
    writeln!(writer, "      </Padrow>")?;
    Ok(())
}
