//! Flat enumeration of the detector's readout channels.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, GroupId};

/// One sector: its identifier and the pad count of each padrow.
///
/// Padrows are numbered 1..=N in declaration order; pads are numbered
/// 1..=`pads` within each padrow.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectorLayout {
    /// Sector identifier.
    pub id: u16,
    /// Pads per padrow; entry `i` describes padrow `i + 1`.
    pub pads_per_padrow: Vec<u16>,
}

/// One chamber and its sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChamberLayout {
    /// Chamber identifier.
    pub id: u16,
    /// Sectors of the chamber.
    pub sectors: Vec<SectorLayout>,
}

/// The set of channels a calibration run covers.
///
/// This is a flat enumeration, not a geometric model: it answers which
/// channels exist and nothing more. Channel iteration follows the
/// declaration order of chambers and sectors, so runs over the same
/// geometry visit channels identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    /// Chambers covered by the run.
    pub chambers: Vec<ChamberLayout>,
}

impl Geometry {
    /// Creates an empty geometry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over every channel in the geometry.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.chambers.iter().flat_map(|chamber| {
            chamber.sectors.iter().flat_map(move |sector| {
                sector
                    .pads_per_padrow
                    .iter()
                    .enumerate()
                    .flat_map(move |(row, &pads)| {
                        #[allow(clippy::cast_possible_truncation)]
                        let padrow = (row + 1) as u16;
                        (1..=pads)
                            .map(move |pad| ChannelId::new(chamber.id, sector.id, padrow, pad))
                    })
            })
        })
    }

    /// Iterates over every group in the geometry.
    pub fn groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.chambers.iter().flat_map(|chamber| {
            chamber
                .sectors
                .iter()
                .map(move |sector| GroupId::new(chamber.id, sector.id))
        })
    }

    /// Returns true if the group is part of this geometry.
    #[must_use]
    pub fn contains_group(&self, group: GroupId) -> bool {
        self.chambers.iter().any(|chamber| {
            chamber.id == group.chamber
                && chamber.sectors.iter().any(|sector| sector.id == group.sector)
        })
    }

    /// Returns the total number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.chambers
            .iter()
            .flat_map(|chamber| &chamber.sectors)
            .flat_map(|sector| &sector.pads_per_padrow)
            .map(|&pads| pads as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_sector_geometry() -> Geometry {
        Geometry {
            chambers: vec![ChamberLayout {
                id: 1,
                sectors: vec![
                    SectorLayout {
                        id: 1,
                        pads_per_padrow: vec![2, 3],
                    },
                    SectorLayout {
                        id: 2,
                        pads_per_padrow: vec![1],
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_channel_enumeration() {
        let geometry = two_sector_geometry();
        let channels: Vec<ChannelId> = geometry.channels().collect();
        assert_eq!(channels.len(), 6);
        assert_eq!(geometry.channel_count(), 6);
        assert_eq!(channels[0], ChannelId::new(1, 1, 1, 1));
        assert_eq!(channels[1], ChannelId::new(1, 1, 1, 2));
        assert_eq!(channels[2], ChannelId::new(1, 1, 2, 1));
        assert_eq!(channels[5], ChannelId::new(1, 2, 1, 1));
    }

    #[test]
    fn test_groups_and_membership() {
        let geometry = two_sector_geometry();
        let groups: Vec<GroupId> = geometry.groups().collect();
        assert_eq!(groups, vec![GroupId::new(1, 1), GroupId::new(1, 2)]);
        assert!(geometry.contains_group(GroupId::new(1, 2)));
        assert!(!geometry.contains_group(GroupId::new(1, 3)));
        assert!(!geometry.contains_group(GroupId::new(2, 1)));
    }
}
