//! Deterministic loop-index to well-column mapping.
//!
//! Each inoculation transfers culture from three source columns into three
//! destination columns of a 96-well plate (12 columns x 8 rows). The plate is
//! split into three groups of `cycle_length` columns, and the loop counter
//! walks the groups in lockstep: transfer 1 goes column 1 -> 2 (and 5 -> 6,
//! 9 -> 10), transfer 2 goes 2 -> 3, and so on.
//!
//! At a plate boundary (`loop_num % cycle_length == 0`) the mapping
//! **reverses**: the last columns of the finished cycle become the sources
//! and the first columns of the fresh plate become the destinations. The
//! boundary constants below are carried over from the validated lab
//! procedure and must not be "corrected" for symmetry.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plate row letters, top to bottom.
pub const PLATE_ROWS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// Number of columns on an assay plate.
pub const PLATE_COLUMNS: u32 = 12;

/// Transfers per plate before moving to a fresh one.
///
/// Only the two lengths used by the lab procedures are admitted; the boundary
/// reversal constants are defined for exactly these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CycleLength {
    /// Three transfers per plate (columns in groups of three)
    Three,
    /// Four transfers per plate (columns in groups of four)
    Four,
}

impl CycleLength {
    /// The numeric cycle length.
    pub const fn get(self) -> u32 {
        match self {
            CycleLength::Three => 3,
            CycleLength::Four => 4,
        }
    }
}

impl fmt::Display for CycleLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl TryFrom<u8> for CycleLength {
    type Error = FlowError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(CycleLength::Three),
            4 => Ok(CycleLength::Four),
            other => Err(FlowError::Configuration(format!(
                "cycle_length must be 3 or 4, got {other}"
            ))),
        }
    }
}

impl From<CycleLength> for u8 {
    fn from(value: CycleLength) -> Self {
        value.get() as u8
    }
}

/// Source and destination columns for one inoculation transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferColumns {
    /// Columns to aspirate from
    pub source: [u32; 3],
    /// Columns to dispense into
    pub destination: [u32; 3],
}

impl TransferColumns {
    /// Expand the source columns to full 8-well columns, grouped by column
    /// for a multichannel transfer.
    pub fn source_wells(&self) -> Vec<Vec<String>> {
        expand_columns(&self.source)
    }

    /// Expand the destination columns to full 8-well columns, grouped by
    /// column for a multichannel transfer.
    pub fn destination_wells(&self) -> Vec<Vec<String>> {
        expand_columns(&self.destination)
    }
}

/// Determine source and destination columns for the given loop number.
///
/// With `mod = loop_num % cycle_length`:
/// - `mod != 0` (within-plate transfer): sources are
///   `[mod, mod + L, mod + 2L]`, destinations one column to the right.
/// - `mod == 0` (between-plate boundary): the reversed mapping - the last
///   columns of the cycle feed the first columns of the fresh plate.
pub fn transfer_columns(loop_num: u64, cycle_length: CycleLength) -> TransferColumns {
    let length = cycle_length.get();
    let mod_num = (loop_num % u64::from(length)) as u32;

    if mod_num == 0 {
        match cycle_length {
            CycleLength::Three => TransferColumns {
                source: [4, 7, 10],
                destination: [2, 5, 8],
            },
            CycleLength::Four => TransferColumns {
                source: [4, 8, 12],
                destination: [1, 5, 9],
            },
        }
    } else {
        TransferColumns {
            source: [mod_num, mod_num + length, mod_num + 2 * length],
            destination: [mod_num + 1, mod_num + 1 + length, mod_num + 1 + 2 * length],
        }
    }
}

/// Pair each column with rows A-H, yielding one well list per column.
fn expand_columns(columns: &[u32; 3]) -> Vec<Vec<String>> {
    columns
        .iter()
        .map(|column| {
            PLATE_ROWS
                .iter()
                .map(|row| format!("{row}{column}"))
                .collect()
        })
        .collect()
}
