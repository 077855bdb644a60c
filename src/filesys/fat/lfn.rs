//! Long filename (VFAT) continuation records

use super::constants::*;
use arrayvec::ArrayVec;

/// One 32-byte long-name record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongNameFragment {
    /// Ordinal in the low 5 bits, 0x40 on the last fragment
    pub sequence: u8,

    /// Characters 1-5
    pub name1: [u16; 5],

    /// Always the long-name attribute combination
    pub attributes: u8,

    pub entry_type: u8,

    /// Checksum of the short name this fragment belongs to
    pub checksum: u8,

    /// Characters 6-11
    pub name2: [u16; 6],

    /// Always zero
    pub first_cluster: u16,

    /// Characters 12-13
    pub name3: [u16; 2],
}

fn utf16_span<const N: usize>(bytes: &[u8]) -> [u16; N] {
    let mut units = [0u16; N];
    for (unit, pair) in units.iter_mut().zip(bytes.chunks_exact(2)) {
        *unit = u16::from_le_bytes([pair[0], pair[1]]);
    }
    units
}

impl LongNameFragment {
    /// Reinterprets a raw directory record as a long-name fragment
    pub fn parse(raw: &[u8; 32]) -> LongNameFragment {
        LongNameFragment {
            sequence: raw[0],
            name1: utf16_span(&raw[1..11]),
            attributes: raw[11],
            entry_type: raw[12],
            checksum: raw[13],
            name2: utf16_span(&raw[14..26]),
            first_cluster: u16::from_le_bytes([raw[26], raw[27]]),
            name3: utf16_span(&raw[28..32]),
        }
    }

    /// Position of this fragment in the name, starting at 1
    pub fn ordinal(&self) -> u8 {
        self.sequence & LFN_ORDINAL_MASK
    }

    /// Returns true for the fragment holding the end of the name
    pub fn is_last(&self) -> bool {
        self.sequence & LFN_LAST_FRAGMENT != 0
    }

    /// The 13 UTF-16 code units carried by this fragment, in name order
    pub fn units(&self) -> [u16; LFN_UNITS_PER_FRAGMENT] {
        let mut units = [0u16; LFN_UNITS_PER_FRAGMENT];
        units[..5].copy_from_slice(&self.name1);
        units[5..11].copy_from_slice(&self.name2);
        units[11..].copy_from_slice(&self.name3);
        units
    }
}

/// Joins fragments collected in on-disk order into the name they spell
///
/// Fragments are stored last-first, so they are walked in reverse. The
/// result stops at the first NUL unit; unpaired surrogates decode lossily.
pub fn assemble_long_name(fragments: &[LongNameFragment]) -> String {
    let mut units: ArrayVec<u16, { LFN_MAX_FRAGMENTS * LFN_UNITS_PER_FRAGMENT }> = ArrayVec::new();

    'outer: for fragment in fragments.iter().rev() {
        for unit in fragment.units() {
            if unit == 0 || units.try_push(unit).is_err() {
                break 'outer;
            }
        }
    }

    String::from_utf16_lossy(&units)
}

/// Checksum of an 11-byte short name as stored in its long-name fragments
pub fn short_name_checksum(name: &[u8; SHORT_NAME_LENGTH]) -> u8 {
    name.iter()
        .fold(0u8, |sum, &b| (sum >> 1).wrapping_add(sum << 7).wrapping_add(b))
}
