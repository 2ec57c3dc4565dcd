//! Channel selection and SCAN register packing
//!
//! Channel slots 0..=15 are the SCAN register bits:
//!
//! | bits   | channels                                   |
//! |--------|--------------------------------------------|
//! | 0..=7  | CH0..CH7 single-ended against AGND         |
//! | 8..=11 | CH0-CH1, CH2-CH3, CH4-CH5, CH6-CH7          |
//! | 12     | temperature diode                          |
//! | 13     | AVDD                                       |
//! | 14     | VCM                                        |
//! | 15     | offset                                     |
//!
//! Slot 16 is the free-mux channel: SCAN is cleared and the MUX register selects the inputs.
//!
//! The device converts the selected channels from the highest set bit to the lowest.
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::register::{Delay, Scan};
use crate::Invalid;

/// Internal reference channels, wired on every variant.
pub const INTERNAL_MASK: u32 = 0xf000;

/// Part number, with its device ID register value.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive, Default,
)]
#[repr(u16)]
pub enum Variant {
    Mcp3561 = 0x000c,
    Mcp3562 = 0x000d,
    #[default]
    Mcp3564 = 0x000f,
}

impl Variant {
    /// Number of external single-ended inputs.
    pub fn inputs(self) -> u8 {
        match self {
            Self::Mcp3561 => 2,
            Self::Mcp3562 => 4,
            Self::Mcp3564 => 8,
        }
    }

    /// Scan channels wired to external inputs: single-ended and differential pairs.
    pub fn external_mask(self) -> u32 {
        let n = self.inputs() as u32;
        ((1 << n) - 1) | (((1 << (n / 2)) - 1) << 8)
    }

    pub fn scan_mask(self) -> u32 {
        self.external_mask() | INTERNAL_MASK
    }
}

/// A set of channel slots. The free-mux slot is exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChannelSelection(u32);

impl ChannelSelection {
    pub const FREE_MUX: u8 = 16;

    pub fn new(mask: u32) -> Result<Self, Invalid> {
        let free_mux = 1 << Self::FREE_MUX;
        if mask == 0 || mask >> (Self::FREE_MUX + 1) != 0 {
            return Err(Invalid::Selection(mask));
        }
        if mask & free_mux != 0 && mask != free_mux {
            return Err(Invalid::Selection(mask));
        }
        Ok(Self(mask))
    }

    pub fn free_mux() -> Self {
        Self(1 << Self::FREE_MUX)
    }

    pub fn mask(&self) -> u32 {
        self.0
    }

    pub fn is_free_mux(&self) -> bool {
        self.0 == 1 << Self::FREE_MUX
    }

    /// Number of conversions per sweep.
    pub fn len(&self) -> usize {
        self.0.count_ones() as _
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Channels in device conversion order.
    pub fn drain(&self) -> Drain {
        Drain(self.0)
    }
}

/// Yields the highest remaining channel first.
#[derive(Copy, Clone, Debug)]
pub struct Drain(u32);

impl Iterator for Drain {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let ch = highest(self.0)?;
        self.0 &= !(1 << ch);
        Some(ch)
    }
}

/// Highest set bit of a channel mask.
pub fn highest(mask: u32) -> Option<u8> {
    (mask != 0).then(|| (31 - mask.leading_zeros()) as u8)
}

/// Pack a selection into the SCAN register for a variant.
pub fn pack(
    selection: ChannelSelection,
    variant: Variant,
    delay: Delay,
) -> Result<Scan, Invalid> {
    if selection.is_free_mux() {
        return Ok(Scan::DEFAULT);
    }
    if selection.mask() & !variant.scan_mask() != 0 {
        return Err(Invalid::Selection(selection.mask()));
    }
    Ok(Scan::DEFAULT
        .with_channels(selection.mask() as u16)
        .with_delay(delay))
}

/// Selection a SCAN register value converts. No scan channels is the free-mux channel.
pub fn unpack(scan: Scan) -> ChannelSelection {
    match scan.channels() {
        0 => ChannelSelection::free_mux(),
        channels => ChannelSelection(channels as u32),
    }
}
