//! Conversion timing
//!
//! The modulator runs on DMCLK = MCLK / 2^(PRE + 2). The oversampling ratio OSR = OSR3 * OSR1
//! where OSR3 is the SINC3 decimation and OSR1 the subsequent SINC1 decimation.
//!
//! All estimates are in DMCLK periods before scaling to time.
use arbitrary_int::{u24, Number};

use crate::register::{Osr, Prescale};
use crate::Invalid;

/// Nominal internal oscillator frequency
pub const INTERNAL_MCLK_HZ: u32 = 3_300_000;

/// OSR3 / 32 by OSR code
pub const OSR3_DIV32: [u32; 16] =
    [1, 2, 4, 8, 16, 32, 64, 128, 128, 128, 128, 128, 128, 128, 128, 128];

/// OSR1 by OSR code
pub const OSR1: [u32; 16] = [1, 1, 1, 1, 1, 1, 1, 1, 2, 4, 5, 6, 10, 12, 20, 24];

/// Master clock and prescaler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Clock {
    pub mclk_hz: u32,
    pub prescale: Prescale,
}

impl Clock {
    /// Log2 of the MCLK to DMCLK ratio.
    pub fn shift(&self) -> u32 {
        self.prescale.raw_value().value() as u32 + 2
    }

    pub fn dmclk_hz(&self) -> u32 {
        self.mclk_hz >> self.shift()
    }
}

/// DMCLK periods for the first conversion result, including filter settling.
pub fn conversion_cycles(osr: Osr) -> u32 {
    let osr3 = OSR3_DIV32[osr.index()];
    let osr1 = OSR1[osr.index()];
    32 * (3 * osr3 + (osr1 - 1) * osr3)
}

/// DMCLK periods between consecutive results in continuous conversion.
pub fn data_rate_cycles(osr: Osr) -> u32 {
    32 * OSR3_DIV32[osr.index()] * OSR1[osr.index()]
}

/// Diagnostic timing estimate for an OSR and clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Timing {
    /// First conversion time
    pub conversion_us: u32,
    /// Output data rate
    pub data_rate_hz: u32,
}

impl Timing {
    /// Saturates for clocks too slow to express the conversion time.
    pub fn new(osr: Osr, clock: &Clock) -> Self {
        let dmclk = clock.dmclk_hz().max(1) as u64;
        let conversion_us = conversion_cycles(osr) as u64 * 1_000_000 / dmclk;
        Self {
            conversion_us: u32::try_from(conversion_us).unwrap_or(u32::MAX),
            data_rate_hz: (dmclk / data_rate_cycles(osr) as u64) as _,
        }
    }
}

/// Convert a sample interval to TIMER register ticks (DMCLK periods).
///
/// `shift` is the MCLK to DMCLK ratio as a power of two. Intervals that don't fit the 24 bit
/// register are rejected.
pub fn interval_to_ticks(
    interval_us: u32,
    mclk_hz: u32,
    shift: u32,
) -> Result<u24, Invalid> {
    let ticks = ((interval_us as u64 * mclk_hz as u64) >> shift) / 1_000_000;
    if ticks > u24::MAX.value() as u64 {
        return Err(Invalid::Interval(interval_us));
    }
    Ok(u24::new(ticks as _))
}

/// Whether the oversampling ratio is fixed by the integration or chosen per request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum OversamplingPolicy {
    Fixed(Osr),
    #[default]
    PerRequest,
}

impl OversamplingPolicy {
    /// OSR for a request. Without a request the `current` setting is kept.
    pub fn resolve(&self, requested: Option<Osr>, current: Osr) -> Result<Osr, Invalid> {
        match (self, requested) {
            (Self::Fixed(osr), None) => Ok(*osr),
            (Self::Fixed(osr), Some(r)) if r == *osr => Ok(r),
            (Self::Fixed(osr), Some(_)) => Err(Invalid::Oversampling(*osr)),
            (Self::PerRequest, r) => Ok(r.unwrap_or(current)),
        }
    }
}
