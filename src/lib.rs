#![cfg_attr(not(test), no_std)]
//! MCP3561/2/4 delta-sigma ADC driver
//!
//! # Design
//!
//! The MCP356x family converts one or more channels in a programmable sequence and signals each
//! result on the IRQ (DRDY) pin. This crate drives one acquisition at a time through a
//! [DeviceRegisterCache]-backed register interface:
//!
//! 1. [channel::validate()] checks a channel request (gain, free-mux inputs, scan delay).
//! 2. [scan::pack()] turns the requested channel set into the SCAN register layout.
//! 3. [timing] converts the oversampling ratio and sample interval into register values.
//! 4. [Mcp356x::start()] writes only the registers that changed and triggers conversion.
//! 5. [Mcp356x::poll_for_completion()] waits for each DRDY edge and reads results into the
//!    caller's buffer in device scan order (highest channel first).
//!
//! The DRDY interrupt handler only calls [ReadySignal::give()].
//!
//! ## Run modes
//!
//! In [RunMode::DeviceTimer] the converter free-runs, re-scanning after the TIMER interval. In
//! [RunMode::HostTimer] every sweep is a one-shot conversion re-triggered by the host.
//!
//! Note: the free-mux channel (16) does not scan. In device timer mode it converts
//! continuously without an inter-sample interval. In host timer mode each sweep is a single
//! one-shot conversion, which caps its achievable rate below that of continuous conversion.
pub mod acquisition;
pub mod cache;
pub mod channel;
pub mod config;
mod device;
pub mod register;
pub mod scan;
pub mod timing;

pub use acquisition::{
    decode_sample, Request, Resolution, RunMode, Sequencer, State, SweepAction, Sweeps,
};
pub use cache::DeviceRegisterCache;
pub use channel::ChannelConfig;
pub use config::Config;
pub use device::Mcp356x;
pub use ready_signal::ReadySignal;
pub use register::{Gain, Osr};
pub use scan::{ChannelSelection, Variant};

use embedded_hal::spi;

/// Reason a configuration or request was rejected.
///
/// Always detected before any bus write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Invalid {
    #[error("Channel {0} out of range")]
    Channel(u8),
    #[error("Single-ended request")]
    SingleEnded,
    #[error("Mux input {0:#x}")]
    Mux(u8),
    #[error("Inter-channel delay {0}")]
    Delay(u16),
    #[error("Gain code {0}")]
    Gain(u8),
    #[error("Resolution {0} bits")]
    Resolution(u8),
    #[error("Channel selection {0:#x}")]
    Selection(u32),
    #[error("Sample interval {0} us")]
    Interval(u32),
    #[error("Free-mux channel with sample interval in device timer mode")]
    FreeMuxInterval,
    #[error("Oversampling fixed to {0:?}")]
    Oversampling(Osr),
    #[error("Acquisition in progress")]
    Busy,
    #[error("No acquisition started")]
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(Invalid),
    #[error("SPI")]
    Transport(spi::ErrorKind),
    #[error("No new conversion data")]
    DataNotReady,
    #[error("Data ready timeout")]
    Timeout,
    #[error("Invalid device ID {0:#06x}")]
    Id(u16),
    #[error("Register width {0}")]
    Width(usize),
    #[error("Output buffer full")]
    BufferFull,
}

impl<E: spi::Error> From<E> for Error {
    fn from(value: E) -> Self {
        Self::Transport(value.kind())
    }
}

impl From<Invalid> for Error {
    fn from(value: Invalid) -> Self {
        Self::InvalidConfiguration(value)
    }
}
