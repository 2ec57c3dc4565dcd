//! Acquisition sequencing
//!
//! One acquisition runs from [State::Idle] through sweeps of the selected channels to
//! [State::Completed] or [State::Failed]. Within a sweep the channels are read highest first,
//! one per DRDY edge. At each sweep boundary a [Sequencer] decides whether to continue into the
//! rest of the buffer, repeat from its start, or finish.
use fugit::MicrosDurationU32;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::register::{ConvMode, DataFormat, Osr};
use crate::scan::{highest, ChannelSelection};
use crate::Error;

/// Bound on the wait for a single DRDY edge on top of the expected sample time.
pub const READY_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::secs(5);

/// Output sample width.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum Resolution {
    /// 24 bit two's complement, packed into 3 bytes
    #[default]
    Bits24 = 24,
    /// 24 bit scale sign extended to 32 bits, representing up to twice full scale
    Bits32 = 32,
}

impl Resolution {
    /// Bytes per sample, in the output buffer and on the bus.
    pub fn stride(self) -> usize {
        match self {
            Self::Bits24 => 3,
            Self::Bits32 => 4,
        }
    }

    pub fn data_format(self) -> DataFormat {
        match self {
            Self::Bits24 => DataFormat::Bits24,
            Self::Bits32 => DataFormat::Bits32SignExtended,
        }
    }

    /// Decode a big-endian ADCDATA payload held in the first [Self::stride()] bytes.
    pub fn decode_raw(self, raw: [u8; 4]) -> i32 {
        match self {
            Self::Bits24 => i32::from_be_bytes([raw[0], raw[1], raw[2], 0]) >> 8,
            Self::Bits32 => i32::from_be_bytes(raw),
        }
    }

    /// Output buffer encoding of a sample: host byte order, the first [Self::stride()] bytes
    /// are significant.
    pub fn encode(self, sample: i32) -> [u8; 4] {
        let b = sample.to_ne_bytes();
        match self {
            Self::Bits32 => b,
            Self::Bits24 if cfg!(target_endian = "little") => [b[0], b[1], b[2], 0],
            Self::Bits24 => [b[1], b[2], b[3], 0],
        }
    }

    /// Inverse of [Self::encode()].
    pub fn decode(self, slot: [u8; 4]) -> i32 {
        match self {
            Self::Bits32 => i32::from_ne_bytes(slot),
            Self::Bits24 if cfg!(target_endian = "little") => {
                i32::from_ne_bytes([0, slot[0], slot[1], slot[2]]) >> 8
            }
            Self::Bits24 => i32::from_ne_bytes([slot[0], slot[1], slot[2], 0]) >> 8,
        }
    }
}

/// Who triggers conversions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// The device free-runs and re-scans after the TIMER interval. One start command per
    /// acquisition.
    #[default]
    DeviceTimer,
    /// Every sweep is a one-shot conversion started by the host.
    HostTimer,
}

impl RunMode {
    pub fn conv_mode(self) -> ConvMode {
        match self {
            Self::DeviceTimer => ConvMode::Continuous,
            Self::HostTimer => ConvMode::OneShotStandby,
        }
    }

    /// Whether the device keeps converting until told to stand by.
    pub fn is_continuous(self) -> bool {
        self == Self::DeviceTimer
    }
}

/// A sampling request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Channel slot mask, see [ChannelSelection]
    pub channels: u32,
    /// Resolution in bits
    pub resolution: u8,
    /// Oversampling ratio, `None` to keep the current one
    pub oversampling: Option<Osr>,
    /// Interval between the end of one sweep and the start of the next
    pub interval_us: Option<u32>,
    /// Enable offset cancellation (auto-zero mux), doubling the sample time
    pub calibrate: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            channels: 1,
            resolution: 24,
            oversampling: None,
            interval_us: None,
            calibrate: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SweepAction {
    /// Next sweep into the following buffer slots
    Continue,
    /// Next sweep from the start of the buffer
    Repeat,
    Finish,
}

/// Decides what follows a completed sweep.
pub trait Sequencer {
    /// `sweeps` is the number of sweeps completed so far in this acquisition.
    fn sweep_complete(&mut self, sweeps: usize) -> SweepAction;
}

/// A fixed number of sweeps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Sweeps {
    pub count: usize,
    /// Overwrite the buffer from the start on every sweep
    pub repeat: bool,
}

impl Sweeps {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            repeat: false,
        }
    }
}

impl Sequencer for Sweeps {
    fn sweep_complete(&mut self, sweeps: usize) -> SweepAction {
        if sweeps >= self.count {
            SweepAction::Finish
        } else if self.repeat {
            SweepAction::Repeat
        } else {
            SweepAction::Continue
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum State {
    Idle,
    RunningSweep,
    AwaitingNextSweep,
    Completed,
    Failed(Error),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::RunningSweep | Self::AwaitingNextSweep)
    }
}

/// Transient state of one acquisition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AcquisitionSequence {
    selection: ChannelSelection,
    remaining: u32,
    offset: usize,
    resolution: Resolution,
    continuous: bool,
    sweeps: usize,
}

impl AcquisitionSequence {
    pub fn new(selection: ChannelSelection, resolution: Resolution, continuous: bool) -> Self {
        Self {
            selection,
            remaining: selection.mask(),
            offset: 0,
            resolution,
            continuous,
            sweeps: 0,
        }
    }

    /// Channel the next result belongs to.
    pub fn channel(&self) -> Option<u8> {
        highest(self.remaining)
    }

    /// Whether no channel of the current sweep has been read yet.
    pub fn at_sweep_start(&self) -> bool {
        self.remaining == self.selection.mask()
    }

    /// Write offset of the next result.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn stride(&self) -> usize {
        self.resolution.stride()
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Bytes one sweep occupies.
    pub fn sweep_bytes(&self) -> usize {
        self.selection.len() * self.stride()
    }

    /// Results in the buffer.
    pub fn samples(&self) -> usize {
        self.offset / self.stride()
    }

    /// Store the result for the current channel and advance.
    ///
    /// Returns `true` when this completes the sweep.
    pub fn push(&mut self, buffer: &mut [u8], sample: i32) -> Result<bool, Error> {
        let ch = self.channel().ok_or(Error::BufferFull)?;
        let stride = self.stride();
        let slot = buffer
            .get_mut(self.offset..self.offset + stride)
            .ok_or(Error::BufferFull)?;
        slot.copy_from_slice(&self.resolution.encode(sample)[..stride]);
        self.offset += stride;
        self.remaining &= !(1 << ch);
        if self.remaining == 0 {
            self.sweeps += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Re-arm for another sweep. With `rewind` the buffer is overwritten from the start.
    pub fn next_sweep(&mut self, rewind: bool) {
        self.remaining = self.selection.mask();
        if rewind {
            self.offset = 0;
        }
    }
}

/// Read a sample back from a 3 or 4 byte slot of the output buffer.
///
/// `None` if the slot length is not a sample stride.
pub fn decode_sample(slot: &[u8]) -> Option<i32> {
    let resolution = match slot.len() {
        3 => Resolution::Bits24,
        4 => Resolution::Bits32,
        _ => return None,
    };
    let mut b = [0; 4];
    b[..slot.len()].copy_from_slice(slot);
    Some(resolution.decode(b))
}
