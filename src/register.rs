//! MCP356x register map and command codec
//!
//! Every bus transaction starts with a one-byte command: the 2-bit device address, a 4-bit
//! register address (or fast command code) and a 2-bit opcode. While the command byte is
//! clocked in, the device clocks out its [Status] byte. Register payloads are big-endian.
use arbitrary_int::{u2, u24, u3, u4, Number};
use bitbybit::{bitenum, bitfield};
use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Addr {
    AdcData = 0x0,
    Config0 = 0x1,
    Config1 = 0x2,
    Config2 = 0x3,
    Config3 = 0x4,
    Irq = 0x5,
    Mux = 0x6,
    Scan = 0x7,
    Timer = 0x8,
    OffsetCal = 0x9,
    GainCal = 0xa,
    Lock = 0xd,
    DeviceId = 0xe,
    CrcCfg = 0xf,
}

impl Addr {
    pub fn index(self) -> u4 {
        u4::new(self as u8)
    }
}

/// Fast commands share the address field of the command byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FastCommand {
    Start = 0xa,
    Standby = 0xb,
    Shutdown = 0xc,
    FullShutdown = 0xd,
    Reset = 0xe,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum Opcode {
    Fast = 0,
    StaticRead = 1,
    IncrementalWrite = 2,
    IncrementalRead = 3,
}

#[bitfield(u8, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Command {
    #[bits(0..=1, rw)]
    pub opcode: Opcode,
    #[bits(2..=5, rw)]
    pub addr: u4,
    #[bits(6..=7, rw)]
    pub device: u2,
}

/// Build the command byte for a transaction.
pub fn encode_command(device: u2, index: u4, opcode: Opcode) -> u8 {
    Command::new_with_raw_value(0)
        .with_device(device)
        .with_addr(index)
        .with_opcode(opcode)
        .raw_value()
}

/// Left-justify the low `width` bytes of `value` into a big-endian buffer.
pub fn pack_value(value: u32, width: usize) -> Result<Vec<u8, 4>, Error> {
    if width == 0 || width > 4 {
        return Err(Error::Width(width));
    }
    Vec::from_slice(&value.to_be_bytes()[4 - width..]).map_err(|_| Error::Width(width))
}

/// Big-endian bytes to value. At most the last four bytes contribute.
pub fn unpack_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// Status byte clocked out during every command byte.
#[bitfield(u8)]
#[derive(Debug, PartialEq)]
pub struct Status {
    /// Power-on reset status, active low
    #[bit(0, r)]
    pub por_n: bool,
    /// CRC configuration status, active low
    #[bit(1, r)]
    pub crccfg_n: bool,
    /// Conversion data ready, active low
    #[bit(2, r)]
    pub dr_n: bool,
    #[bits(4..=5, r)]
    pub address: u2,
}

impl Status {
    pub fn data_ready(&self) -> bool {
        !self.dr_n()
    }
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum AdcMode {
    Shutdown = 0,
    _Shutdown = 1,
    Standby = 2,
    Conversion = 3,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum ClkSel {
    External = 0,
    _External = 1,
    Internal = 2,
    InternalOutput = 3,
}

#[bitfield(u8, default = 0xc0)]
#[derive(Debug, PartialEq)]
pub struct Config0 {
    #[bits(0..=1, rw)]
    pub adc_mode: AdcMode,
    /// Burn-out current source
    #[bits(2..=3, rw)]
    pub cs_sel: u2,
    #[bits(4..=5, rw)]
    pub clk_sel: ClkSel,
    /// Must stay non-zero, zero selects full shutdown
    #[bits(6..=7, rw)]
    pub config0: u2,
}

/// AMCLK = MCLK / 2^PRE
#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Prescale {
    #[default]
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
}

/// Oversampling ratio
#[bitenum(u4, exhaustive = true)]
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Osr {
    O32 = 0,
    O64 = 1,
    O128 = 2,
    O256 = 3,
    O512 = 4,
    O1024 = 5,
    O2048 = 6,
    O4096 = 7,
    O8192 = 8,
    O16384 = 9,
    O20480 = 10,
    O24576 = 11,
    O40960 = 12,
    O49152 = 13,
    O81920 = 14,
    O98304 = 15,
}

impl Osr {
    pub fn index(self) -> usize {
        self.raw_value().value() as usize
    }
}

#[bitfield(u8, default = 0x0c)]
#[derive(Debug, PartialEq)]
pub struct Config1 {
    #[bits(2..=5, rw)]
    pub osr: Osr,
    #[bits(6..=7, rw)]
    pub prescale: Prescale,
}

#[bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    G1_3 = 0,
    G1 = 1,
    G2 = 2,
    G4 = 3,
    G8 = 4,
    G16 = 5,
    G32 = 6,
    G64 = 7,
}

impl Gain {
    /// Gain from its register code, `None` outside the eight steps.
    pub fn from_code(code: u8) -> Option<Self> {
        (code <= u3::MAX.value()).then(|| Self::new_with_raw_value(u3::new(code)))
    }
}

#[bitfield(u8, default = 0x8b)]
#[derive(Debug, PartialEq)]
pub struct Config2 {
    /// Reads back as 0b11
    #[bits(0..=1, rw)]
    pub reserved: u2,
    /// Auto-zeroing mux: alternate input polarity to cancel offset
    #[bit(2, rw)]
    pub az_mux: bool,
    #[bits(3..=5, rw)]
    pub gain: Gain,
    #[bits(6..=7, rw)]
    pub boost: u2,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum ConvMode {
    OneShotShutdown = 0,
    _OneShotShutdown = 1,
    OneShotStandby = 2,
    Continuous = 3,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum DataFormat {
    /// 24 bit two's complement
    Bits24 = 0,
    /// 24 bit left justified in 32
    Bits32Left = 1,
    /// 25 bit (over-range) sign extended to 32
    Bits32SignExtended = 2,
    /// Sign extended with channel id in the top nibble
    Bits32ChannelId = 3,
}

#[bitfield(u8, default = 0x00)]
#[derive(Debug, PartialEq)]
pub struct Config3 {
    #[bit(0, rw)]
    pub en_gaincal: bool,
    #[bit(1, rw)]
    pub en_offcal: bool,
    #[bit(2, rw)]
    pub en_crccom: bool,
    #[bit(3, rw)]
    pub crc_format: bool,
    #[bits(4..=5, rw)]
    pub data_format: DataFormat,
    #[bits(6..=7, rw)]
    pub conv_mode: ConvMode,
}

#[bitfield(u8, default = 0x77)]
#[derive(Debug, PartialEq)]
pub struct Irq {
    /// Conversion start interrupt
    #[bit(0, rw)]
    pub en_stp: bool,
    #[bit(1, rw)]
    pub en_fastcmd: bool,
    /// IRQ pin inactive state: push-pull high instead of high-Z
    #[bit(2, rw)]
    pub inactive_high: bool,
    /// Output MDAT instead of IRQ
    #[bit(3, rw)]
    pub mdat: bool,
    #[bit(4, r)]
    pub por_n: bool,
    #[bit(5, r)]
    pub crccfg_n: bool,
    #[bit(6, r)]
    pub dr_n: bool,
}

/// Mux input codes. 0..=7 are the external CH0..CH7 inputs.
pub mod mux {
    pub const AGND: u8 = 0x8;
    pub const AVDD: u8 = 0x9;
    pub const RESERVED: u8 = 0xa;
    pub const REFIN_P: u8 = 0xb;
    pub const REFIN_N: u8 = 0xc;
    pub const TEMP_P: u8 = 0xd;
    pub const TEMP_M: u8 = 0xe;
    pub const VCM: u8 = 0xf;
}

#[bitfield(u8, default = 0x01)]
#[derive(Debug, PartialEq)]
pub struct Mux {
    #[bits(0..=3, rw)]
    pub vin_n: u4,
    #[bits(4..=7, rw)]
    pub vin_p: u4,
}

/// Inter-channel delay in DMCLK periods for scan mode
#[bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq, Default)]
pub enum Delay {
    #[default]
    None = 0,
    D8 = 1,
    D16 = 2,
    D32 = 3,
    D64 = 4,
    D128 = 5,
    D256 = 6,
    D512 = 7,
}

impl Delay {
    /// Delay for a number of DMCLK periods: zero or a power of two in `8..=512`.
    pub fn from_dmclk(periods: u16) -> Option<Self> {
        match periods {
            0 => Some(Self::None),
            8..=512 if periods.is_power_of_two() => Some(Self::new_with_raw_value(
                u3::new(periods.trailing_zeros() as u8 - 2),
            )),
            _ => None,
        }
    }

    pub fn dmclk(self) -> u16 {
        match self {
            Self::None => 0,
            d => 1 << (d.raw_value().value() + 2),
        }
    }
}

#[bitfield(u24, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Scan {
    #[bits(0..=15, rw)]
    pub channels: u16,
    #[bits(21..=23, rw)]
    pub delay: Delay,
}

/// Delay between scan cycles in DMCLK periods
#[bitfield(u24, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Timer {
    #[bits(0..=23, rw)]
    pub ticks: u24,
}

/// A register with a typed image.
pub trait Register: Copy + PartialEq {
    const ADDR: Addr;
    /// Payload width in bytes
    const WIDTH: usize;

    fn to_raw(self) -> u32;
    fn from_raw(raw: u32) -> Self;
}

macro_rules! register_u8 {
    ($($ty:ident),*) => {
        $(
            impl Register for $ty {
                const ADDR: Addr = Addr::$ty;
                const WIDTH: usize = 1;

                fn to_raw(self) -> u32 {
                    self.raw_value() as _
                }

                fn from_raw(raw: u32) -> Self {
                    Self::new_with_raw_value(raw as u8)
                }
            }
        )*
    };
}

macro_rules! register_u24 {
    ($($ty:ident),*) => {
        $(
            impl Register for $ty {
                const ADDR: Addr = Addr::$ty;
                const WIDTH: usize = 3;

                fn to_raw(self) -> u32 {
                    self.raw_value().value()
                }

                fn from_raw(raw: u32) -> Self {
                    Self::new_with_raw_value(u24::new(raw & u24::MASK))
                }
            }
        )*
    };
}

register_u8!(Config0, Config1, Config2, Config3, Irq, Mux);
register_u24!(Scan, Timer);
