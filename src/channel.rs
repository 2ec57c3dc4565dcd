//! Channel configuration validation
//!
//! Gain is device-wide. The mux inputs of the scan channels 0..=15 are fixed by the device; only
//! the free-mux channel 16 takes caller inputs. The inter-channel delay only applies to scan
//! channels.
use arbitrary_int::u4;

use crate::cache::DeviceRegisterCache;
use crate::register::{mux, Config2, Delay, Gain, Mux};
use crate::scan::{ChannelSelection, Variant};
use crate::Invalid;

/// A channel setup request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct ChannelConfig {
    pub channel: u8,
    /// Gain register code
    pub gain: u8,
    /// The device has no true single-ended mode. Must be set.
    pub differential: bool,
    /// Free-mux channel VIN+ code
    pub input_positive: u8,
    /// Free-mux channel VIN- code
    pub input_negative: u8,
    /// Inter-channel delay in DMCLK periods, zero for the default
    pub acquisition_delay: u16,
}

/// A validated channel setup.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelSetup {
    pub channel: u8,
    pub gain: Gain,
    pub delay: Delay,
    /// Free-mux inputs, `None` for scan channels
    pub mux: Option<Mux>,
}

/// Register images that differ from the cache.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Changes {
    pub config2: Option<Config2>,
    pub mux: Option<Mux>,
}

fn mux_input(code: u8, variant: Variant) -> Result<u4, Invalid> {
    match code {
        mux::RESERVED => Err(Invalid::Mux(code)),
        0..=7 if code >= variant.inputs() => Err(Invalid::Mux(code)),
        0..=0xf => Ok(u4::new(code)),
        _ => Err(Invalid::Mux(code)),
    }
}

/// Validate a channel request. No state is touched.
pub fn validate(config: &ChannelConfig, variant: Variant) -> Result<ChannelSetup, Invalid> {
    if config.channel > ChannelSelection::FREE_MUX {
        return Err(Invalid::Channel(config.channel));
    }
    if !config.differential {
        return Err(Invalid::SingleEnded);
    }
    let free_mux = config.channel == ChannelSelection::FREE_MUX;
    let mux = if free_mux {
        Some(
            Mux::DEFAULT
                .with_vin_p(mux_input(config.input_positive, variant)?)
                .with_vin_n(mux_input(config.input_negative, variant)?),
        )
    } else {
        None
    };
    let delay = match Delay::from_dmclk(config.acquisition_delay) {
        Some(Delay::None) => Delay::None,
        Some(delay) if !free_mux => delay,
        _ => return Err(Invalid::Delay(config.acquisition_delay)),
    };
    let gain = Gain::from_code(config.gain).ok_or(Invalid::Gain(config.gain))?;
    Ok(ChannelSetup {
        channel: config.channel,
        gain,
        delay,
        mux,
    })
}

impl ChannelSetup {
    /// Register writes needed to apply this setup over the cached state.
    pub fn changes(&self, cache: &DeviceRegisterCache) -> Changes {
        let config2 = cache
            .get::<Config2>()
            .unwrap_or(Config2::DEFAULT)
            .with_gain(self.gain);
        Changes {
            config2: cache.changed(config2),
            mux: self.mux.and_then(|m| cache.changed(m)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(channel: u8) -> ChannelConfig {
        ChannelConfig {
            channel,
            gain: 1,
            differential: true,
            ..Default::default()
        }
    }

    #[test]
    fn rejects() {
        let v = Variant::Mcp3564;
        assert_eq!(validate(&config(17), v), Err(Invalid::Channel(17)));
        assert_eq!(
            validate(
                &ChannelConfig {
                    differential: false,
                    ..config(0)
                },
                v
            ),
            Err(Invalid::SingleEnded)
        );
        assert_eq!(
            validate(
                &ChannelConfig {
                    input_positive: 0xa,
                    ..config(16)
                },
                v
            ),
            Err(Invalid::Mux(0xa))
        );
        assert_eq!(
            validate(
                &ChannelConfig {
                    acquisition_delay: 6,
                    ..config(3)
                },
                v
            ),
            Err(Invalid::Delay(6))
        );
        assert_eq!(
            validate(
                &ChannelConfig {
                    gain: 8,
                    ..config(3)
                },
                v
            ),
            Err(Invalid::Gain(8))
        );
    }

    #[test]
    fn check_order() {
        // Channel range is checked before anything else
        let c = ChannelConfig {
            channel: 20,
            differential: false,
            gain: 9,
            ..Default::default()
        };
        assert_eq!(validate(&c, Variant::Mcp3564), Err(Invalid::Channel(20)));
    }

    #[test]
    fn free_mux_inputs() {
        let c = ChannelConfig {
            input_positive: 3,
            input_negative: mux::AGND,
            ..config(16)
        };
        let s = validate(&c, Variant::Mcp3564).unwrap();
        assert_eq!(s.mux.unwrap().raw_value(), 0x38);
        // CH3 is not wired on the two-input part
        assert_eq!(validate(&c, Variant::Mcp3561), Err(Invalid::Mux(3)));
        let c = ChannelConfig {
            input_positive: mux::TEMP_P,
            input_negative: 0x10,
            ..config(16)
        };
        assert_eq!(validate(&c, Variant::Mcp3564), Err(Invalid::Mux(0x10)));
        // Scan channels ignore mux inputs
        let c = ChannelConfig {
            input_positive: 0xa,
            ..config(5)
        };
        assert_eq!(validate(&c, Variant::Mcp3564).unwrap().mux, None);
    }

    #[test]
    fn delay_scan_only() {
        let c = ChannelConfig {
            acquisition_delay: 64,
            ..config(2)
        };
        assert_eq!(validate(&c, Variant::Mcp3564).unwrap().delay, Delay::D64);
        let c = ChannelConfig {
            acquisition_delay: 64,
            input_positive: 0,
            input_negative: 1,
            ..config(16)
        };
        assert_eq!(validate(&c, Variant::Mcp3564), Err(Invalid::Delay(64)));
        let c = ChannelConfig {
            acquisition_delay: 1024,
            ..config(2)
        };
        assert_eq!(validate(&c, Variant::Mcp3564), Err(Invalid::Delay(1024)));
    }

    #[test]
    fn changes_only_on_difference() {
        let mut cache = DeviceRegisterCache::default();
        cache.seed_defaults();
        let s = validate(&config(0), Variant::Mcp3564).unwrap();
        assert_eq!(s.changes(&cache), Changes::default());

        let s = validate(
            &ChannelConfig {
                gain: 5,
                ..config(0)
            },
            Variant::Mcp3564,
        )
        .unwrap();
        let ch = s.changes(&cache);
        assert_eq!(ch.config2.unwrap().gain(), Gain::G16);
        assert_eq!(ch.mux, None);

        let s = validate(
            &ChannelConfig {
                input_positive: 0,
                input_negative: 1,
                ..config(16)
            },
            Variant::Mcp3564,
        )
        .unwrap();
        // Same as the reset mux
        assert_eq!(s.changes(&cache).mux, None);
    }
}
