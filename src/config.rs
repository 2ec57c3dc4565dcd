//! Static driver configuration
//!
//! Fixed for the lifetime of a [crate::Mcp356x]. Typically stored as JSON:
//!
//! ```json
//! {"variant":"Mcp3562","address":1,"mclk_hz":4915200,"prescale":"Div2","mode":"HostTimer"}
//! ```
//!
//! Missing fields take their [Default] values.
use arbitrary_int::u2;
use serde::{Deserialize, Serialize};

use crate::acquisition::RunMode;
use crate::register::{ClkSel, Osr, Prescale};
use crate::scan::Variant;
use crate::timing::{Clock, OversamplingPolicy, INTERNAL_MCLK_HZ};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub variant: Variant,
    /// Device address, matches the part number suffix
    pub address: u2,
    /// External master clock frequency, `None` for the internal oscillator
    pub mclk_hz: Option<u32>,
    pub prescale: Prescale,
    pub mode: RunMode,
    /// Oversampling ratio fixed by the integration, `None` to take it from each request
    pub fixed_oversampling: Option<Osr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            variant: Variant::Mcp3564,
            address: u2::new(1),
            mclk_hz: None,
            prescale: Prescale::Div1,
            mode: RunMode::DeviceTimer,
            fixed_oversampling: None,
        }
    }
}

impl Config {
    /// Parse a JSON configuration.
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json_core::de::Error> {
        let (config, _) = serde_json_core::from_slice(json)?;
        Ok(config)
    }

    pub fn clock(&self) -> Clock {
        Clock {
            mclk_hz: self.mclk_hz.unwrap_or(INTERNAL_MCLK_HZ),
            prescale: self.prescale,
        }
    }

    pub fn clk_sel(&self) -> ClkSel {
        match self.mclk_hz {
            Some(_) => ClkSel::External,
            None => ClkSel::Internal,
        }
    }

    pub fn oversampling_policy(&self) -> OversamplingPolicy {
        match self.fixed_oversampling {
            Some(osr) => OversamplingPolicy::Fixed(osr),
            None => OversamplingPolicy::PerRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::from_json(b"{}").unwrap();
        assert_eq!(c, Config::default());
        assert_eq!(c.clk_sel(), ClkSel::Internal);
        assert_eq!(c.clock().mclk_hz, INTERNAL_MCLK_HZ);
        assert_eq!(c.oversampling_policy(), OversamplingPolicy::PerRequest);
    }

    #[test]
    fn external_clock() {
        let c = Config::from_json(
            br#"{"variant":"Mcp3562","address":2,"mclk_hz":4915200,"prescale":"Div2","mode":"HostTimer","fixed_oversampling":"O1024"}"#,
        )
        .unwrap();
        assert_eq!(c.variant, Variant::Mcp3562);
        assert_eq!(c.address, u2::new(2));
        assert_eq!(c.clk_sel(), ClkSel::External);
        assert_eq!(c.clock().shift(), 3);
        assert_eq!(c.clock().dmclk_hz(), 614_400);
        assert_eq!(c.mode, RunMode::HostTimer);
        assert_eq!(
            c.oversampling_policy(),
            OversamplingPolicy::Fixed(Osr::O1024)
        );
    }

    #[test]
    fn rejects() {
        assert!(Config::from_json(br#"{"variant":"Mcp3568"}"#).is_err());
        assert!(Config::from_json(br#"{"mode":"Free"}"#).is_err());
    }
}
