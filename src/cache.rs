//! Software mirror of the device configuration registers
//!
//! Used to skip bus writes when a register value is unchanged. An entry is unknown until it has
//! been written or seeded with the reset default.
use crate::acquisition::Resolution;
use crate::register::{
    Config0, Config1, Config2, Config3, DataFormat, Gain, Irq, Mux, Osr, Register, Scan,
    Timer,
};
use crate::timing::Timing;

#[derive(Clone, Debug, Default)]
pub struct DeviceRegisterCache {
    regs: [Option<u32>; 16],
    timing: Option<Timing>,
}

impl DeviceRegisterCache {
    pub fn get<R: Register>(&self) -> Option<R> {
        self.regs[R::ADDR as usize].map(R::from_raw)
    }

    /// `Some(value)` if it differs from the cached image and needs a write.
    pub fn changed<R: Register>(&self, value: R) -> Option<R> {
        (self.get::<R>() != Some(value)).then_some(value)
    }

    /// Record a value as written.
    pub fn commit<R: Register>(&mut self, value: R) {
        self.regs[R::ADDR as usize] = Some(value.to_raw());
    }

    /// Forget everything, e.g. after a device reset with unknown outcome.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// Assume power-on reset values.
    pub fn seed_defaults(&mut self) {
        self.commit(Config0::DEFAULT);
        self.commit(Config1::DEFAULT);
        self.commit(Config2::DEFAULT);
        self.commit(Config3::DEFAULT);
        self.commit(Irq::DEFAULT);
        self.commit(Mux::DEFAULT);
        self.commit(Scan::DEFAULT);
        self.commit(Timer::DEFAULT);
    }

    pub fn gain(&self) -> Option<Gain> {
        self.get::<Config2>().map(|c| c.gain())
    }

    /// Auto-zero mux (offset cancellation) enabled
    pub fn calibrate(&self) -> Option<bool> {
        self.get::<Config2>().map(|c| c.az_mux())
    }

    pub fn osr(&self) -> Option<Osr> {
        self.get::<Config1>().map(|c| c.osr())
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.get::<Config3>()
            .and_then(|c| match c.data_format() {
                DataFormat::Bits24 => Some(Resolution::Bits24),
                DataFormat::Bits32SignExtended => Some(Resolution::Bits32),
                _ => None,
            })
    }

    pub fn mux(&self) -> Option<Mux> {
        self.get::<Mux>()
    }

    /// Last computed conversion time and data rate estimate.
    pub fn timing(&self) -> Option<Timing> {
        self.timing
    }

    pub(crate) fn set_timing(&mut self, timing: Timing) {
        self.timing = Some(timing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_needs_write() {
        let cache = DeviceRegisterCache::default();
        assert_eq!(cache.gain(), None);
        assert_eq!(cache.changed(Config2::DEFAULT), Some(Config2::DEFAULT));
    }

    #[test]
    fn write_on_change_only() {
        let mut cache = DeviceRegisterCache::default();
        cache.seed_defaults();
        assert_eq!(cache.changed(Config2::DEFAULT), None);
        let c = Config2::DEFAULT.with_gain(Gain::G16);
        assert_eq!(cache.changed(c), Some(c));
        cache.commit(c);
        assert_eq!(cache.changed(c), None);
        assert_eq!(cache.gain(), Some(Gain::G16));
        assert_eq!(cache.calibrate(), Some(false));
        cache.commit(c.with_az_mux(true));
        assert_eq!(cache.calibrate(), Some(true));
    }

    #[test]
    fn diagnostics() {
        let mut cache = DeviceRegisterCache::default();
        cache.seed_defaults();
        assert_eq!(cache.osr(), Some(Osr::O256));
        assert_eq!(cache.resolution(), Some(Resolution::Bits24));
        cache.commit(Config3::DEFAULT.with_data_format(DataFormat::Bits32SignExtended));
        assert_eq!(cache.resolution(), Some(Resolution::Bits32));
        cache.commit(Config3::DEFAULT.with_data_format(DataFormat::Bits32Left));
        assert_eq!(cache.resolution(), None);
        assert_eq!(cache.timing(), None);
        cache.invalidate();
        assert_eq!(cache.osr(), None);
    }
}
