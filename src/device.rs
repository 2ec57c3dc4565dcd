use arbitrary_int::u4;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};
use fugit::MicrosDurationU32;

use crate::acquisition::{
    AcquisitionSequence, Request, Resolution, Sequencer, State, SweepAction,
    READY_TIMEOUT,
};
use crate::cache::DeviceRegisterCache;
use crate::channel::{self, ChannelConfig};
use crate::config::Config;
use crate::register::{
    encode_command, pack_value, unpack_value, AdcMode, Addr, Config0, Config1, Config2,
    Config3, Delay, FastCommand, Irq, Opcode, Register, Status, Timer,
};
use crate::scan::{self, ChannelSelection, Variant};
use crate::timing::{interval_to_ticks, Timing};
use crate::{Error, Invalid, ReadySignal};

/// MCP3561/2/4 driver.
///
/// Owns the bus and the register cache. The DRDY interrupt handler shares only `ready`.
pub struct Mcp356x<'a, B, D> {
    bus: B,
    delay: D,
    ready: &'a ReadySignal,
    config: Config,
    cache: DeviceRegisterCache,
    scan_delay: Delay,
    sequence: Option<AcquisitionSequence>,
    state: State,
    timeout: MicrosDurationU32,
    interval_us: u32,
}

impl<'a, B: SpiDevice<u8>, D: DelayNs> Mcp356x<'a, B, D> {
    pub fn new(bus: B, delay: D, ready: &'a ReadySignal, config: Config) -> Self {
        Self {
            bus,
            delay,
            ready,
            config,
            cache: DeviceRegisterCache::default(),
            scan_delay: Delay::None,
            sequence: None,
            state: State::Idle,
            timeout: READY_TIMEOUT,
            interval_us: 0,
        }
    }

    /// Return the bus and delay.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register mirror and timing estimate, for diagnostics.
    pub fn cache(&self) -> &DeviceRegisterCache {
        &self.cache
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Command byte, then payload out, then payload in. The status byte is clocked out during
    /// the command byte.
    fn transfer(
        &mut self,
        index: u4,
        opcode: Opcode,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<Status, Error> {
        let mut cmd = [encode_command(self.config.address, index, opcode)];
        self.bus.transaction(&mut [
            Operation::TransferInPlace(&mut cmd),
            Operation::Write(write),
            Operation::Read(read),
        ])?;
        Ok(Status::new_with_raw_value(cmd[0]))
    }

    fn fast_command(&mut self, cmd: FastCommand) -> Result<(), Error> {
        self.transfer(u4::new(cmd as u8), Opcode::Fast, &[], &mut [])?;
        let mode = match cmd {
            FastCommand::Reset => {
                self.cache.seed_defaults();
                return Ok(());
            }
            FastCommand::Start => AdcMode::Conversion,
            FastCommand::Standby => AdcMode::Standby,
            FastCommand::Shutdown | FastCommand::FullShutdown => AdcMode::Shutdown,
        };
        if let Some(config0) = self.cache.get::<Config0>() {
            self.cache.commit(config0.with_adc_mode(mode));
        }
        Ok(())
    }

    fn read(&mut self, addr: Addr, data: &mut [u8]) -> Result<Status, Error> {
        self.transfer(addr.index(), Opcode::StaticRead, &[], data)
    }

    pub fn read_register<R: Register>(&mut self) -> Result<R, Error> {
        let mut data = [0; 4];
        let data = &mut data[..R::WIDTH];
        self.read(R::ADDR, data)?;
        Ok(R::from_raw(unpack_value(data)))
    }

    pub fn write_register<R: Register>(&mut self, value: R) -> Result<(), Error> {
        let raw = value.to_raw();
        let data = pack_value(raw, R::WIDTH)?;
        self.transfer(R::ADDR.index(), Opcode::IncrementalWrite, &data, &mut [])?;
        log::debug!("{:?} <- {:#x}", R::ADDR, raw);
        self.cache.commit(value);
        Ok(())
    }

    /// Write a register only if it differs from the cached value.
    ///
    /// Returns whether a write was issued.
    fn update<R: Register>(&mut self, value: R) -> Result<bool, Error> {
        match self.cache.changed(value) {
            Some(value) => self.write_register(value).and(Ok(true)),
            None => Ok(false),
        }
    }

    /// Reset the device, check its identity and configure clock and IRQ.
    pub fn init(&mut self) -> Result<(), Error> {
        if self.state.is_active() {
            return Err(Invalid::Busy.into());
        }
        self.cache.invalidate();
        self.fast_command(FastCommand::Reset)?;
        let mut id = [0; 2];
        self.read(Addr::DeviceId, &mut id)?;
        let id = u16::from_be_bytes(id);
        if Variant::try_from(id).ok() != Some(self.config.variant) {
            return Err(Error::Id(id));
        }
        self.update(
            Config0::DEFAULT
                .with_clk_sel(self.config.clk_sel())
                .with_adc_mode(AdcMode::Standby),
        )?;
        // IRQ edges are DRDY only
        self.write_register(
            Irq::new_with_raw_value(0)
                .with_en_stp(false)
                .with_en_fastcmd(true)
                .with_inactive_high(true),
        )?;
        self.state = State::Idle;
        self.sequence = None;
        log::info!(
            "{:?} at address {} initialized",
            self.config.variant,
            self.config.address
        );
        Ok(())
    }

    pub fn standby(&mut self) -> Result<(), Error> {
        self.fast_command(FastCommand::Standby)
    }

    /// Validate and apply a channel configuration.
    ///
    /// Gain is device-wide. The inter-channel delay of the last scan channel setup applies to
    /// subsequent scans.
    pub fn setup_channel(&mut self, config: &ChannelConfig) -> Result<(), Error> {
        if self.state.is_active() {
            return Err(Invalid::Busy.into());
        }
        let setup = channel::validate(config, self.config.variant)?;
        let changes = setup.changes(&self.cache);
        if let Some(config2) = changes.config2 {
            self.write_register(config2)?;
        }
        if let Some(mux) = changes.mux {
            self.write_register(mux)?;
        }
        if setup.channel != ChannelSelection::FREE_MUX {
            self.scan_delay = setup.delay;
        }
        Ok(())
    }

    /// Program and trigger an acquisition.
    ///
    /// The request is fully validated before the first bus write. A previous terminal state is
    /// discarded.
    pub fn start(&mut self, request: &Request) -> Result<(), Error> {
        if self.state.is_active() {
            return Err(Invalid::Busy.into());
        }
        let resolution = Resolution::try_from(request.resolution)
            .map_err(|_| Invalid::Resolution(request.resolution))?;
        let selection = ChannelSelection::new(request.channels)?;
        let current = self.cache.osr().unwrap_or(Config1::DEFAULT.osr());
        let osr = self
            .config
            .oversampling_policy()
            .resolve(request.oversampling, current)?;
        let mode = self.config.mode;
        let interval_us = request.interval_us.unwrap_or(0);
        if selection.is_free_mux() && mode.is_continuous() && interval_us != 0 {
            return Err(Invalid::FreeMuxInterval.into());
        }
        let clock = self.config.clock();
        let ticks = interval_to_ticks(interval_us, clock.mclk_hz, clock.shift())?;
        let scan = scan::pack(selection, self.config.variant, self.scan_delay)?;

        self.state = State::Idle;
        self.sequence = None;

        let config1 = Config1::DEFAULT
            .with_osr(osr)
            .with_prescale(self.config.prescale);
        let config2 = self
            .cache
            .get::<Config2>()
            .unwrap_or(Config2::DEFAULT)
            .with_az_mux(request.calibrate);
        let config3 = Config3::DEFAULT
            .with_conv_mode(mode.conv_mode())
            .with_data_format(resolution.data_format());
        let program = |dev: &mut Self| -> Result<bool, Error> {
            let osr_changed = dev.update(config1)?;
            dev.update(config2)?;
            dev.update(config3)?;
            dev.update(scan)?;
            if mode.is_continuous() {
                dev.update(Timer::DEFAULT.with_ticks(ticks))?;
            }
            Ok(osr_changed)
        };
        let osr_changed = match program(self) {
            Ok(changed) => changed,
            Err(e) => return Err(self.fail(e)),
        };

        if osr_changed || self.cache.timing().is_none() {
            let timing = Timing::new(osr, &clock);
            log::debug!(
                "{:?}: conversion {} us, data rate {} Hz",
                osr,
                timing.conversion_us,
                timing.data_rate_hz
            );
            self.cache.set_timing(timing);
        }
        let conversion_us = self.cache.timing().unwrap_or_default().conversion_us;
        let mut sample_us = conversion_us.saturating_add(interval_us);
        if request.calibrate {
            sample_us = sample_us.saturating_mul(2);
        }
        self.timeout = MicrosDurationU32::micros(READY_TIMEOUT.ticks().saturating_add(sample_us));
        self.interval_us = interval_us;

        self.sequence = Some(AcquisitionSequence::new(
            selection,
            resolution,
            mode.is_continuous(),
        ));
        self.ready.reset();
        if let Err(e) = self.fast_command(FastCommand::Start) {
            return Err(self.fail(e));
        }
        self.state = State::RunningSweep;
        Ok(())
    }

    /// Run the acquisition to completion, writing samples to `buffer`.
    ///
    /// Returns the number of samples in the buffer. On failure the samples read before the
    /// error stay in the buffer and the rest is untouched.
    pub fn poll_for_completion<S: Sequencer + ?Sized>(
        &mut self,
        buffer: &mut [u8],
        sequencer: &mut S,
    ) -> Result<usize, Error> {
        let mut seq = match (self.state, self.sequence) {
            (State::Failed(e), _) => return Err(e),
            (State::Completed, Some(seq)) => return Ok(seq.samples()),
            (State::RunningSweep | State::AwaitingNextSweep, Some(seq)) => seq,
            _ => return Err(Invalid::Idle.into()),
        };
        let result = loop {
            match self.step(&mut seq, buffer, sequencer) {
                Ok(false) => {}
                Ok(true) => break Ok(seq.samples()),
                Err(e) => break Err(self.fail(e)),
            }
        };
        self.sequence = Some(seq);
        result
    }

    /// Read one channel. Returns `true` once the acquisition is complete.
    fn step<S: Sequencer + ?Sized>(
        &mut self,
        seq: &mut AcquisitionSequence,
        buffer: &mut [u8],
        sequencer: &mut S,
    ) -> Result<bool, Error> {
        if seq.at_sweep_start() && buffer.len() < seq.offset() + seq.sweep_bytes() {
            return Err(Error::BufferFull);
        }
        self.ready
            .wait(&mut self.delay, self.timeout)
            .map_err(|_| Error::Timeout)?;
        let mut data = [0; 4];
        let status = self.read(Addr::AdcData, &mut data[..seq.stride()])?;
        if !status.data_ready() {
            return Err(Error::DataNotReady);
        }
        let sample = seq.resolution().decode_raw(data);
        if !seq.push(buffer, sample)? {
            return Ok(false);
        }

        self.state = State::AwaitingNextSweep;
        match sequencer.sweep_complete(seq.sweeps()) {
            SweepAction::Finish => {
                if seq.is_continuous() {
                    self.fast_command(FastCommand::Standby)?;
                }
                self.state = State::Completed;
                Ok(true)
            }
            action => {
                seq.next_sweep(action == SweepAction::Repeat);
                if !seq.is_continuous() {
                    self.delay.delay_us(self.interval_us);
                    self.ready.reset();
                    self.fast_command(FastCommand::Start)?;
                }
                self.state = State::RunningSweep;
                Ok(false)
            }
        }
    }

    /// Start and run an acquisition to completion.
    pub fn acquire<S: Sequencer + ?Sized>(
        &mut self,
        request: &Request,
        buffer: &mut [u8],
        sequencer: &mut S,
    ) -> Result<usize, Error> {
        self.start(request)?;
        self.poll_for_completion(buffer, sequencer)
    }

    /// Return a terminal acquisition to idle.
    pub fn reset(&mut self) -> Result<(), Error> {
        if self.state.is_active() {
            return Err(Invalid::Busy.into());
        }
        self.state = State::Idle;
        self.sequence = None;
        Ok(())
    }

    fn fail(&mut self, error: Error) -> Error {
        log::warn!("Acquisition failed: {error}");
        self.state = State::Failed(error);
        if self.config.mode.is_continuous() {
            if let Err(e) = self.fast_command(FastCommand::Standby) {
                log::warn!("Standby after failure: {e}");
            }
        }
        error
    }
}
