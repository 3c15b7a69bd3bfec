//! Hall-probe instrument on a simulated TI ADS1220 analog front-end.
//!
//! The ADS1220's four configuration registers are packed exactly as the
//! hardware expects and written through the simulated SPI bus; the sample
//! itself comes from an injectable code so measurements stay deterministic.
//! Field readings go through a two-point calibration (slope in volts per
//! field unit, plus offset) persisted across restarts as `slope,offset`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::commands::{diag, scpi};
use crate::config::Identity;
use crate::drivers::display::{engineering, Display, DisplayMode};
use crate::drivers::hal::SpiBus;
use crate::instrument::Instrument;
use crate::registry::CommandRecord;
use crate::state::{Core, ReplyRx};
use scpi_proto::{Args, Converter, EnumSpec, FloatSpec, ScpiError, Value};

// ADS1220 command opcodes.
const RESET: u8 = 0b0000_0110;
const START: u8 = 0b0000_1000;

/// Programmable gains of the ADS1220 PGA.
const GAINS: [u32; 8] = [1, 2, 4, 8, 16, 32, 64, 128];
/// Sample rates in samples per second.
const RATES: [u32; 7] = [20, 45, 90, 175, 330, 600, 1000];
/// Excitation current source steps in amps.
const IDAC_LEVELS: [f64; 8] = [0.0, 1e-5, 5e-5, 1e-4, 2.5e-4, 5e-4, 1e-3, 1.5e-3];

/// Internal reference voltage.
const VREF: f64 = 2.048;
/// Full-scale code of the 24-bit converter.
const FULL_SCALE: f64 = (1 << 23) as f64;

/// Panel refresh period of the `_display` background task.
const DISPLAY_REFRESH: Duration = Duration::from_millis(500);

/// Default injected sample: 0.1 V at unity gain.
const DEFAULT_SIM_CODE: i32 = 409_600;

#[derive(Debug, Clone)]
struct AdcState {
    mux: u8,
    gain: u32,
    pga: bool,
    rate: u32,
    temp_mode: bool,
    idac_level: f64,
    idac_mux: [u8; 2],
    filter: u8,
    vref_sel: u8,
    pswitch: bool,
}

impl Default for AdcState {
    fn default() -> Self {
        Self {
            mux: 0,
            gain: 1,
            pga: true,
            rate: 20,
            temp_mode: false,
            idac_level: 0.0,
            idac_mux: [0, 0],
            filter: 0,
            vref_sel: 0,
            pswitch: false,
        }
    }
}

/// The hall-probe instrument.
pub struct HallProbe {
    core: Core,
    bus: Mutex<SpiBus>,
    adc: Mutex<AdcState>,
    /// Field calibration: volts per field unit, offset volts.
    calib: Mutex<[f64; 2]>,
    calib_path: PathBuf,
    display: Display,
    sim_code: AtomicI32,
}

impl HallProbe {
    /// Create the instrument plus the receiving end of its reply channel.
    ///
    /// Loads (or seeds) the calibration file and applies the hall-sensor
    /// register defaults.
    pub fn new(identity: Identity, calibration_path: impl Into<PathBuf>) -> (Self, ReplyRx) {
        let (core, reply_rx) = Core::new(identity);
        let calib_path = calibration_path.into();
        let calib = load_calibration(&calib_path);
        let probe = Self {
            core,
            bus: Mutex::new(SpiBus::new()),
            adc: Mutex::new(AdcState::default()),
            calib: Mutex::new(calib),
            calib_path,
            display: Display::new(),
            sim_code: AtomicI32::new(DEFAULT_SIM_CODE),
        };
        probe.setup();
        (probe, reply_rx)
    }

    /// Spawn the `_display` refresh task. System task: survives *RST and
    /// is invisible to the blocking-wait commands.
    pub fn spawn_display_task(instr: &Arc<Self>) {
        let probe = Arc::clone(instr);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(DISPLAY_REFRESH).await;
                let text = probe.render();
                probe.display.write(text);
            }
        });
        instr.core.tasks.lock().register("_display", handle);
    }

    /// The panel, for tests and the refresh task.
    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Inject the raw converter code the next reads will return.
    pub fn set_sim_code(&self, code: i32) {
        self.sim_code.store(code, Ordering::Relaxed);
    }

    /// Apply the hall-measurement defaults to the register file.
    fn setup(&self) {
        self.bus.lock().command(RESET);
        let mut adc = self.adc.lock();
        adc.mux = 3;
        adc.pga = true;
        adc.gain = 1;
        adc.rate = 20;
        adc.temp_mode = false;
        adc.filter = 2;
        adc.idac_mux = [1, 0];
        adc.idac_level = 1e-3;
        self.write_reg0(&adc);
        self.write_reg1(&adc);
        self.write_reg23(&adc);
    }

    // The register writers take the already-locked state: lock order is
    // adc before bus throughout.

    /// Gain, PGA and mux: register 0.
    fn write_reg0(&self, adc: &AdcState) {
        let gain_ix = GAINS.iter().position(|&g| g == adc.gain).unwrap_or(0) as u32;
        let data = u32::from(adc.pga) | (gain_ix << 1) | (u32::from(adc.mux) << 4);
        self.bus.lock().write_reg(0, data);
    }

    /// Rate, continuous-conversion and temperature mode: register 1.
    fn write_reg1(&self, adc: &AdcState) {
        let rate_ix = RATES.iter().position(|&r| r == adc.rate).unwrap_or(0) as u32;
        let data = (rate_ix << 5) | 0x04 | (u32::from(adc.temp_mode) << 1);
        self.bus.lock().write_reg(1, data);
    }

    /// IDAC level and routing, filter, reference: registers 2 and 3.
    fn write_reg23(&self, adc: &AdcState) {
        let idac_ix = IDAC_LEVELS
            .iter()
            .position(|&l| l == adc.idac_level)
            .unwrap_or(0) as u32;
        let data = idac_ix
            | (u32::from(adc.pswitch) << 3)
            | (u32::from(adc.filter) << 4)
            | (u32::from(adc.vref_sel) << 6)
            | ((u32::from(adc.idac_mux[1]) << 2 | u32::from(adc.idac_mux[0]) << 5) << 8);
        self.bus.lock().write_reg(2, data);
    }

    fn set_gain(&self, gain: u32) -> Result<(), ScpiError> {
        if !GAINS.contains(&gain) {
            return Err(ScpiError::OutOfRange);
        }
        let mut adc = self.adc.lock();
        adc.gain = gain;
        self.write_reg0(&adc);
        Ok(())
    }

    fn set_idac_level(&self, level: f64) -> Result<(), ScpiError> {
        if !IDAC_LEVELS.contains(&level) {
            return Err(ScpiError::OutOfRange);
        }
        let mut adc = self.adc.lock();
        adc.idac_level = level;
        self.write_reg23(&adc);
        Ok(())
    }

    /// One conversion. The simulation returns the injected code.
    fn read(&self) -> i32 {
        self.bus.lock().command(START);
        self.sim_code.load(Ordering::Relaxed)
    }

    fn gain(&self) -> u32 {
        self.adc.lock().gain
    }

    fn idac_level(&self) -> f64 {
        self.adc.lock().idac_level
    }

    /// Input voltage of a raw code at the current gain.
    fn volts_of(&self, code: i32) -> f64 {
        (f64::from(code) / FULL_SCALE) * (VREF / f64::from(self.gain()))
    }

    fn field_of(&self, volt: f64) -> f64 {
        let calib = self.calib.lock();
        (volt - calib[1]) / calib[0]
    }

    /// Die temperature in Celsius: 14-bit left-justified, 0.03125 C/LSB.
    ///
    /// Holds the state lock for the whole mode-flip/read/restore sequence
    /// so a concurrent measurement cannot see temperature mode enabled.
    fn read_temperature(&self) -> f64 {
        let mut adc = self.adc.lock();
        adc.temp_mode = true;
        self.write_reg1(&adc);
        let mut code = self.read() >> 10;
        if code > 1 << 13 {
            code -= 1 << 14;
        }
        adc.temp_mode = false;
        self.write_reg1(&adc);
        0.03125 * f64::from(code)
    }

    /// The largest field magnitude readable at the current gain.
    fn range(&self) -> f64 {
        let calib = self.calib.lock();
        (VREF - calib[1].abs()) / (f64::from(self.gain()) * calib[0])
    }

    /// Pick the highest gain whose span still covers `field`.
    fn set_range(&self, field: f64) -> Result<(), ScpiError> {
        let volt = {
            let calib = self.calib.lock();
            field.abs() * calib[0] - calib[1]
        };
        let volt = volt.clamp(VREF / 128.0, VREF);
        let gain = GAINS
            .iter()
            .rev()
            .find(|&&g| volt <= VREF / f64::from(g))
            .copied()
            .unwrap_or(1);
        self.set_gain(gain)
    }

    fn store_calibration(&self) {
        let calib = *self.calib.lock();
        if let Err(err) = std::fs::write(
            &self.calib_path,
            format!("{:.6},{:.7}\n", calib[0], calib[1]),
        ) {
            warn!(error = %err, path = %self.calib_path.display(), "calibration write failed");
        }
    }

    /// Current calibration as (slope, offset).
    pub fn calibration(&self) -> (f64, f64) {
        let calib = self.calib.lock();
        (calib[0], calib[1])
    }
}

/// Read `slope,offset`, seeding the identity calibration on first run.
fn load_calibration(path: &Path) -> [f64; 2] {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let mut fields = content.trim().split(',').map(|f| f.trim().parse::<f64>());
            match (fields.next(), fields.next()) {
                (Some(Ok(slope)), Some(Ok(offset))) => [slope, offset],
                _ => {
                    warn!(path = %path.display(), "unreadable calibration, using identity");
                    [1.0, 0.0]
                }
            }
        }
        Err(_) => {
            debug!(path = %path.display(), "seeding calibration file");
            let calib = [1.0, 0.0];
            if let Err(err) = std::fs::write(path, "1.000000,0.0000000\n") {
                warn!(error = %err, path = %path.display(), "calibration write failed");
            }
            calib
        }
    }
}

impl Instrument for HallProbe {
    fn core(&self) -> &Core {
        &self.core
    }

    fn command_sets() -> Vec<Vec<CommandRecord<Self>>> {
        vec![scpi::commands(), diag::commands(), commands()]
    }

    fn reset_device(&self) {
        self.setup();
    }
}

fn mode_converter() -> Converter {
    EnumSpec::new()
        .label("FieLD", Value::Str("field".into()))
        .label("VOLTage", Value::Str("volt".into()))
        .label("TEMPerature", Value::Str("temp".into()))
        .label("HallRESistance", Value::Str("hres".into()))
        .label("RAW", Value::Str("raw".into()))
        .label("MESSage", Value::Str("message".into()))
        .build()
}

/// The measurement, source and display command set.
pub fn commands() -> Vec<CommandRecord<HallProbe>> {
    vec![
        CommandRecord::sync("MEASure:RAW?", "rawq", rawq),
        CommandRecord::sync("MEASure:VOLTage?", "voltq", voltq),
        CommandRecord::sync("MEASure:HallRESistance?", "hresq", hresq),
        CommandRecord::sync("MEASure[:FieLD]?", "fieldq", fieldq),
        CommandRecord::sync("MEASure:TEMPerature?", "tempq", tempq),
        CommandRecord::sync("MEASure[:FieLD]:CALibration[:LINear]?", "calq", calq),
        CommandRecord::sync("MEASure[:FieLD]:CALibration[:LINear]", "cal_set", cal_set)
            .params([FloatSpec::new().build()]),
        CommandRecord::sync("MEASure[:FieLD]:CALibration:OFFset?", "cal_offsetq", cal_offsetq),
        CommandRecord::sync("MEASure[:FieLD]:CALibration:OFFset", "cal_offset_set", cal_offset_set)
            .params([FloatSpec::new().build()]),
        CommandRecord::sync("MEASure[:FieLD]:RANGe?", "rangeq", rangeq),
        CommandRecord::sync("MEASure[:FieLD]:RANGe", "range_set", range_set)
            .params([FloatSpec::new().min(0.0).max(f64::INFINITY).build()]),
        CommandRecord::sync("SOURce[:LEVeL]?", "sourceq", sourceq),
        CommandRecord::sync("SOURce[:LEVeL]", "source_set", source_set).params([FloatSpec::new()
            .min(1e-5)
            .max(1.5e-3)
            .default_value(1e-3)
            .keyword("OFF", 0.0)
            .build()]),
        CommandRecord::sync("DISPlay:MODE", "disp_mode_set", disp_mode_set)
            .params([mode_converter()]),
        CommandRecord::sync("DISPlay:MODE?", "disp_modeq", disp_modeq),
        CommandRecord::sync("DISPlay:MESSage", "disp_mess_set", disp_mess_set)
            .params([Converter::Str]),
        CommandRecord::sync("DISPlay:MESSage?", "disp_messq", disp_messq),
    ]
}

impl HallProbe {
    /// Render the current measurement for the panel per the display mode.
    fn render(&self) -> String {
        match self.display.mode() {
            DisplayMode::Field => {
                let (value, letter) = engineering(self.field_of(self.volts_of(self.read())));
                format!("{value:.2}{letter}T")
            }
            DisplayMode::Volt => {
                let (value, letter) = engineering(self.volts_of(self.read()));
                format!("{value:.2}{letter}V")
            }
            DisplayMode::Temp => format!("{:.2}C", self.read_temperature()),
            DisplayMode::HallRes => {
                let (value, letter) =
                    engineering(self.volts_of(self.read()) / self.idac_level());
                format!("{value:.2}{letter}Ohm")
            }
            DisplayMode::Raw => self.read().to_string(),
            DisplayMode::Message => self.display.message(),
        }
    }
}

fn rawq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    let code = instr.read();
    instr.display.write(code.to_string());
    instr.core.reply(code.to_string());
    Ok(())
}

fn voltq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    let volt = instr.volts_of(instr.read());
    let (value, letter) = engineering(volt);
    instr.display.write(format!("{value:.2}{letter}V"));
    instr.core.reply(volt.to_string());
    Ok(())
}

fn hresq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    let resistance = instr.volts_of(instr.read()) / instr.idac_level();
    let (value, letter) = engineering(resistance);
    instr.display.write(format!("{value:.2}{letter}Ohm"));
    instr.core.reply(resistance.to_string());
    Ok(())
}

fn fieldq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    let field = instr.field_of(instr.volts_of(instr.read()));
    let (value, letter) = engineering(field);
    instr.display.write(format!("{value:.2}{letter}T"));
    instr.core.reply(field.to_string());
    Ok(())
}

fn tempq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    let celsius = instr.read_temperature();
    instr.display.write(format!("{celsius:.2}C"));
    instr.core.reply(celsius.to_string());
    Ok(())
}

fn calq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.calibration().0.to_string());
    Ok(())
}

fn cal_offsetq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.calibration().1.to_string());
    Ok(())
}

/// Set the calibration slope, keeping the physical range the old slope
/// spanned.
fn cal_set(instr: &HallProbe, args: Args) -> Result<(), ScpiError> {
    let slope = args.float(0)?;
    let range = instr.range();
    instr.calib.lock()[0] = slope;
    instr.store_calibration();
    instr.set_range(range)
}

fn cal_offset_set(instr: &HallProbe, args: Args) -> Result<(), ScpiError> {
    let offset = args.float(0)?;
    instr.calib.lock()[1] = offset;
    let range = instr.range();
    instr.store_calibration();
    instr.set_range(range)
}

fn rangeq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.range().to_string());
    Ok(())
}

fn range_set(instr: &HallProbe, args: Args) -> Result<(), ScpiError> {
    instr.set_range(args.float(0)?)
}

fn sourceq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.idac_level().to_string());
    Ok(())
}

/// Snap the requested excitation current up to the next source step.
fn source_set(instr: &HallProbe, args: Args) -> Result<(), ScpiError> {
    let level = args.float(0)?;
    let step = IDAC_LEVELS
        .iter()
        .find(|&&step| step >= level)
        .copied()
        .unwrap_or(IDAC_LEVELS[IDAC_LEVELS.len() - 1]);
    instr.set_idac_level(step)
}

fn disp_mode_set(instr: &HallProbe, args: Args) -> Result<(), ScpiError> {
    let mode = DisplayMode::from_token(args.text(0)?).ok_or(ScpiError::DataType)?;
    instr.display.set_mode(mode);
    Ok(())
}

fn disp_modeq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.display.mode().as_scpi());
    Ok(())
}

fn disp_mess_set(instr: &HallProbe, args: Args) -> Result<(), ScpiError> {
    instr.display.set_message(args.text(0)?);
    Ok(())
}

fn disp_messq(instr: &HallProbe, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.display.message());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            manufacturer: "Straylight".into(),
            model: "HP-1220".into(),
            serial: "7".into(),
            firmware: "0.3.0".into(),
        }
    }

    fn probe() -> (HallProbe, ReplyRx, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (probe, rx) = HallProbe::new(identity(), dir.path().join("calibration.txt"));
        (probe, rx, dir)
    }

    #[test]
    fn setup_packs_the_hall_defaults() {
        let (probe, _rx, _dir) = probe();
        // mux=3, gain=1 (index 0), pga on.
        assert_eq!(probe.bus.lock().read_reg(0), 0b0011_0001);
        // rate=20 (index 0), continuous conversion, temperature off.
        assert_eq!(probe.bus.lock().read_reg(1), 0b0000_0100);
    }

    #[test]
    fn volts_scale_with_gain() {
        let (probe, _rx, _dir) = probe();
        probe.set_sim_code(409_600);
        let volt = probe.volts_of(probe.read());
        assert!((volt - 0.1).abs() < 1e-12, "{volt}");
        probe.set_gain(16).unwrap();
        let volt = probe.volts_of(probe.read());
        assert!((volt - 0.00625).abs() < 1e-12, "{volt}");
    }

    #[test]
    fn temperature_is_sign_extended() {
        let (probe, _rx, _dir) = probe();
        // 25.0 C: 800 LSB of 0.03125 C, left-justified by 10 bits.
        probe.set_sim_code(800 << 10);
        assert!((probe.read_temperature() - 25.0).abs() < 1e-9);
        // Negative temperature wraps through the 14-bit two's complement.
        probe.set_sim_code(((1 << 14) - 160) << 10);
        assert!((probe.read_temperature() + 5.0).abs() < 1e-9);
        // Temperature mode was switched off again.
        assert!(!probe.adc.lock().temp_mode);
    }

    #[test]
    fn range_picks_the_covering_gain() {
        let (probe, _rx, _dir) = probe();
        // Identity calibration: a 0.02 V target fits gain 64 (span 0.032).
        probe.set_range(0.02).unwrap();
        assert_eq!(probe.gain(), 64);
        // Maximal request drops back to unity gain.
        probe.set_range(5.0).unwrap();
        assert_eq!(probe.gain(), 1);
        assert!((probe.range() - VREF).abs() < 1e-12);
    }

    #[test]
    fn calibration_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.txt");
        {
            let (probe, _rx) = HallProbe::new(identity(), &path);
            probe.calib.lock()[0] = 0.25;
            probe.calib.lock()[1] = 0.125;
            probe.store_calibration();
        }
        let (probe, _rx) = HallProbe::new(identity(), &path);
        assert_eq!(probe.calibration(), (0.25, 0.125));
    }

    #[test]
    fn missing_calibration_file_is_seeded_with_identity() {
        let (probe, _rx, dir) = probe();
        assert_eq!(probe.calibration(), (1.0, 0.0));
        let content = std::fs::read_to_string(dir.path().join("calibration.txt")).unwrap();
        assert_eq!(content, "1.000000,0.0000000\n");
    }

    #[test]
    fn source_level_snaps_up_to_a_step() {
        let (probe, _rx, _dir) = probe();
        let record = commands()
            .into_iter()
            .find(|r| r.name == "source_set")
            .unwrap();
        let args = record.convert(&["6e-5".to_string()]).unwrap();
        source_set(&probe, args).unwrap();
        assert_eq!(probe.idac_level(), 1e-4);

        // OFF keyword bypasses the bounds and lands on zero.
        let args = record.convert(&["OFF".to_string()]).unwrap();
        source_set(&probe, args).unwrap();
        assert_eq!(probe.idac_level(), 0.0);
    }

    #[test]
    fn render_follows_the_display_mode() {
        let (probe, _rx, _dir) = probe();
        probe.set_sim_code(409_600);
        assert_eq!(probe.render(), "100.00mT");
        probe.display.set_mode(DisplayMode::Raw);
        assert_eq!(probe.render(), "409600");
        probe.display.set_mode(DisplayMode::Message);
        probe.display.set_message("hello");
        assert_eq!(probe.render(), "hello");
    }
}
