//! Three-channel LED/PWM output instrument.
//!
//! Each channel carries a brightness level in percent, mapped onto the
//! 16-bit PWM duty, plus a programmable PWM frequency. Channel 0 is
//! addressable with its index omitted (`OUTput`), so the `OUTPUT` node
//! carries a direct binding and children at the same time.

use parking_lot::Mutex;

use crate::commands::{diag, scpi};
use crate::config::Identity;
use crate::drivers::hal::Pwm;
use crate::instrument::Instrument;
use crate::registry::CommandRecord;
use crate::state::{Core, ReplyRx};
use scpi_proto::{Args, Converter, IntSpec, ScpiError};

/// Number of output channels.
pub const CHANNELS: usize = 3;

/// Duty counts per level percent: 100 % maps to 65025 of 65535.
const DUTY_PER_PERCENT: f64 = 650.25;

/// Default PWM frequency in Hz.
const DEFAULT_FREQ: u32 = 10_000;

#[derive(Debug)]
struct Channel {
    pwm: Pwm,
    level: f64,
}

/// The LED instrument.
pub struct Led {
    core: Core,
    channels: Mutex<[Channel; CHANNELS]>,
}

impl Led {
    /// Create the instrument plus the receiving end of its reply channel.
    pub fn new(identity: Identity) -> (Self, ReplyRx) {
        let (core, reply_rx) = Core::new(identity);
        let channels = std::array::from_fn(|_| Channel {
            pwm: Pwm::new(DEFAULT_FREQ),
            level: 0.0,
        });
        (
            Self {
                core,
                channels: Mutex::new(channels),
            },
            reply_rx,
        )
    }

    fn set_level(&self, channel: usize, level: f64) -> Result<(), ScpiError> {
        if !(0.0..=100.0).contains(&level) {
            return Err(ScpiError::OutOfRange);
        }
        let mut channels = self.channels.lock();
        channels[channel].level = level;
        channels[channel]
            .pwm
            .set_duty((DUTY_PER_PERCENT * level).round() as u16);
        Ok(())
    }

    fn set_freq(&self, channel: usize, freq: i64) -> Result<(), ScpiError> {
        self.channels.lock()[channel].pwm.set_freq(freq as u32);
        Ok(())
    }

    /// Current level of a channel in percent.
    pub fn level(&self, channel: usize) -> f64 {
        self.channels.lock()[channel].level
    }

    /// Current PWM frequency of a channel in Hz.
    pub fn freq(&self, channel: usize) -> u32 {
        self.channels.lock()[channel].pwm.freq()
    }

    /// Current PWM duty of a channel.
    pub fn duty(&self, channel: usize) -> u16 {
        self.channels.lock()[channel].pwm.duty()
    }

    fn reply_level(&self, channel: usize) {
        self.core
            .reply(format!("{:.1}%", self.level(channel)));
    }
}

impl Instrument for Led {
    fn core(&self) -> &Core {
        &self.core
    }

    fn command_sets() -> Vec<Vec<CommandRecord<Self>>> {
        vec![scpi::commands(), diag::commands(), commands()]
    }
}

fn freq_converter() -> Converter {
    IntSpec::new()
        .min(10)
        .max(1_000_000)
        .default_value(DEFAULT_FREQ as i64)
        .build()
}

/// The OUTput command set.
pub fn commands() -> Vec<CommandRecord<Led>> {
    vec![
        CommandRecord::sync("OUTput[0][:LEVeL]", "out0", level0)
            .params([Converter::OnOffFloat]),
        CommandRecord::sync("OUTput[0][:LEVeL]?", "out0q", level0q),
        CommandRecord::sync("OUTput[0]:FREQuency", "freq0", freq0).params([freq_converter()]),
        CommandRecord::sync("OUTput[0]:FREQuency?", "freq0q", freq0q),
        CommandRecord::sync("OUTput1[:LEVeL]", "out1", level1).params([Converter::OnOffFloat]),
        CommandRecord::sync("OUTput1[:LEVeL]?", "out1q", level1q),
        CommandRecord::sync("OUTput1:FREQuency", "freq1", freq1).params([freq_converter()]),
        CommandRecord::sync("OUTput1:FREQuency?", "freq1q", freq1q),
        CommandRecord::sync("OUTput2[:LEVeL]", "out2", level2).params([Converter::OnOffFloat]),
        CommandRecord::sync("OUTput2[:LEVeL]?", "out2q", level2q),
        CommandRecord::sync("OUTput2:FREQuency", "freq2", freq2).params([freq_converter()]),
        CommandRecord::sync("OUTput2:FREQuency?", "freq2q", freq2q),
        CommandRecord::sync("OUTput:ALL[:LEVeL]", "out_all", level_all)
            .params([Converter::OnOffFloat]),
    ]
}

fn level0(instr: &Led, args: Args) -> Result<(), ScpiError> {
    instr.set_level(0, args.float(0)?)
}

fn level0q(instr: &Led, _args: Args) -> Result<(), ScpiError> {
    instr.reply_level(0);
    Ok(())
}

fn freq0(instr: &Led, args: Args) -> Result<(), ScpiError> {
    instr.set_freq(0, args.int(0)?)
}

fn freq0q(instr: &Led, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.freq(0).to_string());
    Ok(())
}

fn level1(instr: &Led, args: Args) -> Result<(), ScpiError> {
    instr.set_level(1, args.float(0)?)
}

fn level1q(instr: &Led, _args: Args) -> Result<(), ScpiError> {
    instr.reply_level(1);
    Ok(())
}

fn freq1(instr: &Led, args: Args) -> Result<(), ScpiError> {
    instr.set_freq(1, args.int(0)?)
}

fn freq1q(instr: &Led, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.freq(1).to_string());
    Ok(())
}

fn level2(instr: &Led, args: Args) -> Result<(), ScpiError> {
    instr.set_level(2, args.float(0)?)
}

fn level2q(instr: &Led, _args: Args) -> Result<(), ScpiError> {
    instr.reply_level(2);
    Ok(())
}

fn freq2(instr: &Led, args: Args) -> Result<(), ScpiError> {
    instr.set_freq(2, args.int(0)?)
}

fn freq2q(instr: &Led, _args: Args) -> Result<(), ScpiError> {
    instr.core.reply(instr.freq(2).to_string());
    Ok(())
}

fn level_all(instr: &Led, args: Args) -> Result<(), ScpiError> {
    let level = args.float(0)?;
    for channel in 0..CHANNELS {
        instr.set_level(channel, level)?;
    }
    Ok(())
}
