//! Simulated hardware endpoints.
//!
//! Stand-ins for the PWM and SPI peripherals of the target board. Register
//! traffic stays observable through tracing and readable back in tests.

use tracing::trace;

/// A simulated PWM output channel.
#[derive(Debug, Clone)]
pub struct Pwm {
    freq: u32,
    duty: u16,
}

impl Pwm {
    /// A channel idling at the given frequency with zero duty.
    pub fn new(freq: u32) -> Self {
        Self { freq, duty: 0 }
    }

    /// Set the output frequency in Hz.
    pub fn set_freq(&mut self, freq: u32) {
        trace!(freq, "pwm frequency");
        self.freq = freq;
    }

    /// Current output frequency in Hz.
    pub fn freq(&self) -> u32 {
        self.freq
    }

    /// Set the 16-bit duty cycle.
    pub fn set_duty(&mut self, duty: u16) {
        trace!(duty, "pwm duty");
        self.duty = duty;
    }

    /// Current 16-bit duty cycle.
    pub fn duty(&self) -> u16 {
        self.duty
    }
}

/// A simulated SPI register bus with a four-slot register file.
#[derive(Debug, Default)]
pub struct SpiBus {
    regs: [u32; 4],
}

impl SpiBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a bare command opcode. The simulation only records it.
    pub fn command(&mut self, opcode: u8) {
        trace!(opcode = format_args!("{opcode:#04x}"), "spi command");
    }

    /// Write a configuration register.
    pub fn write_reg(&mut self, register: usize, data: u32) {
        trace!(register, data = format_args!("{data:#06x}"), "spi write");
        self.regs[register] = data;
    }

    /// Read back a configuration register.
    pub fn read_reg(&self, register: usize) -> u32 {
        self.regs[register]
    }
}
