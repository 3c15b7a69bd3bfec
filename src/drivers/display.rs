//! Simulated 16x2 character panel.
//!
//! The panel shows the most recent measurement (or a free-form message)
//! between commands; a background task owned by the instrument refreshes
//! it. Only the text state is simulated — no bus timing.

use parking_lot::Mutex;
use tracing::trace;

/// What the panel renders between commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Calibrated magnetic field.
    Field,
    /// Raw input voltage.
    Volt,
    /// Die temperature.
    Temp,
    /// Hall resistance (voltage over excitation current).
    HallRes,
    /// Raw converter code.
    Raw,
    /// The free-form message.
    Message,
}

impl DisplayMode {
    /// Parse the canonical token bound by the DISPlay:MODE enumeration.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "field" => Some(Self::Field),
            "volt" => Some(Self::Volt),
            "temp" => Some(Self::Temp),
            "hres" => Some(Self::HallRes),
            "raw" => Some(Self::Raw),
            "message" => Some(Self::Message),
            _ => None,
        }
    }

    /// The long-form name reported by DISPlay:MODE?.
    pub fn as_scpi(&self) -> &'static str {
        match self {
            Self::Field => "FIELD",
            Self::Volt => "VOLTAGE",
            Self::Temp => "TEMPERATURE",
            Self::HallRes => "HALLRESISTANCE",
            Self::Raw => "RAW",
            Self::Message => "MESSAGE",
        }
    }
}

#[derive(Debug)]
struct PanelState {
    mode: DisplayMode,
    message: String,
    text: String,
}

/// The simulated panel.
#[derive(Debug)]
pub struct Display {
    state: Mutex<PanelState>,
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    /// A panel showing the ready banner in field mode.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PanelState {
                mode: DisplayMode::Field,
                message: "Ready".to_string(),
                text: "Ready".to_string(),
            }),
        }
    }

    /// Replace the rendered text.
    pub fn write(&self, text: impl Into<String>) {
        let text = text.into();
        trace!(%text, "panel");
        self.state.lock().text = text;
    }

    /// The currently rendered text.
    pub fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    /// Select what the refresh task renders.
    pub fn set_mode(&self, mode: DisplayMode) {
        self.state.lock().mode = mode;
    }

    /// Current render mode.
    pub fn mode(&self) -> DisplayMode {
        self.state.lock().mode
    }

    /// Set the free-form message shown in [`DisplayMode::Message`].
    pub fn set_message(&self, message: impl Into<String>) {
        self.state.lock().message = message.into();
    }

    /// The free-form message.
    pub fn message(&self) -> String {
        self.state.lock().message.clone()
    }
}

/// Scale a value into engineering notation: `(scaled, prefix letter)`.
///
/// Values whose magnitude falls outside the prefix table (and zero,
/// infinities and NaN) come back unscaled with an empty letter.
pub fn engineering(value: f64) -> (f64, &'static str) {
    if value == 0.0 || !value.is_finite() {
        return (value, "");
    }
    let mag = 3 * (value.abs().log10().floor() as i32).div_euclid(3);
    let letter = match mag {
        -30 => "q",
        -27 => "r",
        -24 => "y",
        -21 => "z",
        -18 => "a",
        -15 => "f",
        -12 => "p",
        -9 => "n",
        -6 => "u",
        -3 => "m",
        0 => "",
        3 => "k",
        6 => "M",
        9 => "G",
        12 => "T",
        15 => "P",
        18 => "E",
        21 => "Z",
        24 => "Y",
        27 => "R",
        30 => "Q",
        _ => return (value, ""),
    };
    (value / 10f64.powi(mag), letter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn engineering_prefixes() {
        let (v, p) = engineering(0.1);
        assert!(close(v, 100.0) && p == "m", "{v}{p}");
        let (v, p) = engineering(1500.0);
        assert!(close(v, 1.5) && p == "k", "{v}{p}");
        let (v, p) = engineering(2.5e-7);
        assert!(close(v, 250.0) && p == "n", "{v}{p}");
        assert_eq!(engineering(42.0), (42.0, ""));
        assert_eq!(engineering(0.0), (0.0, ""));
        assert_eq!(engineering(1e40), (1e40, ""));
    }

    #[test]
    fn panel_text_and_message() {
        let display = Display::new();
        assert_eq!(display.text(), "Ready");
        display.write("0.10T");
        assert_eq!(display.text(), "0.10T");
        display.set_message("hello");
        assert_eq!(display.message(), "hello");
        assert_eq!(display.mode(), DisplayMode::Field);
    }

    #[test]
    fn mode_tokens_round_trip() {
        for mode in [
            DisplayMode::Field,
            DisplayMode::Volt,
            DisplayMode::Temp,
            DisplayMode::HallRes,
            DisplayMode::Raw,
            DisplayMode::Message,
        ] {
            let token = match mode {
                DisplayMode::Field => "field",
                DisplayMode::Volt => "volt",
                DisplayMode::Temp => "temp",
                DisplayMode::HallRes => "hres",
                DisplayMode::Raw => "raw",
                DisplayMode::Message => "message",
            };
            assert_eq!(DisplayMode::from_token(token), Some(mode));
        }
        assert_eq!(DisplayMode::from_token("clock"), None);
    }
}
