//! Host-side firmware emulator.
//!
//! Implements the device half of the serial protocol against a simulated
//! board, so the bridge can be exercised without hardware.
//!
//! | Command | Ids | Answer |
//! |---------|-----|--------|
//! | `ON` / `OFF` | 3..=6 (LEDs) | `{"opstatus":"ok","id":N}` |
//! | `READ` | 1 (accelerometer) | `{"opstatus":"ok","measure":[x,y,z],"type":"accelerometer"}` |
//! | `READ` | 2 (temperature) | `{"opstatus":"ok","measure":T,"type":"temperature"}` |
//! | unknown code | any | `{"opstatus":"err","code":1}` |
//!
//! Any other id, or a frame that does not parse, gets no answer at all.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, trace};

use crate::error::Error;
use crate::protocol::payload::DEVICE_ERROR_UNKNOWN_COMMAND;
use crate::protocol::{
    Command, CommandName, DevicePayload, FRAME_TERMINATOR, RESPONSE_CAPACITY,
    temperature_from_sample,
};

// ============================================================================
// Constants
// ============================================================================

/// Sensor id of the accelerometer.
pub const ACCELEROMETER_ID: i32 = 1;

/// Sensor id of the internal temperature sensor.
pub const TEMPERATURE_ID: i32 = 2;

/// First LED id.
pub const FIRST_LED_ID: i32 = 3;

/// Last LED id.
pub const LAST_LED_ID: i32 = 6;

/// Raw ADC sample the simulated sensor starts at (about 25 °C).
const DEFAULT_TEMPERATURE_SAMPLE: u16 = 943;

// ============================================================================
// Board
// ============================================================================

/// Peripherals the firmware drives.
pub trait Board: Send {
    /// Switches an LED; returns `false` if the id is not an LED.
    fn set_led(&mut self, id: i32, on: bool) -> bool;

    /// Samples the accelerometer.
    fn accelerometer(&mut self) -> [i16; 3];

    /// Samples the temperature sensor ADC.
    fn temperature_sample(&mut self) -> u16;
}

/// In-memory board with four LEDs and fixed sensor values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedBoard {
    leds: [bool; 4],
    accelerometer: [i16; 3],
    temperature_sample: u16,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBoard {
    /// Creates a board with every LED off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            leds: [false; 4],
            accelerometer: [0, 0, 0],
            temperature_sample: DEFAULT_TEMPERATURE_SAMPLE,
        }
    }

    /// Returns the state of an LED, or `None` for a non-LED id.
    #[must_use]
    pub fn led(&self, id: i32) -> Option<bool> {
        led_index(id).map(|index| self.leds[index])
    }

    /// Sets the value the accelerometer reports.
    pub fn set_accelerometer(&mut self, measure: [i16; 3]) {
        self.accelerometer = measure;
    }

    /// Sets the raw ADC sample the temperature sensor reports.
    pub fn set_temperature_sample(&mut self, sample: u16) {
        self.temperature_sample = sample;
    }
}

impl Board for SimulatedBoard {
    fn set_led(&mut self, id: i32, on: bool) -> bool {
        match led_index(id) {
            Some(index) => {
                self.leds[index] = on;
                true
            }
            None => false,
        }
    }

    fn accelerometer(&mut self) -> [i16; 3] {
        self.accelerometer
    }

    fn temperature_sample(&mut self) -> u16 {
        self.temperature_sample
    }
}

fn led_index(id: i32) -> Option<usize> {
    if (FIRST_LED_ID..=LAST_LED_ID).contains(&id) {
        usize::try_from(id - FIRST_LED_ID).ok()
    } else {
        None
    }
}

// ============================================================================
// Firmware
// ============================================================================

/// Command interpreter running on a [`Board`].
#[derive(Debug, Clone, Default)]
pub struct Firmware<B = SimulatedBoard> {
    board: B,
}

impl<B: Board> Firmware<B> {
    /// Creates firmware driving `board`.
    #[must_use]
    pub fn new(board: B) -> Self {
        Self { board }
    }

    /// Returns the board.
    #[inline]
    #[must_use]
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Returns the board mutably.
    #[inline]
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Executes a decoded command; `None` means the firmware stays silent.
    pub fn execute(&mut self, command: &Command) -> Option<DevicePayload> {
        match command.name {
            CommandName::On | CommandName::Off => {
                let on = command.name == CommandName::On;
                self.board
                    .set_led(command.id, on)
                    .then_some(DevicePayload::Actuator { id: command.id })
            }
            CommandName::Read => match command.id {
                ACCELEROMETER_ID => Some(DevicePayload::Accelerometer {
                    measure: self.board.accelerometer(),
                }),
                TEMPERATURE_ID => Some(DevicePayload::Temperature {
                    celsius: temperature_from_sample(self.board.temperature_sample()),
                }),
                _ => None,
            },
        }
    }

    /// Handles one received line.
    pub fn handle_line(&mut self, line: &str) -> Option<DevicePayload> {
        match Command::decode(line) {
            Ok(command) => {
                let payload = self.execute(&command);
                if payload.is_none() {
                    debug!(%command, "No handler for command id");
                }
                payload
            }
            Err(Error::UnknownCommand { command }) => {
                debug!(%command, "Unknown command");
                Some(DevicePayload::Failure {
                    code: DEVICE_ERROR_UNKNOWN_COMMAND,
                })
            }
            Err(e) => {
                trace!(error = %e, "Dropping unparseable frame");
                None
            }
        }
    }

    /// Frames an answer the way the firmware writes it: text, terminator and
    /// NUL padding up to the response capacity.
    #[must_use]
    pub fn frame(payload: &DevicePayload) -> Vec<u8> {
        let mut bytes = payload.to_string().into_bytes();
        bytes.push(FRAME_TERMINATOR);
        bytes.resize(RESPONSE_CAPACITY.max(bytes.len()), 0);
        bytes
    }
}

// ============================================================================
// Tests
// ============================================================================
