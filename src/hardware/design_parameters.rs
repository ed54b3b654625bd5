use super::adc::{AnalogInput, Oversample};

/// The system core clock after PLL setup. All timer arithmetic derives from
/// this value.
pub const SYSTEM_CLOCK_HZ: u32 = 80_000_000;

/// ADC trigger rate of the sampling timer. With the configured oversampling
/// the reported sample rate is `SAMPLE_RATE_HZ / OVERSAMPLE.factor()`.
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Hardware sample averaging applied by the converter: 8 raw conversions per
/// reported code.
pub const OVERSAMPLE: Oversample = Oversample::X8;

/// Number of analog sensors sampled per sequence.
pub const SENSOR_CHANNELS: usize = 3;

/// Sequence step assignment: throttle, brake pressure, steering.
pub const SENSOR_INPUTS: [AnalogInput; SENSOR_CHANNELS] = [
    AnalogInput::Ain0, // PE3, throttle
    AnalogInput::Ain1, // PE2, brake pressure
    AnalogInput::Ain6, // PD1, steering
];

/// Bus address of the PCF8574 behind the character LCD.
pub const LCD_ADDR: u8 = 0x3f;

/// Attached panel geometry.
pub const LCD_COLS: u8 = 16;
pub const LCD_ROWS: u8 = 2;

/// Period of the acquisition task publishing into the reading mailbox.
pub const ACQUIRE_PERIOD_MS: u32 = 5;

/// Period of the display task consuming from the mailbox.
pub const DISPLAY_PERIOD_MS: u32 = 100;

/// Bounded wait of the display task's mailbox receive.
pub const RECEIVE_POLL_MS: u32 = 10;
