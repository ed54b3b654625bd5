//! HD44780 character LCD behind a PCF8574 I2C port expander.
//!
//! The expander drives the display's 4-bit bus: each controller byte crosses
//! the wire as two data nibbles, each latched by pulsing the enable line. The
//! controller powers up in 8-bit mode; [`Lcd::init`] walks the datasheet
//! handshake (three 0x3 nibbles with long settles, then 0x2) to force it into
//! 4-bit mode before any framed command is legal.
//!
//! The display is slow: commands need tens of microseconds to settle and
//! clear/home take about 2 ms. Pacing is enforced through the caller-supplied
//! microsecond delay, never by the bus.
#![cfg_attr(not(test), no_std)]

use arbitrary_int::u4;
use bitbybit::bitfield;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::Write;

/// Wiring of the expander port to the display control lines.
#[bitfield(u8, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Port {
    #[bits(4..=7, rw)]
    data: u4,
    #[bit(3, rw)]
    backlight: bool,
    #[bit(2, rw)]
    enable: bool,
    #[bit(1, rw)]
    read: bool,
    #[bit(0, rw)]
    register_select: bool,
}

// HD44780 instruction set.
const CLEAR_DISPLAY: u8 = 0x01;
const RETURN_HOME: u8 = 0x02;
const ENTRY_MODE_SET: u8 = 0x04;
const DISPLAY_CONTROL: u8 = 0x08;
const FUNCTION_SET: u8 = 0x20;
const SET_DDRAM_ADDR: u8 = 0x80;

// ENTRY_MODE_SET flags.
const ENTRY_LEFT: u8 = 0x02;

// DISPLAY_CONTROL flags.
const DISPLAY_ON: u8 = 0x04;
const CURSOR_ON: u8 = 0x02;
const BLINK_ON: u8 = 0x01;

// FUNCTION_SET flags. 4-bit bus is implied by the handshake.
const TWO_LINES: u8 = 0x08;
const FONT_5X10: u8 = 0x04;

// DDRAM base address per row.
const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error<E> {
    #[error("display bus")]
    Bus(E),
}

impl<E> From<E> for Error<E> {
    fn from(bus: E) -> Self {
        Self::Bus(bus)
    }
}

/// Character geometry of the attached panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub cols: u8,
    pub rows: u8,
}

pub struct Lcd<I2C, D> {
    i2c: I2C,
    delay: D,
    addr: u8,
    geometry: Geometry,
    display_control: u8,
    backlight: bool,
}

impl<I2C, D, E> Lcd<I2C, D>
where
    I2C: Write<Error = E>,
    D: DelayUs<u32>,
{
    pub fn new(i2c: I2C, delay: D, addr: u8, geometry: Geometry) -> Self {
        Self {
            i2c,
            delay,
            addr,
            geometry,
            display_control: 0,
            backlight: true,
        }
    }

    /// Run the power-on handshake and leave the display on, cleared, cursor
    /// home, left-to-right entry.
    pub fn init(&mut self, large_font: bool) -> Result<(), Error<E>> {
        // Worst-case power-on reset time before the controller accepts
        // anything at all.
        self.delay.delay_us(50_000);
        self.expander_write(Port::DEFAULT)?;

        // Three times 8-bit function set: the controller may be in 8-bit
        // mode, 4-bit mode, or mid-nibble; this resynchronizes all three.
        self.write4bits(u4::new(0x3))?;
        self.delay.delay_us(4_500);
        self.write4bits(u4::new(0x3))?;
        self.delay.delay_us(4_500);
        self.write4bits(u4::new(0x3))?;
        self.delay.delay_us(150);
        // Now switch to the 4-bit bus.
        self.write4bits(u4::new(0x2))?;

        let mut function = FUNCTION_SET;
        if self.geometry.rows > 1 {
            function |= TWO_LINES;
        }
        // Some one-row panels carry the taller font.
        if large_font && self.geometry.rows == 1 {
            function |= FONT_5X10;
        }
        self.command(function)?;

        self.display_control = DISPLAY_ON;
        self.command(DISPLAY_CONTROL | self.display_control)?;
        self.clear()?;
        self.command(ENTRY_MODE_SET | ENTRY_LEFT)?;
        self.home()
    }

    pub fn clear(&mut self) -> Result<(), Error<E>> {
        self.command(CLEAR_DISPLAY)?;
        self.delay.delay_us(2_000);
        Ok(())
    }

    pub fn home(&mut self) -> Result<(), Error<E>> {
        self.command(RETURN_HOME)?;
        self.delay.delay_us(2_000);
        Ok(())
    }

    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Error<E>> {
        let row = row.min(self.geometry.rows.saturating_sub(1));
        self.command(SET_DDRAM_ADDR | (col + ROW_OFFSETS[row as usize]))
    }

    /// Write text at the current cursor position.
    pub fn print(&mut self, text: &[u8]) -> Result<(), Error<E>> {
        for byte in text {
            self.send(*byte, true)?;
        }
        Ok(())
    }

    pub fn display_on(&mut self, on: bool) -> Result<(), Error<E>> {
        self.set_control(DISPLAY_ON, on)
    }

    pub fn cursor_on(&mut self, on: bool) -> Result<(), Error<E>> {
        self.set_control(CURSOR_ON, on)
    }

    pub fn blink_on(&mut self, on: bool) -> Result<(), Error<E>> {
        self.set_control(BLINK_ON, on)
    }

    pub fn backlight(&mut self, on: bool) -> Result<(), Error<E>> {
        self.backlight = on;
        self.expander_write(Port::DEFAULT)
    }

    fn set_control(&mut self, flag: u8, on: bool) -> Result<(), Error<E>> {
        if on {
            self.display_control |= flag;
        } else {
            self.display_control &= !flag;
        }
        self.command(DISPLAY_CONTROL | self.display_control)
    }

    fn command(&mut self, value: u8) -> Result<(), Error<E>> {
        self.send(value, false)
    }

    /// Frame one controller byte: high nibble, then low nibble, each latched
    /// by an enable pulse.
    fn send(&mut self, value: u8, data: bool) -> Result<(), Error<E>> {
        let port = Port::DEFAULT.with_register_select(data);
        self.write_nibble(port.with_data(u4::new(value >> 4)))?;
        self.write_nibble(port.with_data(u4::new(value & 0xf)))
    }

    fn write4bits(&mut self, nibble: u4) -> Result<(), Error<E>> {
        self.write_nibble(Port::DEFAULT.with_data(nibble))
    }

    fn write_nibble(&mut self, port: Port) -> Result<(), Error<E>> {
        self.expander_write(port)?;
        // Latch: enable must be high for >450 ns, and the controller needs
        // >37 µs before the next access.
        self.expander_write(port.with_enable(true))?;
        self.delay.delay_us(1);
        self.expander_write(port.with_enable(false))?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn expander_write(&mut self, port: Port) -> Result<(), Error<E>> {
        let byte = port.with_backlight(self.backlight).raw_value();
        self.i2c.write(self.addr, &[byte])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeBus {
        written: Vec<(u8, u8)>,
    }

    impl Write for &mut FakeBus {
        type Error = core::convert::Infallible;

        fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
            for byte in bytes {
                self.written.push((addr, *byte));
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayUs<u32> for NoDelay {
        fn delay_us(&mut self, _us: u32) {}
    }

    fn lcd(bus: &mut FakeBus) -> Lcd<&mut FakeBus, NoDelay> {
        Lcd::new(
            bus,
            NoDelay,
            0x27,
            Geometry { cols: 16, rows: 2 },
        )
    }

    /// Expander bytes for one framed controller byte with backlight on.
    fn framed(value: u8, data: bool) -> [u8; 6] {
        let rs = data as u8;
        let hi = (value & 0xf0) | 0x08 | rs;
        let lo = ((value << 4) & 0xf0) | 0x08 | rs;
        [hi, hi | 0x04, hi, lo, lo | 0x04, lo]
    }

    #[test]
    fn init_resynchronizes_to_4bit_mode() {
        let mut bus = FakeBus::default();
        lcd(&mut bus).init(false).unwrap();

        let bytes: Vec<u8> =
            bus.written.iter().map(|(_, b)| *b).collect();
        // Expander reset, then three 8-bit function-set nibbles, then the
        // 4-bit switch, each nibble latched by an enable pulse.
        let mut expected = vec![0x08];
        for nibble in [0x30u8, 0x30, 0x30, 0x20] {
            let n = nibble | 0x08;
            expected.extend([n, n | 0x04, n]);
        }
        assert_eq!(&bytes[..expected.len()], &expected[..]);
        // First framed command is function set: 4-bit, two lines.
        assert_eq!(
            &bytes[expected.len()..expected.len() + 6],
            &framed(FUNCTION_SET | TWO_LINES, false)
        );
    }

    #[test]
    fn data_sets_register_select() {
        let mut bus = FakeBus::default();
        {
            let mut lcd = lcd(&mut bus);
            lcd.print(b"A").unwrap();
        }
        let bytes: Vec<u8> =
            bus.written.iter().map(|(_, b)| *b).collect();
        assert_eq!(&bytes[..], &framed(b'A', true));
        // Every byte of a data frame carries RS.
        assert!(bytes.iter().all(|b| b & 0x01 != 0));
    }

    #[test]
    fn cursor_addressing_uses_row_offsets() {
        let mut bus = FakeBus::default();
        {
            let mut lcd = lcd(&mut bus);
            lcd.set_cursor(3, 1).unwrap();
        }
        let bytes: Vec<u8> =
            bus.written.iter().map(|(_, b)| *b).collect();
        assert_eq!(&bytes[..], &framed(SET_DDRAM_ADDR | (0x40 + 3), false));
    }

    #[test]
    fn cursor_row_is_clamped_to_panel() {
        let mut bus = FakeBus::default();
        {
            let mut lcd = lcd(&mut bus);
            lcd.set_cursor(0, 7).unwrap();
        }
        let bytes: Vec<u8> =
            bus.written.iter().map(|(_, b)| *b).collect();
        assert_eq!(&bytes[..], &framed(SET_DDRAM_ADDR | 0x40, false));
    }

    #[test]
    fn writes_target_the_expander_address() {
        let mut bus = FakeBus::default();
        {
            let mut lcd = lcd(&mut bus);
            lcd.home().unwrap();
        }
        assert!(bus.written.iter().all(|(addr, _)| *addr == 0x27));
    }

    #[test]
    fn backlight_bit_follows_state() {
        let mut bus = FakeBus::default();
        {
            let mut lcd = lcd(&mut bus);
            lcd.backlight(false).unwrap();
            lcd.clear().unwrap();
        }
        // After backlight-off, no written byte carries the backlight bit.
        assert!(bus.written.iter().all(|(_, b)| b & 0x08 == 0));
    }
}
