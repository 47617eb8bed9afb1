use crate::lcd::{LcdBus, LcdDriver, LcdError};
use crate::panel;
use crate::timing::Delay;

// fixed field positions on the top row
const A_FIELD_ADDR: u8 = 0x00;
const B_FIELD_ADDR: u8 = 0x05;
const STATUS_FIELD_ADDR: u8 = 0x0a;

/// decimal output lands at the start of the second row
const OUTPUT_FIELD_ADDR: u8 = panel::ROW2_ADDR;

/// Fixed-layout rendering of machine state. Every write moves the
/// controller's cursor, so each field starts with its own explicit cursor
/// set rather than relying on carry-over position; the busy handshake
/// happens transitively in the driver.
pub struct Readout<B: LcdBus, D: Delay> {
    lcd: LcdDriver<B, D>,
}

impl<B: LcdBus, D: Delay> Readout<B, D> {
    pub fn new(lcd: LcdDriver<B, D>) -> Readout<B, D> {
        Readout { lcd }
    }

    pub fn bus(&self) -> &B {
        self.lcd.bus()
    }

    pub fn lcd_mut(&mut self) -> &mut LcdDriver<B, D> {
        &mut self.lcd
    }

    /// accumulator field: "A=" plus two lowercase hex digits
    pub fn show_a(&mut self, value: u8) -> Result<(), LcdError> {
        self.lcd.set_cursor_addr(A_FIELD_ADDR)?;
        self.lcd.write_str(&format!("A={:02x}", value))
    }

    /// scratch-register field: "B=" plus two lowercase hex digits
    pub fn show_b(&mut self, value: u8) -> Result<(), LcdError> {
        self.lcd.set_cursor_addr(B_FIELD_ADDR)?;
        self.lcd.write_str(&format!("B={:02x}", value))
    }

    /// program counter and flags: "P=" plus the counter's hex digit, then
    /// 'Z' and 'C' as literals when set, spaces when clear
    pub fn show_status(&mut self, pc: u8, zero: bool, carry: bool) -> Result<(), LcdError> {
        self.lcd.set_cursor_addr(STATUS_FIELD_ADDR)?;
        self.lcd.write_str(&format!("P={:x}", pc & 0x0f))?;
        self.lcd.write_char(if zero { b'Z' } else { b' ' })?;
        self.lcd.write_char(if carry { b'C' } else { b' ' })
    }

    /// output field: right-justified decimal in exactly three cells
    pub fn show_output(&mut self, value: u8) -> Result<(), LcdError> {
        self.lcd.set_cursor_addr(OUTPUT_FIELD_ADDR)?;
        self.lcd.write_str(&format!("{:>3}", value))
    }
}
