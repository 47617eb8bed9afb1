use crate::timing::Delay;
use std::fmt;
use std::time::Duration;

/// Direction of the eight shared data lines, seen from the engine side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDirection {
    /// engine drives the data lines (command and character writes)
    Output,
    /// controller drives the data lines (status reads)
    Input,
}

/// One 8-bit parallel data bus plus three control signals: register-select,
/// read/write, and enable. The driver is the only caller; whatever sits on
/// the far side (the simulated panel, or a recording double in tests) just
/// has to latch writes on the enable pulse and drive its status onto the
/// data lines during reads.
pub trait LcdBus {
    /// switch the data lines between engine-driven and controller-driven
    fn set_direction(&mut self, dir: BusDirection);

    /// drive the data lines; meaningful while the bus is in Output
    fn write_data(&mut self, data: u8);

    /// sample the data lines; meaningful while the bus is in Input
    fn read_data(&mut self) -> u8;

    /// set the register-select and read/write lines
    fn set_control(&mut self, rs: bool, rw: bool);

    /// pulse the enable line; the controller latches a write, or drives its
    /// output latch for a read
    fn pulse_enable(&mut self);
}

/// Protocol phase of the driver. Every public operation starts and ends in
/// `Idle`; the bus-direction switch only ever happens in `AwaitingReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    AwaitingReady,
    Writing,
}

/// Errors surfaced at the protocol boundary.
///
/// The original firmware spins on the busy flag forever; here the poll count
/// is bounded so a wedged controller surfaces as an error instead of a
/// silent hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdError {
    /// the controller's busy flag never cleared within the poll budget
    PeripheralTimeout { polls: u32 },
}

impl fmt::Display for LcdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LcdError::PeripheralTimeout { polls } => {
                write!(f, "display controller still busy after {} polls", polls)
            }
        }
    }
}

impl std::error::Error for LcdError {}

/// busy flag lives in the top bit of a status read
const BUSY: u8 = 0b1000_0000;

/// display-memory addressing commands carry the address in the low 7 bits
const SET_DDRAM_ADDR: u8 = 0b1000_0000;

/// clear display and home the address counter
pub const LCD_CLEAR: u8 = 0b0000_0001;

const FUNCTION_8BIT_2LINE: u8 = 0b0011_1000;
const DISPLAY_ON_CURSOR: u8 = 0b0000_1110;
const ENTRY_INCREMENT: u8 = 0b0000_0110;

/// poll budget before a busy wait gives up; a live controller clears the
/// flag within a handful of polls
pub const MAX_BUSY_POLLS: u32 = 100_000;

// settle times, from the controller's datasheet timings
const ENABLE_HOLD: Duration = Duration::from_micros(5);
const READ_RECOVER: Duration = Duration::from_micros(10);
const COMMAND_SETTLE: Duration = Duration::from_millis(10);
const CHAR_SETTLE: Duration = Duration::from_micros(10);
const INIT_STEP_GAP: Duration = Duration::from_millis(5);
const CLEAR_SETTLE: Duration = Duration::from_millis(10);
const POWER_ON_WAIT: Duration = Duration::from_millis(500);

/// Issues raw command/character writes over an [`LcdBus`], enforcing the
/// busy-flag handshake and the read/write bus-direction discipline. All
/// display traffic in the machine funnels through here.
pub struct LcdDriver<B: LcdBus, D: Delay> {
    bus: B,
    delay: D,
    state: DriverState,
}

impl<B: LcdBus, D: Delay> LcdDriver<B, D> {
    pub fn new(bus: B, delay: D) -> LcdDriver<B, D> {
        LcdDriver {
            bus,
            delay,
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Poll the controller until its busy flag clears. Mandatory before
    /// every command or character write; this is the machine's only
    /// synchronization primitive. Switches the data bus to read mode for
    /// the polls and restores write mode before returning.
    ///
    /// The poll count is bounded (see [`MAX_BUSY_POLLS`]); a controller
    /// that never reports ready yields [`LcdError::PeripheralTimeout`]
    /// with the bus restored to write mode.
    pub fn await_ready(&mut self) -> Result<(), LcdError> {
        self.state = DriverState::AwaitingReady;
        self.bus.set_direction(BusDirection::Input);

        let mut polls = 0;
        loop {
            self.bus.set_control(false, true);
            self.bus.pulse_enable();
            self.delay.pause(ENABLE_HOLD);
            if self.bus.read_data() & BUSY == 0 {
                break;
            }
            polls += 1;
            if polls >= MAX_BUSY_POLLS {
                self.restore_write_mode();
                return Err(LcdError::PeripheralTimeout { polls });
            }
        }

        self.restore_write_mode();
        self.delay.pause(READ_RECOVER);
        Ok(())
    }

    fn restore_write_mode(&mut self) {
        self.bus.set_control(false, false);
        self.bus.set_direction(BusDirection::Output);
        self.state = DriverState::Idle;
    }

    /// write to the controller's instruction register
    pub fn write_command(&mut self, cmd: u8) -> Result<(), LcdError> {
        self.write_byte(cmd, false, COMMAND_SETTLE)
    }

    /// write to the controller's character memory at the current cursor
    pub fn write_char(&mut self, ch: u8) -> Result<(), LcdError> {
        self.write_byte(ch, true, CHAR_SETTLE)
    }

    /// write a run of characters; the controller steps its own cursor
    pub fn write_str(&mut self, s: &str) -> Result<(), LcdError> {
        for b in s.bytes() {
            self.write_char(b)?;
        }
        Ok(())
    }

    /// move the cursor to a display-memory address
    pub fn set_cursor_addr(&mut self, addr: u8) -> Result<(), LcdError> {
        self.write_command(addr | SET_DDRAM_ADDR)
    }

    fn write_byte(&mut self, byte: u8, rs: bool, settle: Duration) -> Result<(), LcdError> {
        self.await_ready()?;
        self.state = DriverState::Writing;
        self.bus.set_control(rs, false);
        self.bus.write_data(byte);
        self.bus.pulse_enable();
        // release the bus between transfers
        self.bus.write_data(0);
        self.bus.set_control(false, false);
        self.state = DriverState::Idle;
        self.delay.pause(settle);
        Ok(())
    }

    /// One-time controller bring-up: 8-bit bus with two display lines,
    /// display on with a visible non-blinking cursor, auto-incrementing
    /// entry mode, then a clear. The controller is busy straight out of
    /// power-on, so this starts with a busy wait of its own.
    pub fn init(&mut self) -> Result<(), LcdError> {
        self.delay.pause(POWER_ON_WAIT);
        self.await_ready()?;
        self.write_command(FUNCTION_8BIT_2LINE)?;
        self.delay.pause(INIT_STEP_GAP);
        self.write_command(DISPLAY_ON_CURSOR)?;
        self.delay.pause(INIT_STEP_GAP);
        self.write_command(ENTRY_INCREMENT)?;
        self.delay.pause(INIT_STEP_GAP);
        self.write_command(LCD_CLEAR)?;
        self.delay.pause(CLEAR_SETTLE);
        log::debug!("display controller initialised");
        Ok(())
    }
}
