use crate::lcd::{LcdBus, LcdError};
use crate::memory::{Memory, MEMORY_CELLS};
use crate::readout::Readout;
use crate::timing::Delay;
use std::io;
use std::time::Duration;

/// default pacing between instructions
pub const DEFAULT_TICK: Duration = Duration::from_millis(25);

const PC_MASK: u8 = 0x0f;

/// run state; `Halted` is terminal, nothing leaves it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

/// Top-nibble opcode. Nibbles with no assigned behaviour (0 and 9 through
/// 13) fold to `Nop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    Lda,
    Add,
    Sub,
    Sta,
    Ldi,
    Jmp,
    Jc,
    Jz,
    Out,
    Hlt,
}

impl Opcode {
    pub fn decode(nibble: u8) -> Opcode {
        match nibble & 0x0f {
            0x1 => Opcode::Lda,
            0x2 => Opcode::Add,
            0x3 => Opcode::Sub,
            0x4 => Opcode::Sta,
            0x5 => Opcode::Ldi,
            0x6 => Opcode::Jmp,
            0x7 => Opcode::Jc,
            0x8 => Opcode::Jz,
            0xe => Opcode::Out,
            0xf => Opcode::Hlt,
            _ => Opcode::Nop,
        }
    }
}

/// The machine's register state in one owned value: accumulator, scratch
/// register, program counter, both flags and the run state. Mutated only by
/// [`Interpreter::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    pub a: u8,
    pub b: u8,
    pub pc: u8,
    pub zero: bool,
    pub carry: bool,
    pub state: State,
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            a: 0,
            b: 0,
            pc: 0,
            zero: false,
            carry: false,
            state: State::Running,
        }
    }
}

/// Fetch-decode-execute engine. Owns the CPU state, the 16-cell memory and
/// the readout; every observable effect of an instruction goes out through
/// the readout's protocol writes.
pub struct Interpreter<B: LcdBus, D: Delay> {
    cpu: Cpu,
    memory: Memory,
    readout: Readout<B, D>,
    delay: D,
    tick: Duration,
}

impl<B: LcdBus, D: Delay> Interpreter<B, D> {
    pub fn new(readout: Readout<B, D>, delay: D, tick: Duration) -> Interpreter<B, D> {
        Interpreter {
            cpu: Cpu::new(),
            memory: Memory::new(),
            readout,
            delay,
            tick,
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn bus(&self) -> &B {
        self.readout.bus()
    }

    pub fn is_running(&self) -> bool {
        self.cpu.state == State::Running
    }

    /// copy a built-in program image into memory
    pub fn load_image(&mut self, image: &[u8; MEMORY_CELLS]) {
        self.memory.load_image(image);
    }

    /// load a program image from a reader
    pub fn load(&mut self, reader: &mut impl io::Read) -> Result<(), io::Error> {
        self.memory.load(reader)
    }

    /// Run one fetch-decode-execute cycle. Stepping a halted machine does
    /// nothing. After dispatch the status field is refreshed regardless of
    /// opcode; the counter increment and the pacing tick only happen while
    /// still running.
    pub fn step(&mut self) -> Result<(), LcdError> {
        if self.cpu.state == State::Halted {
            return Ok(());
        }

        let cell = self.memory.get(self.cpu.pc);
        let opcode = Opcode::decode(cell >> 4);
        let operand = cell & 0x0f;
        log::trace!("{:x}: {:?} {:x}", self.cpu.pc, opcode, operand);

        match opcode {
            Opcode::Nop => {}
            Opcode::Lda => {
                let v = self.memory.get(operand);
                self.load_a(v)?;
            }
            Opcode::Add => {
                let b = self.load_b(operand)?;
                let sum = self.cpu.a as u16 + b as u16;
                self.settle_alu(sum);
            }
            Opcode::Sub => {
                // one's-complement subtract with no carry-in: the result is
                // one less than a true two's-complement difference
                let b = self.load_b(operand)?;
                let sum = self.cpu.a as u16 + (b ^ 0xff) as u16;
                self.settle_alu(sum);
            }
            Opcode::Sta => self.memory.set(operand, self.cpu.a),
            Opcode::Ldi => self.load_a(operand)?,
            Opcode::Jmp => self.cpu.pc = operand & PC_MASK,
            Opcode::Jc => {
                if self.cpu.carry {
                    self.cpu.pc = operand & PC_MASK;
                }
            }
            Opcode::Jz => {
                if self.cpu.zero {
                    self.cpu.pc = operand & PC_MASK;
                }
            }
            Opcode::Out => self.readout.show_output(self.cpu.a)?,
            Opcode::Hlt => {
                self.cpu.state = State::Halted;
                log::debug!("halted at {:x}", self.cpu.pc);
            }
        }

        self.readout
            .show_status(self.cpu.pc, self.cpu.zero, self.cpu.carry)?;

        if self.cpu.state == State::Running {
            // a taken jump still gets this increment, so a jump to x
            // resumes at x+1
            self.cpu.pc = (self.cpu.pc + 1) & PC_MASK;
            self.delay.pause(self.tick);
        }
        Ok(())
    }

    /// step until the machine halts
    pub fn run(&mut self) -> Result<(), LcdError> {
        while self.cpu.state == State::Running {
            self.step()?;
        }
        Ok(())
    }

    /// A <- v, with the display update and zero-flag refresh every
    /// accumulator load carries
    fn load_a(&mut self, v: u8) -> Result<(), LcdError> {
        self.cpu.a = v;
        self.readout.show_a(v)?;
        self.cpu.zero = v == 0;
        Ok(())
    }

    /// B <- memory[addr], with display update; feeds the ALU
    fn load_b(&mut self, addr: u8) -> Result<u8, LcdError> {
        let v = self.memory.get(addr);
        self.cpu.b = v;
        self.readout.show_b(v)?;
        Ok(v)
    }

    /// fold the 9-bit ALU result into A and both flags
    fn settle_alu(&mut self, sum: u16) {
        self.cpu.carry = sum > 0xff;
        self.cpu.a = (sum & 0xff) as u8;
        self.cpu.zero = self.cpu.a == 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::LcdDriver;
    use crate::memory::PRG_COUNT;
    use crate::panel::LcdPanel;
    use crate::timing::NoDelay;

    fn machine(image: &[u8]) -> Interpreter<LcdPanel, NoDelay> {
        let driver = LcdDriver::new(LcdPanel::new(), NoDelay);
        let mut m = Interpreter::new(Readout::new(driver), NoDelay, Duration::ZERO);
        let mut src = image;
        m.load(&mut src).unwrap();
        m
    }

    #[test]
    fn test_lda_loads_and_displays() {
        let mut m = machine(&[0x14, 0, 0, 0, 0xab]);
        m.step().unwrap();
        assert_eq!(m.cpu().a, 0xab);
        assert!(!m.cpu().zero);
        assert_eq!(&m.bus().line(0)[..4], "A=ab");
    }

    #[test]
    fn test_lda_zero_sets_zero_flag() {
        let mut m = machine(&[0x15]);
        m.step().unwrap();
        assert_eq!(m.cpu().a, 0);
        assert!(m.cpu().zero);
    }

    #[test]
    fn test_ldi_loads_the_operand_itself() {
        let mut m = machine(&[0x57]);
        m.step().unwrap();
        assert_eq!(m.cpu().a, 7);
        assert_eq!(&m.bus().line(0)[..4], "A=07");
    }

    #[test]
    fn test_add_sums_and_displays_b() {
        let mut m = machine(&[0x1e, 0x2f, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x05, 0x03]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().a, 8);
        assert_eq!(m.cpu().b, 3);
        assert!(!m.cpu().carry);
        assert_eq!(&m.bus().line(0)[5..9], "B=03");
    }

    #[test]
    fn test_add_carries_into_the_flag() {
        let mut m = machine(&[0x1e, 0x2f, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xf0, 0x20]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().a, 0x10);
        assert!(m.cpu().carry);
        assert!(!m.cpu().zero);
    }

    #[test]
    fn test_add_wrap_to_zero_sets_both_flags() {
        let mut m = machine(&[0x1e, 0x2f, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x80, 0x80]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().a, 0);
        assert!(m.cpu().carry);
        assert!(m.cpu().zero);
    }

    #[test]
    fn test_sub_is_ones_complement_without_carry_in() {
        // 5 minus 3 comes out as 1, not 2, with the carry set
        let mut m = machine(&[0x55, 0x3e, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x03]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().a, 1);
        assert!(m.cpu().carry);
        assert!(!m.cpu().zero);
    }

    #[test]
    fn test_sub_lands_on_zero_one_early() {
        let mut m = machine(&[0x55, 0x3e, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x04]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().a, 0);
        assert!(m.cpu().carry);
        assert!(m.cpu().zero);
    }

    #[test]
    fn test_sta_stores_without_touching_flags() {
        let mut m = machine(&[0x57, 0x43]);
        m.step().unwrap();
        let flags = (m.cpu().zero, m.cpu().carry);
        m.step().unwrap();
        assert_eq!(m.memory().get(3), 7);
        assert_eq!((m.cpu().zero, m.cpu().carry), flags);
    }

    #[test]
    fn test_taken_jump_resumes_one_past_the_target() {
        let mut m = machine(&[0x65]);
        m.step().unwrap();
        assert_eq!(m.cpu().pc, 6);
    }

    #[test]
    fn test_jc_falls_through_with_carry_clear() {
        let mut m = machine(&[0x75]);
        m.step().unwrap();
        assert_eq!(m.cpu().pc, 1);
    }

    #[test]
    fn test_jc_taken_with_carry_set() {
        // the add of 0x80+0x80 raises the carry first
        let mut m = machine(&[0x1e, 0x2f, 0x79, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x80, 0x80]);
        m.step().unwrap();
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().pc, 10);
    }

    #[test]
    fn test_jz_taken_with_zero_set() {
        let mut m = machine(&[0x50, 0x8c]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().pc, 13);
    }

    #[test]
    fn test_jz_falls_through_with_zero_clear() {
        let mut m = machine(&[0x51, 0x8c]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().pc, 2);
    }

    #[test]
    fn test_out_renders_one_digit_padded() {
        let mut m = machine(&[0x55, 0xe0]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(&m.bus().line(1)[..3], "  5");
    }

    #[test]
    fn test_out_renders_two_digits_padded() {
        let mut m = machine(&[0x1f, 0xe0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 42]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(&m.bus().line(1)[..3], " 42");
    }

    #[test]
    fn test_out_renders_three_digits() {
        let mut m = machine(&[0x1f, 0xe0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 137]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(&m.bus().line(1)[..3], "137");
    }

    #[test]
    fn test_hlt_freezes_the_machine() {
        let mut m = machine(&[0x52, 0xf0, 0x59]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.cpu().state, State::Halted);
        let frozen = *m.cpu();
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(*m.cpu(), frozen);
        assert_eq!(m.cpu().pc, 1);
        assert_eq!(m.cpu().a, 2);
    }

    #[test]
    fn test_run_stops_at_hlt() {
        let mut m = machine(&[0x55, 0xe0, 0xf0]);
        m.run().unwrap();
        assert_eq!(m.cpu().state, State::Halted);
        assert_eq!(&m.bus().line(1)[..3], "  5");
    }

    #[test]
    fn test_nop_group_leaves_everything_but_pc() {
        for nibble in [0x0u8, 0x9, 0xa, 0xb, 0xc, 0xd] {
            let mut m = machine(&[nibble << 4 | 0x7, 0, 0, 0, 0, 0, 0, 0xff]);
            let before = *m.cpu();
            m.step().unwrap();
            assert_eq!(m.cpu().a, before.a);
            assert_eq!(m.cpu().b, before.b);
            assert_eq!(m.cpu().zero, before.zero);
            assert_eq!(m.cpu().carry, before.carry);
            assert_eq!(m.cpu().pc, 1);
            assert_eq!(m.memory().get(7), 0xff);
        }
    }

    #[test]
    fn test_pc_wraps_at_the_top_of_memory() {
        let mut m = machine(&[]);
        for _ in 0..15 {
            m.step().unwrap();
        }
        assert_eq!(m.cpu().pc, 15);
        m.step().unwrap();
        assert_eq!(m.cpu().pc, 0);
    }

    #[test]
    fn test_pc_stays_in_range_for_many_cycles() {
        let mut m = machine(&crate::memory::PRG_SHUFFLE);
        for _ in 0..200 {
            m.step().unwrap();
            assert!(m.cpu().pc < 16);
        }
    }

    #[test]
    fn test_flags_are_stale_across_nops() {
        let mut m = machine(&[0x50, 0x07]);
        m.step().unwrap();
        assert!(m.cpu().zero);
        m.step().unwrap();
        assert!(m.cpu().zero);
        assert_eq!(&m.bus().line(0)[10..15], "P=1Z ");
    }

    #[test]
    fn test_status_shows_the_pre_increment_counter() {
        let mut m = machine(&[0x00]);
        m.step().unwrap();
        assert_eq!(&m.bus().line(0)[10..13], "P=0");
    }

    #[test]
    fn test_count_program_after_six_cycles() {
        let mut m = machine(&PRG_COUNT);
        for _ in 0..6 {
            m.step().unwrap();
        }
        assert_eq!(m.cpu().a, 0x11);
        assert_eq!(m.cpu().b, 0x10);
        assert!(!m.cpu().zero);
        assert!(!m.cpu().carry);
        assert_eq!(m.cpu().pc, 1);
        assert_eq!(m.memory().get(14), 0x11);
        assert_eq!(&m.bus().line(1)[..3], " 16");
    }
}
