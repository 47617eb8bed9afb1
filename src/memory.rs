use std::io;
use std::io::Read;

/// cells in the unified instruction/data store
pub const MEMORY_CELLS: usize = 16;

const ADDR_MASK: u8 = 0x0f;

/// The machine's whole memory: sixteen byte cells shared between program
/// and data. Every address is masked to the 4-bit range, so out-of-range
/// access is not observable.
pub struct Memory {
    cells: [u8; MEMORY_CELLS],
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            cells: [0; MEMORY_CELLS],
        }
    }

    pub fn get(&self, addr: u8) -> u8 {
        self.cells[(addr & ADDR_MASK) as usize]
    }

    pub fn set(&mut self, addr: u8, value: u8) {
        self.cells[(addr & ADDR_MASK) as usize] = value;
    }

    /// copy a full program image in verbatim
    pub fn load_image(&mut self, image: &[u8; MEMORY_CELLS]) {
        self.cells = *image;
    }

    /// load a program image of up to sixteen bytes; a shorter image leaves
    /// the tail zeroed
    pub fn load(&mut self, reader: &mut impl io::Read) -> Result<(), io::Error> {
        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf)?;
        if len > MEMORY_CELLS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("program image is {} bytes; memory holds {}", len, MEMORY_CELLS),
            ));
        }
        self.cells = [0; MEMORY_CELLS];
        self.cells[..len].copy_from_slice(&buf);
        Ok(())
    }
}

/// counts upward on the output field: reload the counter, show it, bump it
/// by one, store it back, jump to the top. the reload at cell 0 runs only
/// once, because a taken jump to 0 resumes at cell 1
#[rustfmt::skip]
pub const PRG_COUNT: [u8; MEMORY_CELLS] = [
    0x1e,               // 0: LDA 14
    0xe0,               // 1: OUT
    0x51,               // 2: LDI 1
    0x2e,               // 3: ADD 14
    0x4e,               // 4: STA 14
    0x60,               // 5: JMP 0
    0, 0, 0, 0, 0, 0, 0, 0,
    0x10,               // 14: counter seed
    0,
];

/// difference shuffle: seeds a working cell, then loops rotating values
/// through cells 13-15 around a subtract, taking the carry branch while it
/// holds
#[rustfmt::skip]
pub const PRG_SHUFFLE: [u8; MEMORY_CELLS] = [
    0x51,               // 0: LDI 1
    0x4e,               // 1: STA 14
    0x50,               // 2: LDI 0
    0xe0,               // 3: OUT
    0x3e,               // 4: SUB 14
    0x4f,               // 5: STA 15
    0x1e,               // 6: LDA 14
    0x4d,               // 7: STA 13
    0x1f,               // 8: LDA 15
    0x4e,               // 9: STA 14
    0x1d,               // 10: LDA 13
    0x76,               // 11: JC 6
    0x63,               // 12: JMP 3
    0, 0, 0,
];
