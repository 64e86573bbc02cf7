//! In-memory ROM images and loaders for the raw Alto II PROM dumps.
//!
//! The physical PROMs were wired with scrambled address lines and
//! active-low data, so the dump files have to be descrambled before
//! use: the constant ROM is stored as four nibble planes with a
//! permuted address bus, the microcode ROMs as eight nibble planes
//! per 1K bank with inverted addresses and a partially inverted data
//! word, and the AC source dispatch PROM with a bit-reversed,
//! inverted address bus.
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::types::Word;

/// Bits of a raw microcode word that the PROMs store inverted.
const UROM_INVERTED_BITS: u32 = 0xfff7_7bff;

/// Constant ROM address line permutation; bit `i` of the logical
/// address drives bit `CROM_ADDRESS_MAP[i]` of the chip address.
const CROM_ADDRESS_MAP: [u32; 8] = [7, 2, 1, 0, 3, 4, 5, 6];

/// Nibble plane files making up the 2K microcode ROM, low bank first.
const UROM_FILES: [&str; 16] = [
    "U55", "U64", "U65", "U63", "U53", "U60", "U61", "U62", // bank 0
    "U54", "U74", "U75", "U73", "U52", "U70", "U71", "U72", // bank 1 (Mesa 5.0)
];

/// A problem reading or validating a ROM dump file.
#[derive(Debug)]
pub enum RomImageError {
    Read { path: PathBuf, error: io::Error },
    WrongLength { path: PathBuf, expected: usize, actual: usize },
}

impl Display for RomImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RomImageError::Read { path, error } => {
                write!(f, "failed to read ROM image {}: {}", path.display(), error)
            }
            RomImageError::WrongLength {
                path,
                expected,
                actual,
            } => write!(
                f,
                "ROM image {} is {} bytes long but should be {}",
                path.display(),
                actual,
                expected
            ),
        }
    }
}

impl std::error::Error for RomImageError {}

fn read_exactly(path: PathBuf, expected: usize) -> Result<Vec<u8>, RomImageError> {
    let data = fs::read(&path).map_err(|error| RomImageError::Read {
        path: path.clone(),
        error,
    })?;
    if data.len() == expected {
        Ok(data)
    } else {
        Err(RomImageError::WrongLength {
            path,
            expected,
            actual: data.len(),
        })
    }
}

fn permute_crom_address(addr: usize) -> usize {
    let mut mapped = 0;
    for (i, bit) in CROM_ADDRESS_MAP.iter().enumerate() {
        if addr & (1 << i) != 0 {
            mapped |= 1 << bit;
        }
    }
    mapped
}

fn reverse_nibble(data: u8) -> u8 {
    let mut reversed = 0;
    for i in 0..4 {
        if data & (1 << i) != 0 {
            reversed |= 1 << (3 - i);
        }
    }
    reversed
}

fn reverse_byte(data: u8) -> u8 {
    let mut reversed = 0;
    for i in 0..8 {
        if data & (1 << i) != 0 {
            reversed |= 1 << (7 - i);
        }
    }
    reversed
}

fn unscramble_urom_word(word: u32) -> u32 {
    (!word & UROM_INVERTED_BITS) | (word & !UROM_INVERTED_BITS)
}

/// The 256-word constant ROM, indexed by `rselect ‖ bs`.
#[derive(Clone)]
pub struct ConstantRom {
    words: [Word; 256],
}

impl ConstantRom {
    #[must_use]
    pub fn from_words(words: [Word; 256]) -> ConstantRom {
        ConstantRom { words }
    }

    /// Descramble the four nibble-plane dump files `C0`..`C3`.
    pub fn load(dir: &Path) -> Result<ConstantRom, RomImageError> {
        let mut planes: Vec<Vec<u8>> = Vec::with_capacity(4);
        for name in ["C0", "C1", "C2", "C3"] {
            planes.push(read_exactly(dir.join(name), 256)?);
        }
        let mut words = [0; 256];
        for (plane, data) in planes.iter().enumerate() {
            let shift = 12 - 4 * plane;
            for (addr, word) in words.iter_mut().enumerate() {
                let nibble = Word::from(reverse_nibble(data[permute_crom_address(addr)] & 0xf));
                *word |= nibble << shift;
            }
        }
        for word in &mut words {
            *word = !*word;
        }
        Ok(ConstantRom { words })
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Word {
        self.words[index & 0xff]
    }
}

impl Default for ConstantRom {
    fn default() -> ConstantRom {
        ConstantRom { words: [0; 256] }
    }
}

/// The 256-nibble AC source dispatch PROM used by the emulator task's
/// IDISP and ACSOURCE special functions.
#[derive(Clone)]
pub struct AcSourceRom {
    nibbles: [u8; 256],
}

impl AcSourceRom {
    #[must_use]
    pub fn from_nibbles(nibbles: [u8; 256]) -> AcSourceRom {
        AcSourceRom { nibbles }
    }

    /// Descramble the `ACSOURCE.NEW` dump file.
    pub fn load(dir: &Path) -> Result<AcSourceRom, RomImageError> {
        let data = read_exactly(dir.join("ACSOURCE.NEW"), 256)?;
        let mut nibbles = [0; 256];
        for (addr, nibble) in nibbles.iter_mut().enumerate() {
            let chip_addr = !reverse_byte(addr as u8) & 0xff;
            *nibble = !reverse_nibble(data[usize::from(chip_addr)] & 0xf) & 0xf;
        }
        Ok(AcSourceRom { nibbles })
    }

    #[must_use]
    pub fn get(&self, index: usize) -> u8 {
        self.nibbles[index & 0xff]
    }
}

impl Default for AcSourceRom {
    fn default() -> AcSourceRom {
        AcSourceRom { nibbles: [0; 256] }
    }
}

/// Raw (undecoded) contents of the two 1K microcode ROM banks.
#[derive(Clone)]
pub struct MicrocodeRom {
    words: Box<[u32; 2048]>,
}

impl MicrocodeRom {
    #[must_use]
    pub fn from_words(words: [u32; 2048]) -> MicrocodeRom {
        MicrocodeRom {
            words: Box::new(words),
        }
    }

    /// Descramble the sixteen nibble-plane dump files `U52`..`U75`.
    /// The first eight make up ROM bank 0, the rest bank 1.
    pub fn load(dir: &Path) -> Result<MicrocodeRom, RomImageError> {
        let mut words = Box::new([0u32; 2048]);
        for (plane, name) in UROM_FILES.iter().enumerate() {
            let data = read_exactly(dir.join(name), 1024)?;
            let base = if plane < 8 { 0 } else { 1024 };
            let shift = 28 - 4 * (plane % 8);
            for addr in 0..1024usize {
                let chip_addr = !addr & 0x3ff;
                words[base + addr] |= u32::from(data[chip_addr] & 0xf) << shift;
            }
        }
        for word in words.iter_mut() {
            *word = unscramble_urom_word(*word);
        }
        Ok(MicrocodeRom { words })
    }

    #[must_use]
    pub fn bank0(&self) -> &[u32] {
        &self.words[..1024]
    }

    #[must_use]
    pub fn bank1(&self) -> &[u32] {
        &self.words[1024..]
    }
}

impl Default for MicrocodeRom {
    fn default() -> MicrocodeRom {
        MicrocodeRom {
            words: Box::new([0; 2048]),
        }
    }
}
