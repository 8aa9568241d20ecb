//! Tagged-variant mapper dispatch.
//!
//! Each supported mapper chip gets its own state struct (`nrom`, `mmc1`,
//! `uxrom`, `cnrom`, `mmc3`); `Mapper` wraps them in a closed enum and
//! forwards every operation to the active variant with a plain `match`.
//! There is no mapper trait object — the variant list is fixed at compile
//! time, so dispatch never goes through a vtable.

use crate::cnrom::Cnrom;
use crate::mmc1::Mmc1;
use crate::mmc3::Mmc3;
use crate::nrom::Nrom;
use crate::rom::{Rom, RomError};
use crate::uxrom::Uxrom;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nametable mirroring mode, set from the header at load time and, for
/// some mappers, changed by runtime register writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mirroring {
    #[default]
    Horizontal,
    Vertical,
    SingleScreenLower,
    SingleScreenUpper,
    FourScreen,
}

/// A loaded cartridge's mapper chip.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mapper {
    Nrom(Nrom),
    Mmc1(Mmc1),
    Uxrom(Uxrom),
    Cnrom(Cnrom),
    Mmc3(Mmc3),
}

impl Mapper {
    /// Build the mapper named by `rom`'s header.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::UnsupportedMapper`] for any mapper number this
    /// crate has no implementation for.
    pub fn new(rom: &Rom) -> Result<Self, RomError> {
        let n = rom.header.mapper_number;
        match n {
            0 => {
                log::debug!("selected mapper {n} (NROM)");
                Ok(Self::Nrom(Nrom::new(rom)))
            }
            1 => {
                log::debug!("selected mapper {n} (MMC1)");
                Ok(Self::Mmc1(Mmc1::new(rom)))
            }
            2 => {
                log::debug!("selected mapper {n} (UxROM)");
                Ok(Self::Uxrom(Uxrom::new(rom)))
            }
            3 => {
                log::debug!("selected mapper {n} (CNROM)");
                Ok(Self::Cnrom(Cnrom::new(rom)))
            }
            4 => {
                log::debug!("selected mapper {n} (MMC3)");
                Ok(Self::Mmc3(Mmc3::new(rom)))
            }
            other => {
                log::warn!("rejected ROM: mapper {other} is not supported");
                Err(RomError::UnsupportedMapper(other))
            }
        }
    }

    /// Read CPU address space `$6000..=$FFFF`.
    #[must_use]
    pub fn mem_read(&self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.mem_read(addr),
            Self::Mmc1(m) => m.mem_read(addr),
            Self::Uxrom(m) => m.mem_read(addr),
            Self::Cnrom(m) => m.mem_read(addr),
            Self::Mmc3(m) => m.mem_read(addr),
        }
    }

    /// Write CPU address space `$6000..=$FFFF`.
    pub fn mem_write(&mut self, addr: u16, value: u8) {
        match self {
            Self::Nrom(m) => m.mem_write(addr, value),
            Self::Mmc1(m) => m.mem_write(addr, value),
            Self::Uxrom(m) => m.mem_write(addr, value),
            Self::Cnrom(m) => m.mem_write(addr, value),
            Self::Mmc3(m) => m.mem_write(addr, value),
        }
    }

    /// Read PPU pattern-table space `$0000..=$1FFF`.
    #[must_use]
    pub fn chr_mem_read(&self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.chr_mem_read(addr),
            Self::Mmc1(m) => m.chr_mem_read(addr),
            Self::Uxrom(m) => m.chr_mem_read(addr),
            Self::Cnrom(m) => m.chr_mem_read(addr),
            Self::Mmc3(m) => m.chr_mem_read(addr),
        }
    }

    /// Write PPU pattern-table space `$0000..=$1FFF` (only has an effect
    /// over CHR-RAM).
    pub fn chr_mem_write(&mut self, addr: u16, value: u8) {
        match self {
            Self::Nrom(m) => m.chr_mem_write(addr, value),
            Self::Mmc1(m) => m.chr_mem_write(addr, value),
            Self::Uxrom(m) => m.chr_mem_write(addr, value),
            Self::Cnrom(m) => m.chr_mem_write(addr, value),
            Self::Mmc3(m) => m.chr_mem_write(addr, value),
        }
    }

    #[must_use]
    pub fn mirroring(&self) -> Mirroring {
        match self {
            Self::Nrom(m) => m.mirroring,
            Self::Mmc1(m) => m.mirroring,
            Self::Uxrom(m) => m.mirroring,
            Self::Cnrom(m) => m.mirroring,
            Self::Mmc3(m) => m.mirroring,
        }
    }

    #[must_use]
    pub fn mapper_number(&self) -> u16 {
        match self {
            Self::Nrom(_) => 0,
            Self::Mmc1(_) => 1,
            Self::Uxrom(_) => 2,
            Self::Cnrom(_) => 3,
            Self::Mmc3(_) => 4,
        }
    }

    #[must_use]
    pub fn mapper_name(&self) -> &'static str {
        match self {
            Self::Nrom(_) => "NROM",
            Self::Mmc1(_) => "MMC1",
            Self::Uxrom(_) => "UxROM",
            Self::Cnrom(_) => "CNROM",
            Self::Mmc3(_) => "MMC3",
        }
    }

    #[must_use]
    pub fn has_battery(&self) -> bool {
        match self {
            Self::Nrom(m) => m.has_battery,
            Self::Mmc1(m) => m.has_battery,
            Self::Uxrom(m) => m.has_battery,
            Self::Cnrom(m) => m.has_battery,
            Self::Mmc3(m) => m.has_battery,
        }
    }

    /// The cartridge's own PRG-RAM, for a host to persist when
    /// [`has_battery`](Self::has_battery) is true.
    #[must_use]
    pub fn battery_ram(&self) -> Option<&[u8]> {
        if !self.has_battery() {
            return None;
        }
        Some(match self {
            Self::Nrom(m) => &m.prg_ram,
            Self::Mmc1(m) => &m.prg_ram,
            Self::Uxrom(m) => &m.prg_ram,
            Self::Cnrom(m) => &m.prg_ram,
            Self::Mmc3(m) => &m.prg_ram,
        })
    }

    /// Restore previously-saved battery PRG-RAM.
    pub fn set_battery_ram(&mut self, data: &[u8]) {
        let ram = match self {
            Self::Nrom(m) => &mut m.prg_ram,
            Self::Mmc1(m) => &mut m.prg_ram,
            Self::Uxrom(m) => &mut m.prg_ram,
            Self::Cnrom(m) => &mut m.prg_ram,
            Self::Mmc3(m) => &mut m.prg_ram,
        };
        let len = data.len().min(ram.len());
        ram[..len].copy_from_slice(&data[..len]);
    }

    /// Cartridge scanline-IRQ hook. Called once per visible scanline by the
    /// PPU; only MMC3 reacts to it.
    pub fn signal_scanline(&mut self) {
        if let Self::Mmc3(m) = self {
            m.signal_scanline();
        }
    }

    #[must_use]
    pub fn irq_pending(&self) -> bool {
        match self {
            Self::Mmc3(m) => m.irq_pending,
            _ => false,
        }
    }

    pub fn irq_acknowledge(&mut self) {
        if let Self::Mmc3(m) = self {
            m.irq_enabled = false;
            m.irq_pending = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirroring_default() {
        assert_eq!(Mirroring::default(), Mirroring::Horizontal);
    }
}
