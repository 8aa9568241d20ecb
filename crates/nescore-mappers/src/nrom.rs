//! Mapper 0 (NROM): no banking at all.
//!
//! 16 KiB or 32 KiB PRG-ROM, mirrored into the full `$8000..=$FFFF` window
//! when only 16 KiB is present; 8 KiB CHR-ROM or CHR-RAM. No register
//! writes have any effect.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::bank::{chr_offset, pgr_offset, set_chr_map, set_pgr_map, ChrMap, PgrMap};
use crate::mapper::Mirroring;
use crate::rom::Rom;

/// NROM mapper state.
#[derive(Debug, Clone)]
pub struct Nrom {
    pub(crate) prg_rom: Vec<u8>,
    pub(crate) chr: Vec<u8>,
    pub(crate) prg_ram: Vec<u8>,
    pub(crate) chr_is_ram: bool,
    pub(crate) mirroring: Mirroring,
    pub(crate) has_battery: bool,
    pgr_map: PgrMap,
    chr_map: ChrMap,
}

impl Nrom {
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let chr_is_ram = rom.header.chr_rom_banks == 0;
        let chr = if chr_is_ram {
            vec![0u8; 8192]
        } else {
            rom.chr_rom.clone()
        };

        let mut pgr_map = [0usize; 4];
        if rom.prg_rom.len() == 0x8000 {
            set_pgr_map(&mut pgr_map, rom.prg_rom.len(), 0x8000, 0, 0);
        } else {
            set_pgr_map(&mut pgr_map, rom.prg_rom.len(), 0x4000, 0, 0);
            set_pgr_map(&mut pgr_map, rom.prg_rom.len(), 0x4000, 1, 0);
        }
        let mut chr_map = [0usize; 8];
        set_chr_map(&mut chr_map, chr.len(), 0x2000, 0, 0);

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr,
            prg_ram: vec![0u8; rom.header.prg_ram_banks as usize * 0x2000],
            chr_is_ram,
            mirroring: rom.header.mirroring,
            has_battery: rom.header.has_battery,
            pgr_map,
            chr_map,
        }
    }

    #[must_use]
    pub fn mem_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => self.prg_rom[pgr_offset(&self.pgr_map, addr - 0x8000)],
            _ => 0,
        }
    }

    pub fn mem_write(&mut self, addr: u16, value: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            self.prg_ram[(addr - 0x6000) as usize] = value;
        }
    }

    #[must_use]
    pub fn chr_mem_read(&self, addr: u16) -> u8 {
        self.chr[chr_offset(&self.chr_map, addr)]
    }

    pub fn chr_mem_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let offset = chr_offset(&self.chr_map, addr);
            self.chr[offset] = value;
        }
    }
}
