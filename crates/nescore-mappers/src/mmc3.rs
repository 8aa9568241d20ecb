//! Mapper 4 (MMC3): fine-grained 8 KiB PRG banking, 1 KiB/2 KiB CHR
//! banking, and a scanline-counter IRQ.
//!
//! Bank select ($8000) picks which of eight bank registers the next $8001
//! write lands in, and carries the PRG/CHR mode bits. $A000/$A001 set
//! mirroring and (ignored) PRG-RAM write protection. $C000/$C001 load the
//! IRQ reload value and schedule a reload; $E000/$E001 disable/enable the
//! IRQ. [`Mmc3::signal_scanline`] clocks the counter once per visible
//! scanline.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::bank::{chr_offset, pgr_offset, set_chr_map, set_pgr_map, ChrMap, PgrMap};
use crate::mapper::Mirroring;
use crate::rom::Rom;

/// MMC3 mapper state.
#[derive(Debug, Clone)]
pub struct Mmc3 {
    pub(crate) prg_rom: Vec<u8>,
    pub(crate) chr: Vec<u8>,
    pub(crate) prg_ram: Vec<u8>,
    pub(crate) chr_is_ram: bool,
    pub(crate) mirroring: Mirroring,
    pub(crate) has_battery: bool,
    pgr_map: PgrMap,
    chr_map: ChrMap,

    bank_select: u8,
    bank_registers: [u8; 8],
    irq_period: u8,
    irq_counter: u8,
    pub(crate) irq_enabled: bool,
    pub(crate) irq_pending: bool,
}

impl Mmc3 {
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let chr_is_ram = rom.header.chr_rom_banks == 0;
        let chr = if chr_is_ram {
            vec![0u8; 8192]
        } else {
            rom.chr_rom.clone()
        };

        let mut pgr_map = [0usize; 4];
        let last_8k = (rom.prg_rom.len() / 0x2000).saturating_sub(1) as u8;
        set_pgr_map(&mut pgr_map, rom.prg_rom.len(), 0x2000, 3, last_8k);

        let mut mapper = Self {
            prg_rom: rom.prg_rom.clone(),
            chr,
            prg_ram: vec![0u8; rom.header.prg_ram_banks as usize * 0x2000],
            chr_is_ram,
            mirroring: rom.header.mirroring,
            has_battery: rom.header.has_battery,
            pgr_map,
            chr_map: [0usize; 8],
            bank_select: 0,
            bank_registers: [0; 8],
            irq_period: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_pending: false,
        };
        mapper.set_banks();
        mapper
    }

    fn set_banks(&mut self) {
        let chr_mode = (self.bank_select >> 7) & 0x01;
        let prg_mode = (self.bank_select >> 6) & 0x01;
        let chr_len = self.chr.len();
        let prg_len = self.prg_rom.len();

        if chr_mode == 0 {
            set_chr_map(&mut self.chr_map, chr_len, 0x800, 0, self.bank_registers[0] >> 1);
            set_chr_map(&mut self.chr_map, chr_len, 0x800, 1, self.bank_registers[1] >> 1);
            for i in 0..4 {
                set_chr_map(&mut self.chr_map, chr_len, 0x400, 4 + i, self.bank_registers[i as usize + 2]);
            }
        } else {
            for i in 0..4 {
                set_chr_map(&mut self.chr_map, chr_len, 0x400, i, self.bank_registers[i as usize + 2]);
            }
            set_chr_map(&mut self.chr_map, chr_len, 0x800, 2, self.bank_registers[0] >> 1);
            set_chr_map(&mut self.chr_map, chr_len, 0x800, 3, self.bank_registers[1] >> 1);
        }

        let last_8k = (prg_len / 0x2000).saturating_sub(1) as u8;
        let second_to_last_8k = (prg_len / 0x2000).saturating_sub(2) as u8;
        if prg_mode == 0 {
            set_pgr_map(&mut self.pgr_map, prg_len, 0x2000, 0, self.bank_registers[6] & 0x3F);
            set_pgr_map(&mut self.pgr_map, prg_len, 0x2000, 1, self.bank_registers[7] & 0x3F);
            set_pgr_map(&mut self.pgr_map, prg_len, 0x2000, 2, second_to_last_8k);
        } else {
            set_pgr_map(&mut self.pgr_map, prg_len, 0x2000, 0, second_to_last_8k);
            set_pgr_map(&mut self.pgr_map, prg_len, 0x2000, 1, self.bank_registers[7] & 0x3F);
            set_pgr_map(&mut self.pgr_map, prg_len, 0x2000, 2, self.bank_registers[6] & 0x3F);
        }
        let _ = last_8k; // slot 3 is fixed at construction time and never revisited here
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
            return;
        }
        if addr < 0x8000 {
            return;
        }
        match addr & 0xE001 {
            0x8000 => {
                self.bank_select = value;
                self.set_banks();
            }
            0x8001 => {
                self.bank_registers[(self.bank_select & 0x07) as usize] = value;
                self.set_banks();
            }
            0xA000 => {
                self.mirroring = if value & 0x01 != 0 {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            0xA001 => {
                // RAM write-protect, not modelled.
            }
            0xC000 => self.irq_period = value,
            0xC001 => self.irq_counter = 0,
            0xE000 => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            0xE001 => self.irq_enabled = true,
            _ => {}
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

    /// Clock the scanline IRQ counter. Called once per visible scanline.
    pub fn signal_scanline(&mut self) {
        if self.irq_counter == 0 {
            self.irq_counter = self.irq_period;
        } else {
            self.irq_counter -= 1;
            if self.irq_counter == 0 && self.irq_enabled {
                self.irq_pending = true;
            }
        }
    }
}
