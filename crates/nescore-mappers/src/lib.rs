//! NES Cartridge Mapper Implementations.
//!
//! This crate provides mapper implementations for NES cartridge emulation.
//! Mappers handle memory banking for PRG-ROM, CHR-ROM/RAM, and provide
//! various hardware features like IRQ generation.
//!
//! # Supported Mappers
//!
//! | Mapper | Name | Description |
//! |--------|------|-------------|
//! | 0 | NROM | No banking, simplest mapper |
//! | 1 | MMC1 | Nintendo's first bank-switching mapper |
//! | 2 | UxROM | PRG-ROM banking only |
//! | 3 | CNROM | CHR-ROM banking only |
//! | 4 | MMC3 | Most popular, fine-grained banking + IRQ |
//!
//! # Example
//!
//! ```no_run
//! use nescore_mappers::{Mapper, Rom};
//!
//! let rom_data = std::fs::read("game.nes").expect("Failed to read ROM");
//! let rom = Rom::load(&rom_data).expect("Failed to parse ROM");
//! let mut mapper = Mapper::new(&rom).expect("Unsupported mapper");
//!
//! let opcode = mapper.mem_read(0x8000);
//! let tile = mapper.chr_mem_read(0x0000);
//! ```
//!
//! # no_std Support
//!
//! This crate supports `no_std` environments with the `alloc` feature.
//! Disable the default `std` feature for embedded use.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod bank;
mod cnrom;
mod mmc1;
mod mmc3;
mod nrom;
mod uxrom;

pub mod mapper;
pub mod rom;

pub use mapper::{Mapper, Mirroring};
pub use rom::{Rom, RomError, RomHeader};

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rom(mapper_number: u16) -> Rom {
        let prg_rom: Vec<u8> = (0..32768u32).map(|i| (i & 0xFF) as u8).collect();
        let chr_rom: Vec<u8> = (0..8192u32).map(|i| (i & 0xFF) as u8).collect();

        Rom {
            header: RomHeader {
                prg_rom_banks: 2,
                chr_rom_banks: 1,
                mapper_number,
                mirroring: Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
                prg_ram_banks: 1,
            },
            prg_rom,
            chr_rom,
        }
    }

    #[test]
    fn test_new_mapper_nrom() {
        let rom = test_rom(0);
        let mapper = Mapper::new(&rom).unwrap();
        assert_eq!(mapper.mapper_number(), 0);
        assert_eq!(mapper.mapper_name(), "NROM");
    }

    #[test]
    fn test_new_mapper_mmc1() {
        let rom = test_rom(1);
        let mapper = Mapper::new(&rom).unwrap();
        assert_eq!(mapper.mapper_number(), 1);
        assert_eq!(mapper.mapper_name(), "MMC1");
    }

    #[test]
    fn test_new_mapper_uxrom() {
        let rom = test_rom(2);
        let mapper = Mapper::new(&rom).unwrap();
        assert_eq!(mapper.mapper_number(), 2);
        assert_eq!(mapper.mapper_name(), "UxROM");
    }

    #[test]
    fn test_new_mapper_cnrom() {
        let rom = test_rom(3);
        let mapper = Mapper::new(&rom).unwrap();
        assert_eq!(mapper.mapper_number(), 3);
        assert_eq!(mapper.mapper_name(), "CNROM");
    }

    #[test]
    fn test_new_mapper_mmc3() {
        let rom = test_rom(4);
        let mapper = Mapper::new(&rom).unwrap();
        assert_eq!(mapper.mapper_number(), 4);
        assert_eq!(mapper.mapper_name(), "MMC3");
    }

    #[test]
    fn test_new_mapper_unsupported() {
        let rom = test_rom(100);
        let result = Mapper::new(&rom);
        assert!(matches!(result, Err(RomError::UnsupportedMapper(100))));
    }

    #[test]
    fn test_nrom_read_write() {
        let rom = test_rom(0);
        let mut mapper = Mapper::new(&rom).unwrap();

        let val = mapper.mem_read(0x8000);
        assert_eq!(val, 0);

        mapper.mem_write(0x8000, 0xFF);
        assert_eq!(mapper.mem_read(0x8000), 0);
    }
}
