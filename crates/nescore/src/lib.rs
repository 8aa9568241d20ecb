//! NES emulation core - integration layer.
//!
//! This crate provides the high-level NES emulation API, integrating the CPU,
//! PPU, APU, and mapper components into a complete console emulator.
//!
//! # Architecture
//!
//! The core crate connects all NES components through a central bus:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        System                               │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                     SystemBus                        │   │
//! │  │  ┌─────┐  ┌─────┐  ┌─────┐  ┌────────┐  ┌────────┐ │   │
//! │  │  │ RAM │  │ PPU │  │ APU │  │ Mapper │  │ Input  │ │   │
//! │  │  │ 2KB │  │     │  │     │  │        │  │        │ │   │
//! │  │  └─────┘  └─────┘  └─────┘  └────────┘  └────────┘ │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                          ▲                                  │
//! │                          │                                  │
//! │                     ┌────┴────┐                             │
//! │                     │   CPU   │                             │
//! │                     │  6502   │                             │
//! │                     └─────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use nescore::{System, input::Button};
//!
//! let rom_data = std::fs::read("game.nes").expect("failed to read ROM");
//! let mut system = System::new();
//! system.load(&rom_data).expect("failed to load ROM");
//!
//! loop {
//!     system.set_button(0, Button::A, true);
//!     system.set_button(0, Button::Start, true);
//!
//!     system.run_frame();
//!
//!     let _framebuffer = system.framebuffer(); // 256x240 RGB8
//!     let _audio = system.take_audio();        // PCM16 mono
//! #   break;
//! }
//! ```
//!
//! # Features
//!
//! - `std` (default): enable standard library support (`System::load_file`,
//!   `std::error::Error` impls).
//! - `serde`: enable serialization of mapper/APU state.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod bus;
pub mod input;
pub mod palette;
mod system;

pub use nescore_apu::Apu;
pub use nescore_cpu::Cpu;
pub use nescore_mappers::{Mapper, Mirroring, Rom, RomError, RomHeader};
pub use nescore_ppu::Ppu;
pub use system::{timing, LoadError, LoadErrorKind, System, SystemConfig};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// NES screen dimensions.
pub mod screen {
    /// Screen width in pixels.
    pub const WIDTH: u32 = 256;
    /// Screen height in pixels.
    pub const HEIGHT: u32 = 240;
    /// Total pixels per frame.
    pub const PIXELS: u32 = WIDTH * HEIGHT;
    /// Bytes per frame (RGB8).
    pub const FRAMEBUFFER_SIZE: usize = (PIXELS * 3) as usize;
}
