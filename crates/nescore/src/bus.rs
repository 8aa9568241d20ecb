//! System bus: the address decode table the CPU talks to.
//!
//! Owns RAM, the PPU, the APU, the cartridge mapper and both joypads, and
//! implements [`nescore_cpu::Bus`] over them. PPU pattern-table access goes
//! through closures built at the call site (the PPU no longer takes a
//! trait object); the PPU owns its own nametable RAM and mirroring mode
//! directly, so there is no separate CIRAM buffer here.

use nescore_apu::Apu;
use nescore_cpu::Bus;
use nescore_mappers::Mapper;
use nescore_ppu::Ppu;

use crate::input::Controller;

/// Maps a cartridge mirroring mode onto the PPU crate's own copy of the
/// enum. The two crates each define it because the PPU owns nametable
/// storage directly instead of querying the mapper on every access.
fn ppu_mirroring(mirroring: nescore_mappers::Mirroring) -> nescore_ppu::Mirroring {
    match mirroring {
        nescore_mappers::Mirroring::Horizontal => nescore_ppu::Mirroring::Horizontal,
        nescore_mappers::Mirroring::Vertical => nescore_ppu::Mirroring::Vertical,
        nescore_mappers::Mirroring::SingleScreenLower => nescore_ppu::Mirroring::SingleScreenLower,
        nescore_mappers::Mirroring::SingleScreenUpper => nescore_ppu::Mirroring::SingleScreenUpper,
        nescore_mappers::Mirroring::FourScreen => nescore_ppu::Mirroring::FourScreen,
    }
}

/// The NES system bus: internal RAM, PPU, APU, cartridge mapper and
/// joypads, addressed the way the 6502 sees them.
pub struct SystemBus {
    /// Internal RAM (2KB, mirrored four times up to $1FFF).
    ram: [u8; 2048],
    /// Picture Processing Unit.
    pub ppu: Ppu,
    /// Audio Processing Unit.
    pub apu: Apu,
    /// Cartridge mapper.
    pub mapper: Mapper,
    /// Port 1 joypad.
    joypad1: Controller,
    /// Port 2 joypad.
    joypad2: Controller,
    /// Last byte driven onto the bus (open-bus approximation for unmapped
    /// or write-only register reads).
    last_bus_value: u8,
    /// OAM DMA source page latched by a $4014 write, taken (and cleared)
    /// by the System once per CPU cycle.
    pending_oam_dma: Option<u8>,
}

impl SystemBus {
    pub(crate) fn new(mapper: Mapper) -> Self {
        let mirroring = ppu_mirroring(mapper.mirroring());
        Self {
            ram: [0; 2048],
            ppu: Ppu::new(mirroring),
            apu: Apu::new(),
            mapper,
            joypad1: Controller::new(),
            joypad2: Controller::new(),
            last_bus_value: 0,
            pending_oam_dma: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.ram.fill(0);
        self.ppu.reset();
        self.apu.reset();
        self.mapper.irq_acknowledge();
        self.joypad1.reset();
        self.joypad2.reset();
        self.last_bus_value = 0;
        self.pending_oam_dma = None;
        self.sync_mirroring();
    }

    /// Sets the PPU's mirroring mode from whatever the mapper currently
    /// reports. Called after every cartridge-space write, since MMC1's
    /// control register and MMC3's $A000 can change mirroring at runtime
    /// and the PPU (unlike the old bus-level CIRAM adapter) no longer
    /// re-derives it on every single access.
    fn sync_mirroring(&mut self) {
        self.ppu.set_mirroring(ppu_mirroring(self.mapper.mirroring()));
    }

    /// Steps the PPU by one dot, wiring CHR access and MMC3's scanline IRQ
    /// hook to the mapper.
    ///
    /// `read_chr` must be a `Fn`, so it cannot also signal the scanline
    /// counter (that needs `&mut Mapper`). The signal is instead latched
    /// into a local flag by a capture-free closure and applied to the
    /// mapper after the PPU call returns, once the shared borrow used for
    /// CHR reads has ended.
    pub(crate) fn step_ppu_dot(&mut self) -> (bool, bool) {
        let mapper = &self.mapper;
        let mut scanline_signalled = false;
        let result = self.ppu.step_with_chr(
            |addr| mapper.chr_mem_read(addr),
            || scanline_signalled = true,
        );
        if scanline_signalled {
            self.mapper.signal_scanline();
        }
        result
    }

    /// Takes the pending OAM DMA source page, if a $4014 write latched
    /// one since the last call.
    pub(crate) fn take_oam_dma(&mut self) -> Option<u8> {
        self.pending_oam_dma.take()
    }

    /// Reads a byte the way OAM/DMC DMA see memory: no register side
    /// effects, RAM and cartridge space only (the two ranges DMA sources
    /// from on real hardware).
    pub(crate) fn dma_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x4020..=0xFFFF => self.mapper.mem_read(addr),
            _ => self.last_bus_value,
        }
    }

    pub(crate) fn set_button(&mut self, port: u8, button: crate::input::Button, pressed: bool) {
        match port {
            0 => self.joypad1.set_button(button, pressed),
            _ => self.joypad2.set_button(button, pressed),
        }
    }

    /// Reads without side effects, for debug surfaces.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.last_bus_value,
            0x4015 => self.apu.peek_status(),
            0x4000..=0x401F => self.last_bus_value,
            0x4020..=0xFFFF => self.mapper.mem_read(addr),
        }
    }
}

impl Bus for SystemBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            // Internal RAM, mirrored every 2KB up to $1FFF.
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            // PPU registers, mirrored every 8 bytes.
            0x2000..=0x3FFF => {
                let mapper = &mut self.mapper;
                self.ppu.read_register(addr, |a| mapper.chr_mem_read(a))
            }

            // APU and I/O registers.
            0x4015 => self.apu.read_status(),
            0x4016 => self.joypad1.read(),
            0x4017 => self.joypad2.read(),
            0x4000..=0x4013 | 0x4018..=0x401F => self.last_bus_value,

            // Cartridge space.
            0x4020..=0xFFFF => self.mapper.mem_read(addr),
        };

        self.last_bus_value = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.last_bus_value = value;

        match addr {
            0x0000..=0x1FFF => {
                self.ram[(addr & 0x07FF) as usize] = value;
            }

            0x2000..=0x3FFF => {
                let mapper = &mut self.mapper;
                self.ppu
                    .write_register(addr, value, |a, v| mapper.chr_mem_write(a, v));
            }

            // $4017 is shared: frame-counter mode on write, controller 2
            // serial data on read (handled separately below).
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, value),

            0x4014 => {
                self.pending_oam_dma = Some(value);
            }

            0x4016 => {
                // $4016 writes strobe both controllers simultaneously.
                self.joypad1.write_strobe(value);
                self.joypad2.write_strobe(value);
            }

            0x4018..=0x401F => {}

            0x4020..=0xFFFF => {
                self.mapper.mem_write(addr, value);
                self.sync_mirroring();
            }
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        SystemBus::peek(self, addr)
    }
}
