//! 6502 CPU core implementation.
//!
//! This module contains the main CPU structure with all registers, the
//! per-instruction execution loop, interrupt handling, and stack operations.
//! Addressing is resolved once per instruction by [`Cpu::fetch_operand`];
//! the instruction body in [`crate::instructions`] then performs the final
//! data access, which is how the real hardware's cycle count naturally falls
//! out of the two pieces combined.

use crate::addressing::{AddrMode, ADDR_MODE_TABLE};
use crate::instructions::OPCODE_TABLE;
use crate::status::Status;
use crate::vectors;
use crate::Bus;

/// Number of independent level-sensitive IRQ sources the CPU tracks.
const IRQ_SOURCE_COUNT: usize = 3;

/// Identifies a source of a level-sensitive IRQ line.
///
/// The CPU only sees one aggregated IRQ line (the OR of every source), but
/// each source must be able to raise and lower its own level independently
/// without clobbering the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqSource {
    /// APU frame counter IRQ.
    ApuFrame,
    /// APU DMC sample-ended IRQ.
    Dmc,
    /// Mapper-generated IRQ (e.g. MMC3 scanline counter).
    Mapper,
}

/// Cycle-accurate 6502 CPU.
#[derive(Debug, Clone)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    pc: u16,
    sp: u8,
    status: Status,

    /// Total elapsed CPU cycles since power-on.
    cycles: u64,

    /// Cycles remaining before the CPU resumes instruction execution
    /// (DMA stalls: OAM DMA, DMC sample fetch).
    stall: u32,

    /// Per-source level state for the maskable IRQ line.
    irq_lines: [bool; IRQ_SOURCE_COUNT],

    /// Edge-triggered NMI latch, set by [`Cpu::request_nmi`].
    nmi_pending: bool,

    /// Effective address resolved for the instruction currently executing.
    operand_addr: u16,

    /// For addressing modes that don't target memory (Imm, Rel, Acc), the
    /// operand value fetched during addressing.
    operand_value: u8,

    /// Opcode byte currently being executed. Kept around for tracing and for
    /// [`crate::instructions::undefined`]'s diagnostic message.
    current_opcode: u8,

    /// Set when an unimplemented opcode is encountered. The host observes
    /// this instead of the CPU panicking.
    done: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Creates a CPU with raw, pre-reset silicon state. Call
    /// [`Cpu::power_on`] or [`Cpu::reset`] to bring it to the state real
    /// hardware is in once the reset sequence completes (SP = 0xFD, PC
    /// loaded from the reset vector).
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0x00,
            status: Status::new(),
            cycles: 0,
            stall: 0,
            irq_lines: [false; IRQ_SOURCE_COUNT],
            nmi_pending: false,
            operand_addr: 0,
            operand_value: 0,
            current_opcode: 0,
            done: false,
        }
    }

    /// Accumulator.
    #[must_use]
    pub fn a(&self) -> u8 {
        self.a
    }

    /// X index register.
    #[must_use]
    pub fn x(&self) -> u8 {
        self.x
    }

    /// Y index register.
    #[must_use]
    pub fn y(&self) -> u8 {
        self.y
    }

    /// Program counter.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Stack pointer.
    #[must_use]
    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Processor status flags.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Total elapsed CPU cycles since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles remaining before the CPU resumes fetch/execute (DMA stall).
    #[must_use]
    pub fn stall_cycles(&self) -> u32 {
        self.stall
    }

    /// `true` once an unimplemented opcode has been encountered.
    #[must_use]
    pub fn done(&self) -> bool {
        self.done
    }

    /// Effective address resolved by the current instruction's addressing
    /// mode.
    #[must_use]
    pub fn operand_addr(&self) -> u16 {
        self.operand_addr
    }

    /// Operand value fetched directly during addressing (Immediate and
    /// Relative modes).
    #[must_use]
    pub fn operand_value(&self) -> u8 {
        self.operand_value
    }

    /// Opcode byte currently executing.
    #[must_use]
    pub fn current_opcode(&self) -> u8 {
        self.current_opcode
    }

    pub(crate) fn set_a(&mut self, value: u8) {
        self.a = value;
        self.set_zn(value);
    }

    pub(crate) fn set_x(&mut self, value: u8) {
        self.x = value;
        self.set_zn(value);
    }

    pub(crate) fn set_y(&mut self, value: u8) {
        self.y = value;
        self.set_zn(value);
    }

    pub(crate) fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub(crate) fn advance_pc(&mut self, amount: u16) {
        self.pc = self.pc.wrapping_add(amount);
    }

    pub(crate) fn set_sp(&mut self, value: u8) {
        self.sp = value;
    }

    pub(crate) fn set_status(&mut self, value: Status) {
        self.status = value;
    }

    pub(crate) fn set_status_flag(&mut self, flag: Status, value: bool) {
        self.status.set_flag(flag, value);
    }

    pub(crate) fn set_zn(&mut self, value: u8) {
        self.status.set_zn(value);
    }

    pub(crate) fn mark_done(&mut self) {
        self.done = true;
    }

    /// Consumes the NMI-pending latch, returning whether it was set. Used by
    /// BRK to detect an NMI hijacking the vector fetch.
    pub(crate) fn take_nmi_pending(&mut self) -> bool {
        let pending = self.nmi_pending;
        self.nmi_pending = false;
        pending
    }

    /// Raises or lowers one source's level on the shared maskable IRQ line.
    pub fn set_irq(&mut self, source: IrqSource, level: bool) {
        self.irq_lines[source as usize] = level;
    }

    /// Aggregated maskable IRQ line: asserted while any source holds it high.
    fn irq_line(&self) -> bool {
        self.irq_lines.iter().any(|&level| level)
    }

    /// Latches a non-maskable interrupt request. Edge-triggered: calling
    /// this multiple times before it's serviced has no additional effect.
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Stalls the CPU for the given number of cycles (OAM DMA, DMC DMA).
    pub fn stall(&mut self, cycles: u32) {
        self.stall += cycles;
    }

    /// Advances internal bus timing by one cycle with no data transfer.
    pub(crate) fn tick(&mut self, _bus: &mut dyn Bus) {
        self.cycles += 1;
    }

    /// Reads a byte from the bus, consuming one cycle.
    pub(crate) fn read_byte(&mut self, bus: &mut dyn Bus, addr: u16) -> u8 {
        self.cycles += 1;
        bus.read(addr)
    }

    /// Writes a byte to the bus, consuming one cycle.
    pub(crate) fn write_byte(&mut self, bus: &mut dyn Bus, addr: u16, value: u8) {
        self.cycles += 1;
        bus.write(addr, value);
    }

    fn push_byte(&mut self, bus: &mut dyn Bus, value: u8) {
        let addr = 0x0100 | u16::from(self.sp);
        self.write_byte(bus, addr, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop_byte(&mut self, bus: &mut dyn Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = 0x0100 | u16::from(self.sp);
        self.read_byte(bus, addr)
    }

    pub(crate) fn push_word(&mut self, bus: &mut dyn Bus, value: u16) {
        self.push_byte(bus, (value >> 8) as u8);
        self.push_byte(bus, value as u8);
    }

    pub(crate) fn pop_word(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.pop_byte(bus);
        let hi = self.pop_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Brings the CPU straight to the settled post-reset state (SP = 0xFD,
    /// PC loaded from the reset vector) without modeling the 7-cycle reset
    /// sequence's internal bus traffic. Useful for tests and fast boot; for
    /// cycle-accurate startup use [`Cpu::reset`].
    pub fn power_on(&mut self, bus: &mut dyn Bus) {
        *self = Self::new();
        self.sp = 0xFD;
        let lo = self.read_byte(bus, vectors::RESET);
        let hi = self.read_byte(bus, vectors::RESET.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// Runs the 7-cycle reset sequence: two idle cycles, three decrementing
    /// stack "pushes" that don't actually write, then the reset vector
    /// fetch. Registers other than SP, PC, and the I flag are left
    /// untouched, matching real hardware.
    pub fn reset(&mut self, bus: &mut dyn Bus) {
        self.tick(bus);
        self.tick(bus);
        self.sp = self.sp.wrapping_sub(3);
        self.tick(bus);
        self.tick(bus);
        self.tick(bus);

        self.status.set_flag(Status::I, true);
        let lo = self.read_byte(bus, vectors::RESET);
        let hi = self.read_byte(bus, vectors::RESET.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);

        self.nmi_pending = false;
        self.irq_lines = [false; IRQ_SOURCE_COUNT];
        self.done = false;
        self.stall = 0;
    }

    /// Services whichever interrupt is pending (or, absent one, fetches and
    /// dispatches one instruction).
    ///
    /// Per call: if a DMA stall is outstanding, it burns one cycle of it and
    /// returns. Otherwise, a pending NMI takes priority, then a pending IRQ
    /// provided the interrupt-disable flag is clear, then ordinary
    /// instruction dispatch.
    pub fn execute_one(&mut self, bus: &mut dyn Bus) {
        if self.stall > 0 {
            self.stall -= 1;
            self.cycles += 1;
            return;
        }

        if self.nmi_pending {
            self.nmi_pending = false;
            self.service_interrupt(bus, vectors::NMI);
            return;
        }

        if self.irq_line() && !self.status.contains(Status::I) {
            self.service_interrupt(bus, vectors::IRQ);
            return;
        }

        let opcode = self.read_byte(bus, self.pc);
        self.current_opcode = opcode;
        self.pc = self.pc.wrapping_add(1);

        self.fetch_operand(bus, ADDR_MODE_TABLE[opcode as usize]);
        OPCODE_TABLE[opcode as usize](self, bus);
    }

    /// Services an NMI or IRQ: two dummy reads of the instruction that would
    /// have been fetched, PC and status pushed to the stack (B clear), the
    /// interrupt-disable flag set, then the vector loaded. Seven cycles
    /// total.
    fn service_interrupt(&mut self, bus: &mut dyn Bus, vector: u16) {
        self.read_byte(bus, self.pc);
        self.read_byte(bus, self.pc);

        self.push_word(bus, self.pc);
        let status_byte = self.status.to_stack_byte(false);
        self.push_byte(bus, status_byte);
        self.status.set_flag(Status::I, true);

        let lo = self.read_byte(bus, vector);
        let hi = self.read_byte(bus, vector.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// Resolves the effective address (or immediate/relative operand value)
    /// for the given addressing mode, consuming exactly the cycles real
    /// hardware spends resolving it. The final data access (the actual
    /// read/write/RMW) is left to the instruction body.
    fn fetch_operand(&mut self, bus: &mut dyn Bus, mode: AddrMode) {
        match mode {
            AddrMode::Imp | AddrMode::Acc => {}

            AddrMode::Imm => {
                // The fetch and the instruction's use of the byte are the
                // same bus cycle on real hardware; leave the read to the
                // instruction body via `operand_addr`.
                self.operand_addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
            }

            AddrMode::Rel => {
                // Branch bodies never touch the bus for the offset, so the
                // read has to happen here.
                self.operand_value = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
            }

            AddrMode::Zp0 => {
                let addr = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.operand_addr = u16::from(addr);
            }

            AddrMode::Zpx => {
                let addr = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.tick(bus); // dummy read of base address before indexing
                self.operand_addr = u16::from(addr.wrapping_add(self.x));
            }

            AddrMode::Zpy => {
                let addr = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.tick(bus);
                self.operand_addr = u16::from(addr.wrapping_add(self.y));
            }

            AddrMode::Abs => {
                let lo = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let hi = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.operand_addr = u16::from_le_bytes([lo, hi]);
            }

            AddrMode::Abx | AddrMode::AbxW => {
                self.resolve_absolute_indexed(bus, self.x, mode == AddrMode::AbxW);
            }

            AddrMode::Aby | AddrMode::AbyW => {
                self.resolve_absolute_indexed(bus, self.y, mode == AddrMode::AbyW);
            }

            AddrMode::Ind => {
                let lo = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let hi = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let ptr = u16::from_le_bytes([lo, hi]);

                // JMP indirect hardware bug: the high byte wraps within the
                // same page instead of crossing into the next one.
                let hi_addr = if ptr & 0x00FF == 0x00FF {
                    ptr & 0xFF00
                } else {
                    ptr.wrapping_add(1)
                };
                let target_lo = self.read_byte(bus, ptr);
                let target_hi = self.read_byte(bus, hi_addr);
                self.operand_addr = u16::from_le_bytes([target_lo, target_hi]);
            }

            AddrMode::Idx => {
                let base = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.tick(bus); // dummy read of base pointer before indexing
                let ptr = base.wrapping_add(self.x);
                let lo = self.read_byte(bus, u16::from(ptr));
                let hi = self.read_byte(bus, u16::from(ptr.wrapping_add(1)));
                self.operand_addr = u16::from_le_bytes([lo, hi]);
            }

            AddrMode::Idy | AddrMode::IdyW => {
                let ptr = self.read_byte(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let lo = self.read_byte(bus, u16::from(ptr));
                let hi = self.read_byte(bus, u16::from(ptr.wrapping_add(1)));
                let base = u16::from_le_bytes([lo, hi]);
                let addr = base.wrapping_add(u16::from(self.y));
                let page_crossed = (base & 0xFF00) != (addr & 0xFF00);

                if mode == AddrMode::IdyW || page_crossed {
                    self.tick(bus); // dummy read at the non-carried address
                }

                self.operand_addr = addr;
            }
        }
    }

    /// Shared Abs,X / Abs,Y resolution. `forced` is true for the write/RMW
    /// variants, which always pay the dummy-read cycle; read variants only
    /// pay it when indexing actually crosses a page.
    fn resolve_absolute_indexed(&mut self, bus: &mut dyn Bus, index: u8, forced: bool) {
        let lo = self.read_byte(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        let hi = self.read_byte(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);

        let base = u16::from_le_bytes([lo, hi]);
        let addr = base.wrapping_add(u16::from(index));
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);

        if forced || page_crossed {
            self.tick(bus);
        }

        self.operand_addr = addr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        mem: [u8; 0x10000],
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
    }

    fn new_bus() -> TestBus {
        TestBus { mem: [0; 0x10000] }
    }

    #[test]
    fn reset_loads_vector_and_sets_i() {
        let mut bus = new_bus();
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);

        assert_eq!(cpu.pc(), 0x8000);
        assert_eq!(cpu.sp(), 0xFD);
        assert!(cpu.status().contains(Status::I));
    }

    #[test]
    fn lda_immediate_takes_two_cycles() {
        let mut bus = new_bus();
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;
        bus.mem[0x8000] = 0xA9;
        bus.mem[0x8001] = 0x42;

        let mut cpu = Cpu::new();
        cpu.power_on(&mut bus);
        let before = cpu.cycles();
        cpu.execute_one(&mut bus);

        assert_eq!(cpu.a(), 0x42);
        assert_eq!(cpu.cycles() - before, 2);
    }

    #[test]
    fn lda_abs_x_pays_oops_cycle_on_page_cross() {
        let mut bus = new_bus();
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;
        bus.mem[0x8000] = 0xBD; // LDA $10FF,X
        bus.mem[0x8001] = 0xFF;
        bus.mem[0x8002] = 0x10;
        bus.mem[0x1100] = 0x99;

        let mut cpu = Cpu::new();
        cpu.power_on(&mut bus);
        cpu.set_x(1);
        let before = cpu.cycles();
        cpu.execute_one(&mut bus);

        assert_eq!(cpu.a(), 0x99);
        assert_eq!(cpu.cycles() - before, 5);
    }

    #[test]
    fn irq_is_ignored_while_interrupt_disable_set() {
        let mut bus = new_bus();
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;
        bus.mem[0x8000] = 0xEA; // NOP

        let mut cpu = Cpu::new();
        cpu.power_on(&mut bus);
        cpu.set_irq(IrqSource::ApuFrame, true);
        cpu.execute_one(&mut bus);

        // I is set on power-on, so the NOP ran instead of servicing the IRQ.
        assert_eq!(cpu.pc(), 0x8001);
    }

    #[test]
    fn nmi_takes_priority_and_loads_nmi_vector() {
        let mut bus = new_bus();
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;
        bus.mem[0xFFFA] = 0x00;
        bus.mem[0xFFFB] = 0x90;

        let mut cpu = Cpu::new();
        cpu.power_on(&mut bus);
        cpu.request_nmi();
        cpu.execute_one(&mut bus);

        assert_eq!(cpu.pc(), 0x9000);
    }
}
