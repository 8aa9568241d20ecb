//! CPU trace logging for nestest.log-compatible output.
//!
//! Produces per-instruction execution traces in the format used by
//! `nestest.log`, the de facto golden log for validating a 6502 core against
//! real hardware.

use crate::addressing::{AddrMode, ADDR_MODE_TABLE};
use crate::cpu::Cpu;
use crate::instructions::opcode_name;
use crate::Bus;
use std::fmt::Write;

/// A single instruction's state, captured before it executes.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    /// Program counter at the start of the instruction.
    pub pc: u16,
    /// Opcode byte.
    pub opcode: u8,
    /// Operand bytes (0-2 bytes, depending on addressing mode).
    pub operand_bytes: Vec<u8>,
    /// Disassembled instruction text.
    pub disassembly: String,
    /// Accumulator.
    pub a: u8,
    /// X register.
    pub x: u8,
    /// Y register.
    pub y: u8,
    /// Status register byte.
    pub p: u8,
    /// Stack pointer.
    pub sp: u8,
    /// Total elapsed CPU cycles.
    pub cycles: u64,
}

impl TraceEntry {
    /// Formats the entry as a single nestest.log-style line:
    /// `PC  BYTES   DISASM    A:XX X:XX Y:XX P:XX SP:XX CYC:n`
    #[must_use]
    pub fn format(&self) -> String {
        let mut bytes_str = String::new();
        write!(bytes_str, "{:02X}", self.opcode).unwrap();
        for byte in &self.operand_bytes {
            write!(bytes_str, " {byte:02X}").unwrap();
        }
        let bytes_field = format!("{bytes_str:<10}");
        let disasm_field = format!("{:<32}", self.disassembly);

        format!(
            "{:04X}  {}{}A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            self.pc, bytes_field, disasm_field, self.a, self.x, self.y, self.p, self.sp, self.cycles
        )
    }
}

/// Accumulates [`TraceEntry`] lines for later inspection or golden-log
/// comparison.
#[derive(Debug, Default)]
pub struct CpuTracer {
    entries: Vec<String>,
}

impl CpuTracer {
    /// Creates an empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the CPU's state immediately before it executes its next
    /// instruction. Must be called before [`Cpu::execute_one`], since the
    /// trace reflects the pre-execution state.
    pub fn trace(&mut self, cpu: &Cpu, bus: &mut dyn Bus) {
        let entry = Self::create_trace_entry(cpu, bus);
        self.entries.push(entry.format());
    }

    /// Returns every recorded line joined with newlines.
    #[must_use]
    pub fn get_log(&self) -> String {
        self.entries.join("\n")
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been traced yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn create_trace_entry(cpu: &Cpu, bus: &mut dyn Bus) -> TraceEntry {
        let pc = cpu.pc();
        let opcode = bus.peek(pc);
        let mode = ADDR_MODE_TABLE[opcode as usize];

        let operand_bytes: Vec<u8> = (1..=mode.operand_size())
            .map(|i| bus.peek(pc.wrapping_add(u16::from(i))))
            .collect();

        let disassembly = Self::disassemble(cpu, bus, pc, opcode, mode);

        TraceEntry {
            pc,
            opcode,
            operand_bytes,
            disassembly,
            a: cpu.a(),
            x: cpu.x(),
            y: cpu.y(),
            p: cpu.status().bits(),
            sp: cpu.sp(),
            cycles: cpu.cycles(),
        }
    }

    fn disassemble(cpu: &Cpu, bus: &mut dyn Bus, pc: u16, opcode: u8, mode: AddrMode) -> String {
        let mnemonic = opcode_name(opcode);

        match mode {
            AddrMode::Imp => mnemonic.to_string(),
            AddrMode::Acc => format!("{mnemonic} A"),

            AddrMode::Imm => {
                let value = bus.peek(pc.wrapping_add(1));
                format!("{mnemonic} #${value:02X}")
            }

            AddrMode::Zp0 => {
                let addr = bus.peek(pc.wrapping_add(1));
                let value = bus.peek(u16::from(addr));
                format!("{mnemonic} ${addr:02X} = {value:02X}")
            }

            AddrMode::Zpx => {
                let base = bus.peek(pc.wrapping_add(1));
                let addr = base.wrapping_add(cpu.x());
                let value = bus.peek(u16::from(addr));
                format!("{mnemonic} ${base:02X},X @ {addr:02X} = {value:02X}")
            }

            AddrMode::Zpy => {
                let base = bus.peek(pc.wrapping_add(1));
                let addr = base.wrapping_add(cpu.y());
                let value = bus.peek(u16::from(addr));
                format!("{mnemonic} ${base:02X},Y @ {addr:02X} = {value:02X}")
            }

            AddrMode::Abs => {
                let lo = bus.peek(pc.wrapping_add(1));
                let hi = bus.peek(pc.wrapping_add(2));
                let addr = u16::from_le_bytes([lo, hi]);

                if mnemonic == "JMP" || mnemonic == "JSR" {
                    format!("{mnemonic} ${addr:04X}")
                } else {
                    let value = bus.peek(addr);
                    format!("{mnemonic} ${addr:04X} = {value:02X}")
                }
            }

            AddrMode::Abx | AddrMode::AbxW => {
                let lo = bus.peek(pc.wrapping_add(1));
                let hi = bus.peek(pc.wrapping_add(2));
                let base = u16::from_le_bytes([lo, hi]);
                let addr = base.wrapping_add(u16::from(cpu.x()));
                let value = bus.peek(addr);
                format!("{mnemonic} ${base:04X},X @ {addr:04X} = {value:02X}")
            }

            AddrMode::Aby | AddrMode::AbyW => {
                let lo = bus.peek(pc.wrapping_add(1));
                let hi = bus.peek(pc.wrapping_add(2));
                let base = u16::from_le_bytes([lo, hi]);
                let addr = base.wrapping_add(u16::from(cpu.y()));
                let value = bus.peek(addr);
                format!("{mnemonic} ${base:04X},Y @ {addr:04X} = {value:02X}")
            }

            AddrMode::Ind => {
                let lo = bus.peek(pc.wrapping_add(1));
                let hi = bus.peek(pc.wrapping_add(2));
                let ptr = u16::from_le_bytes([lo, hi]);

                let target_lo = u16::from(bus.peek(ptr));
                let target_hi = if ptr & 0x00FF == 0x00FF {
                    u16::from(bus.peek(ptr & 0xFF00))
                } else {
                    u16::from(bus.peek(ptr.wrapping_add(1)))
                };
                let target = (target_hi << 8) | target_lo;

                format!("{mnemonic} (${ptr:04X}) = {target:04X}")
            }

            AddrMode::Idx => {
                let base = bus.peek(pc.wrapping_add(1));
                let ptr = base.wrapping_add(cpu.x());

                let lo = u16::from(bus.peek(u16::from(ptr)));
                let hi = u16::from(bus.peek(u16::from(ptr.wrapping_add(1))));
                let addr = (hi << 8) | lo;
                let value = bus.peek(addr);

                format!("{mnemonic} (${base:02X},X) @ {ptr:02X} = {addr:04X} = {value:02X}")
            }

            AddrMode::Idy | AddrMode::IdyW => {
                let ptr = bus.peek(pc.wrapping_add(1));

                let lo = u16::from(bus.peek(u16::from(ptr)));
                let hi = u16::from(bus.peek(u16::from(ptr.wrapping_add(1))));
                let base = (hi << 8) | lo;

                let addr = base.wrapping_add(u16::from(cpu.y()));
                let value = bus.peek(addr);

                format!("{mnemonic} (${ptr:02X}),Y = {base:04X} @ {addr:04X} = {value:02X}")
            }

            AddrMode::Rel => {
                let offset = bus.peek(pc.wrapping_add(1)) as i8;
                let target = pc.wrapping_add(2).wrapping_add(offset as u16);
                format!("{mnemonic} ${target:04X}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        memory: Vec<u8>,
    }

    impl TestBus {
        fn new() -> Self {
            Self {
                memory: vec![0; 0x10000],
            }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.memory[addr as usize]
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.memory[addr as usize] = value;
        }
        fn peek(&self, addr: u16) -> u8 {
            self.memory[addr as usize]
        }
    }

    #[test]
    fn trace_lda_immediate() {
        let mut bus = TestBus::new();
        bus.memory[0xFFFC] = 0x00;
        bus.memory[0xFFFD] = 0xC0;
        bus.memory[0xC000] = 0xA9;
        bus.memory[0xC001] = 0x42;

        let mut cpu = Cpu::new();
        cpu.power_on(&mut bus);

        let mut tracer = CpuTracer::new();
        tracer.trace(&cpu, &mut bus);
        let log = tracer.get_log();

        assert!(log.contains("C000"));
        assert!(log.contains("A9 42"));
        assert!(log.contains("LDA #$42"));
        assert!(log.contains(&format!("SP:{:02X}", cpu.sp())));
    }

    #[test]
    fn trace_jmp_absolute() {
        let mut bus = TestBus::new();
        bus.memory[0xFFFC] = 0x00;
        bus.memory[0xFFFD] = 0xC0;
        bus.memory[0xC000] = 0x4C;
        bus.memory[0xC001] = 0xF5;
        bus.memory[0xC002] = 0xC5;

        let mut cpu = Cpu::new();
        cpu.power_on(&mut bus);

        let mut tracer = CpuTracer::new();
        tracer.trace(&cpu, &mut bus);
        let log = tracer.get_log();

        assert!(log.contains("4C F5 C5"));
        assert!(log.contains("JMP $C5F5"));
    }
}
