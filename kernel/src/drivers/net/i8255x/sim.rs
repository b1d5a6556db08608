//! Emulated CSR block for driver tests.
//!
//! Implements just enough device behavior to exercise bring-up and the
//! send/receive paths on a hosted target: a Microwire EEPROM engine with
//! the dummy-zero address-width handshake, SCB command capture, and
//! settable CU/RU/stat-ack state.

use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use super::regs::{
    Csr, EepromCtl, CSR_EEPROM_CTL, CUC_LOAD_CU_BASE, CUC_START, RUC_LOAD_RU_BASE, RUC_START,
    SCB_COMMAND, SCB_GEN_PTR, SCB_STATUS, SCB_STAT_ACK,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Header,
    Data,
}

struct EepromSim {
    words: Vec<u16>,
    addr_bits: u8,
    phase: Phase,
    shift: u32,
    header_bits: u8,
    addr: usize,
    out_pos: u8,
    do_bit: bool,
    last_ctl: u8,
}

impl EepromSim {
    fn new(words: Vec<u16>, addr_bits: u8) -> Self {
        Self {
            words,
            addr_bits,
            phase: Phase::Idle,
            shift: 0,
            header_bits: 0,
            addr: 0,
            out_pos: 0,
            do_bit: true,
            last_ctl: 0,
        }
    }

    fn write_ctl(&mut self, value: u8) {
        let cs = value & EepromCtl::CS.bits() != 0;
        let rising =
            value & EepromCtl::SK.bits() != 0 && self.last_ctl & EepromCtl::SK.bits() == 0;

        if !cs {
            self.phase = Phase::Idle;
            self.shift = 0;
            self.header_bits = 0;
            self.out_pos = 0;
            self.do_bit = true;
            self.last_ctl = value;
            return;
        }

        if rising {
            let di = value & EepromCtl::DI.bits() != 0;
            match self.phase {
                Phase::Idle => {
                    // A one on DI is the start bit; leading zeros idle.
                    if di {
                        self.phase = Phase::Header;
                        self.shift = 0;
                        self.header_bits = 0;
                    }
                    self.do_bit = true;
                }
                Phase::Header => {
                    self.shift = (self.shift << 1) | u32::from(di);
                    self.header_bits += 1;
                    if self.header_bits == 2 + self.addr_bits {
                        // Full opcode + address received: answer with the
                        // dummy zero, then stream the word MSB first.
                        self.addr = (self.shift & ((1u32 << self.addr_bits) - 1)) as usize;
                        self.phase = Phase::Data;
                        self.out_pos = 0;
                        self.do_bit = false;
                    } else {
                        self.do_bit = true;
                    }
                }
                Phase::Data => {
                    let word = self.words.get(self.addr).copied().unwrap_or(0);
                    if self.out_pos < 16 {
                        self.do_bit = (word >> (15 - self.out_pos)) & 1 != 0;
                        self.out_pos += 1;
                    } else {
                        self.do_bit = true;
                    }
                }
            }
        }

        self.last_ctl = value;
    }

    fn read_ctl(&self) -> u8 {
        let lines = self.last_ctl
            & (EepromCtl::CS.bits() | EepromCtl::SK.bits() | EepromCtl::DI.bits());
        if self.do_bit {
            lines | EepromCtl::DO.bits()
        } else {
            lines
        }
    }
}

struct SimState {
    status: u8,
    stat_ack: u8,
    gen_ptr: u32,
    cu_starts: Vec<u32>,
    ru_starts: Vec<u32>,
    cu_base_loads: Vec<u32>,
    ru_base_loads: Vec<u32>,
    acks: Vec<u8>,
    eeprom: EepromSim,
}

/// Emulated CSR block.
pub struct SimCsr {
    state: RefCell<SimState>,
}

impl SimCsr {
    pub fn new(eeprom_words: Vec<u16>, addr_bits: u8) -> Self {
        Self {
            state: RefCell::new(SimState {
                status: 0,
                stat_ack: 0,
                gen_ptr: 0,
                cu_starts: Vec::new(),
                ru_starts: Vec::new(),
                cu_base_loads: Vec::new(),
                ru_base_loads: Vec::new(),
                acks: Vec::new(),
                eeprom: EepromSim::new(eeprom_words, addr_bits),
            }),
        }
    }

    /// EEPROM image with the given leading words and a valid checksum in
    /// the last word (all words sum to 0xBABA).
    pub fn eeprom_image(leading: &[u16], len: usize) -> Vec<u16> {
        let mut words = vec![0u16; len];
        words[..leading.len()].copy_from_slice(leading);
        let mut sum = 0u16;
        for word in &words[..len - 1] {
            sum = sum.wrapping_add(*word);
        }
        words[len - 1] = 0xBABAu16.wrapping_sub(sum);
        words
    }

    /// CSR with a valid 64-word EEPROM carrying the given MAC address.
    pub fn with_mac(mac: [u8; 6]) -> Self {
        let leading = [
            u16::from(mac[0]) | u16::from(mac[1]) << 8,
            u16::from(mac[2]) | u16::from(mac[3]) << 8,
            u16::from(mac[4]) | u16::from(mac[5]) << 8,
        ];
        Self::new(Self::eeprom_image(&leading, 64), 6)
    }

    pub fn set_status(&self, status: u8) {
        self.state.borrow_mut().status = status;
    }

    pub fn set_stat_ack(&self, value: u8) {
        self.state.borrow_mut().stat_ack = value;
    }

    pub fn cu_starts(&self) -> Vec<u32> {
        self.state.borrow().cu_starts.clone()
    }

    pub fn ru_starts(&self) -> Vec<u32> {
        self.state.borrow().ru_starts.clone()
    }

    pub fn cu_base_loads(&self) -> Vec<u32> {
        self.state.borrow().cu_base_loads.clone()
    }

    pub fn ru_base_loads(&self) -> Vec<u32> {
        self.state.borrow().ru_base_loads.clone()
    }

    pub fn acks(&self) -> Vec<u8> {
        self.state.borrow().acks.clone()
    }
}

impl Csr for SimCsr {
    fn read8(&self, offset: usize) -> u8 {
        let state = self.state.borrow();
        match offset {
            SCB_STATUS => state.status,
            SCB_STAT_ACK => state.stat_ack,
            CSR_EEPROM_CTL => state.eeprom.read_ctl(),
            _ => 0,
        }
    }

    fn write8(&self, offset: usize, value: u8) {
        let mut state = self.state.borrow_mut();
        match offset {
            SCB_COMMAND => {
                let gen_ptr = state.gen_ptr;
                match value {
                    CUC_START => state.cu_starts.push(gen_ptr),
                    RUC_START => state.ru_starts.push(gen_ptr),
                    CUC_LOAD_CU_BASE => state.cu_base_loads.push(gen_ptr),
                    RUC_LOAD_RU_BASE => state.ru_base_loads.push(gen_ptr),
                    _ => {}
                }
            }
            SCB_STAT_ACK => {
                state.acks.push(value);
                state.stat_ack = 0;
            }
            CSR_EEPROM_CTL => state.eeprom.write_ctl(value),
            _ => {}
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        if offset == SCB_GEN_PTR {
            self.state.borrow_mut().gen_ptr = value;
        }
    }
}
