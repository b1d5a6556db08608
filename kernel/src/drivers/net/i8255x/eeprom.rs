//! Serial EEPROM access.
//!
//! The configuration EEPROM hangs off four bit-banged Microwire lines in
//! the CSR block. A read shifts out a 3-bit opcode plus the word address
//! and shifts 16 data bits back in. The device answers the last address bit
//! with a dummy zero on DO, which is also how the true address width is
//! discovered: start assuming 8 address bits and shorten when the dummy
//! zero shows up early.

use super::regs::{Csr, EepromCtl, CSR_EEPROM_CTL};
use crate::services::KernelServices;
use crate::util::kprintln;

pub const EEPROM_MAX_WORDS: usize = 256;

/// All words must sum to this value, checksum word included.
const EEPROM_SUM: u16 = 0xBABA;

const OP_READ: u32 = 0x06;

/// Inter-bit settle time.
const BIT_DELAY_US: u32 = 10;

/// In-memory copy of the configuration EEPROM.
pub struct Eeprom {
    words: [u16; EEPROM_MAX_WORDS],
    count: usize,
    checksum_ok: bool,
}

impl Eeprom {
    pub fn word(&self, index: usize) -> u16 {
        self.words[index]
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn checksum_ok(&self) -> bool {
        self.checksum_ok
    }
}

/// Read one 16-bit word, adjusting `addr_len` if the device reports a
/// shorter address width than assumed.
fn read_word<C: Csr>(csr: &C, svc: &dyn KernelServices, addr_len: &mut u16, addr: u16) -> u16 {
    let cmd_addr_data: u32 = ((OP_READ << *addr_len) | addr as u32) << 16;

    // Chip select.
    csr.write8(CSR_EEPROM_CTL, (EepromCtl::CS | EepromCtl::SK).bits());
    csr.flush();
    svc.udelay(BIT_DELAY_US);

    let mut data: u16 = 0;
    let mut i: i32 = 31;
    while i >= 0 {
        let ctl = if cmd_addr_data & (1 << i) != 0 {
            EepromCtl::CS | EepromCtl::DI
        } else {
            EepromCtl::CS
        };
        csr.write8(CSR_EEPROM_CTL, ctl.bits());
        csr.flush();
        svc.udelay(BIT_DELAY_US);

        csr.write8(CSR_EEPROM_CTL, (ctl | EepromCtl::SK).bits());
        csr.flush();
        svc.udelay(BIT_DELAY_US);

        // The EEPROM drives a dummy zero on DO after it has the complete
        // address; seeing it before bit 16 means the address is shorter
        // than assumed.
        let ctl_in = csr.read8(CSR_EEPROM_CTL);
        if ctl_in & EepromCtl::DO.bits() == 0 && i > 16 {
            *addr_len = addr_len.saturating_sub((i - 16) as u16);
            i = 17;
        }

        data = (data << 1) | u16::from(ctl_in & EepromCtl::DO.bits() != 0);
        i -= 1;
    }

    // Chip deselect.
    csr.write8(CSR_EEPROM_CTL, 0);
    csr.flush();
    svc.udelay(BIT_DELAY_US);

    data
}

/// Load the entire EEPROM into memory and validate its checksum.
///
/// The checksum, stored in the last word, is chosen so that all words sum
/// to `0xBABA`. A mismatch is logged but not fatal: the adapter may still
/// be usable.
pub fn load<C: Csr>(csr: &C, svc: &dyn KernelServices) -> Eeprom {
    let mut addr_len: u16 = 8;

    // Throwaway read to discover the real address width.
    read_word(csr, svc, &mut addr_len, 0);

    let count = (1usize << addr_len).min(EEPROM_MAX_WORDS);
    let mut words = [0u16; EEPROM_MAX_WORDS];
    let mut sum: u16 = 0;
    for addr in 0..count {
        words[addr] = read_word(csr, svc, &mut addr_len, addr as u16);
        if addr < count - 1 {
            sum = sum.wrapping_add(words[addr]);
        }
    }

    let checksum_ok = EEPROM_SUM.wrapping_sub(sum) == words[count - 1];
    if !checksum_ok {
        kprintln!("i8255x: EEPROM corrupted");
    }

    Eeprom { words, count, checksum_ok }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::i8255x::sim::SimCsr;
    use crate::testutil::TestServices;

    #[test]
    fn test_discovers_address_width_and_reads_words() {
        let words = SimCsr::eeprom_image(&[0x1122, 0x3344, 0x5566], 64);
        let csr = SimCsr::new(words.clone(), 6);
        let svc = TestServices::new();

        let eeprom = load(&csr, svc);
        assert_eq!(eeprom.count(), 64);
        for (i, word) in words.iter().enumerate() {
            assert_eq!(eeprom.word(i), *word, "word {}", i);
        }
        assert!(eeprom.checksum_ok());
    }

    #[test]
    fn test_checksum_mismatch_is_reported() {
        let mut words = SimCsr::eeprom_image(&[0x1122, 0x3344, 0x5566], 64);
        let last = words.len() - 1;
        words[last] = words[last].wrapping_add(1);
        let csr = SimCsr::new(words, 6);
        let svc = TestServices::new();

        let eeprom = load(&csr, svc);
        assert_eq!(eeprom.count(), 64);
        assert!(!eeprom.checksum_ok());
        // The cached words themselves are still read correctly.
        assert_eq!(eeprom.word(0), 0x1122);
    }

    #[test]
    fn test_eight_bit_address_width_needs_no_adjustment() {
        let words = SimCsr::eeprom_image(&[0xAA55, 0x0102, 0x0304], 256);
        let csr = SimCsr::new(words, 8);
        let svc = TestServices::new();

        let eeprom = load(&csr, svc);
        assert_eq!(eeprom.count(), 256);
        assert_eq!(eeprom.word(0), 0xAA55);
        assert!(eeprom.checksum_ok());
    }
}
