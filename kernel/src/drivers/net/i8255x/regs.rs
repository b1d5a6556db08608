//! Intel 8255x register definitions.
//!
//! Offsets and bits follow the 8255x family developer manual; the CSR block
//! starts with the System Control Block (SCB) and is followed by the PORT,
//! EEPROM and MDI registers.

#![allow(dead_code)]

use core::ptr::NonNull;

use bitflags::bitflags;

pub const INTEL_VENDOR_ID: u16 = 0x8086;
pub const I8255X_DEVICE_ID: u16 = 0x1229;

/// Interrupt vector the adapter is wired to.
pub const INT_VECTOR: u8 = 0x2B;

// SCB register offsets within the CSR block.
pub const SCB_STATUS: usize = 0x00;
pub const SCB_STAT_ACK: usize = 0x01;
pub const SCB_COMMAND: usize = 0x02;
pub const SCB_INT_MASK: usize = 0x03;
pub const SCB_GEN_PTR: usize = 0x04;
pub const CSR_PORT: usize = 0x08;
pub const CSR_EEPROM_CTL: usize = 0x0E;
pub const CSR_MDI: usize = 0x10;

// CU/RU state fields in the SCB status byte.
pub const CU_MASK: u8 = 0xC0;
pub const CU_IDLE: u8 = 0x00;
pub const CU_SUSPENDED: u8 = 0x40;
pub const RU_MASK: u8 = 0x3C;
pub const RU_IDLE: u8 = 0x00;
pub const RU_READY: u8 = 0x10;

// SCB command opcodes.
pub const CUC_START: u8 = 0x10;
pub const CUC_RESUME: u8 = 0x20;
pub const CUC_LOAD_CU_BASE: u8 = 0x60;
pub const RUC_START: u8 = 0x01;
pub const RUC_RESUME: u8 = 0x02;
pub const RUC_LOAD_RU_BASE: u8 = 0x06;

bitflags! {
    /// Interrupt status/acknowledge bits (SCB byte 1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatAck: u8 {
        const SWI    = 0x04;
        const MDI    = 0x08;
        const RNR    = 0x10;
        const CNA    = 0x20;
        const FR     = 0x40;
        const CX_TNO = 0x80;
    }
}

bitflags! {
    /// EEPROM control lines (Microwire bit-bang).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EepromCtl: u8 {
        const SK = 0x01; // serial clock
        const CS = 0x02; // chip select
        const DI = 0x04; // data to the EEPROM
        const DO = 0x08; // data from the EEPROM
    }
}

bitflags! {
    /// Command block command word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CbCommand: u16 {
        const IA        = 0x0001; // individual address setup
        const CONFIGURE = 0x0002;
        const TRANSMIT  = 0x0004;
        const SF        = 0x0008; // simplified mode
        const INTERRUPT = 0x2000;
        const SUSPEND   = 0x4000;
        const EL        = 0x8000; // end of list
    }
}

bitflags! {
    /// Command block status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CbStatus: u16 {
        const UNDERRUN = 0x1000;
        const OK       = 0x2000;
        const COMPLETE = 0x8000;
    }
}

/// EOF flag in the TCB byte-count field (inline data ends the frame).
pub const TCB_EOF: u16 = 0x8000;

/// Raw access to the memory-mapped CSR block.
///
/// Abstracted so the driver logic can run against an emulated device; the
/// real implementation is a thin volatile wrapper over the BAR mapping.
pub trait Csr {
    fn read8(&self, offset: usize) -> u8;
    fn write8(&self, offset: usize, value: u8);
    fn write32(&self, offset: usize, value: u32);

    /// Flush posted writes by reading the SCB status byte.
    fn flush(&self) {
        let _ = self.read8(SCB_STATUS);
    }
}

/// Memory-mapped CSR block of a real adapter.
pub struct MmioCsr {
    base: NonNull<u8>,
}

impl MmioCsr {
    /// # Safety is carried by the caller of `bring_up`: `base` must map the
    /// device's CSR BAR for the lifetime of the driver.
    pub fn new(base: NonNull<u8>) -> Self {
        Self { base }
    }
}

unsafe impl Send for MmioCsr {}
unsafe impl Sync for MmioCsr {}

impl Csr for MmioCsr {
    fn read8(&self, offset: usize) -> u8 {
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(offset)) }
    }

    fn write8(&self, offset: usize, value: u8) {
        unsafe { core::ptr::write_volatile(self.base.as_ptr().add(offset), value) }
    }

    fn write32(&self, offset: usize, value: u32) {
        unsafe { core::ptr::write_volatile(self.base.as_ptr().add(offset).cast::<u32>(), value) }
    }
}
