//! Receive Frame Area: the inbound descriptor list.
//!
//! A non-circular, singly linked chain of page-sized receive frame
//! descriptors. The RU walks it filling buffers; the drain pass removes
//! finished frames from the head and appends a fresh descriptor at the
//! tail, so the list never runs dry. Exactly one descriptor, the tail,
//! carries the end-of-list bit.

use core::ptr::NonNull;

use crate::services::KernelServices;
use crate::util::{KError, KResult};

/// Descriptors kept in flight.
pub const RFD_COUNT: usize = 1024;

/// Receive buffer size per descriptor (one maximum frame with slack).
pub const RFD_DATA_LEN: usize = 3096;

// Command word bits.
pub const RFD_EL: u16 = 0x8000;
pub const RFD_SF: u16 = 1 << 3; // simplified mode

// Count field bits: completion flags above a 14-bit byte count.
pub const RFD_EOF: u16 = 0x8000;
pub const RFD_F: u16 = 0x4000;
pub const RFD_COUNT_MASK: u16 = 0x3FFF;

/// Receive frame descriptor, hardware layout.
#[repr(C)]
pub struct Rfd {
    pub status: u16,
    pub command: u16,
    pub link: u32,
    pub reserved: u32,
    pub count: u16,
    pub size: u16,
    pub data: [u8; RFD_DATA_LEN],
}

fn alloc_rfd(svc: &dyn KernelServices, end_of_list: bool) -> KResult<NonNull<Rfd>> {
    debug_assert!(core::mem::size_of::<Rfd>() <= crate::services::PAGE_SIZE);
    let page = svc.page_alloc().ok_or(KError::NoMemory)?;
    let rfd = page.cast::<Rfd>();
    // The page arrives zeroed; only size and command need setting.
    unsafe {
        (*rfd.as_ptr()).size = RFD_DATA_LEN as u16;
        (*rfd.as_ptr()).command = if end_of_list { RFD_EL | RFD_SF } else { RFD_SF };
    }
    Ok(rfd)
}

/// Head/tail bookkeeping of the RFA. The interrupt-visible `next` cursor
/// lives outside, as an atomic owned by the device struct.
pub struct RfaState {
    head: NonNull<Rfd>,
    tail: NonNull<Rfd>,
    population: usize,
}

unsafe impl Send for RfaState {}

impl RfaState {
    /// Build the initial chain of `count` descriptors. Returns the state
    /// and the first descriptor (the initial `next` cursor for the RU).
    pub fn new(svc: &dyn KernelServices, count: usize) -> KResult<(Self, NonNull<Rfd>)> {
        debug_assert!(count >= 2);

        let head = alloc_rfd(svc, false)?;
        let mut tail = head;
        for _ in 1..count {
            let next = alloc_rfd(svc, false)?;
            unsafe {
                (*tail.as_ptr()).link = svc.virt_to_phys(next.cast());
            }
            tail = next;
        }
        unsafe {
            (*tail.as_ptr()).command |= RFD_EL;
        }

        Ok((Self { head, tail, population: count }, head))
    }

    pub fn head(&self) -> NonNull<Rfd> {
        self.head
    }

    pub fn tail(&self) -> NonNull<Rfd> {
        self.tail
    }

    pub fn population(&self) -> usize {
        self.population
    }

    /// Detach the head descriptor and advance to its link. The caller owns
    /// (and frees) the returned descriptor.
    pub fn advance_head(&mut self, svc: &dyn KernelServices) -> NonNull<Rfd> {
        let old = self.head;
        let link = unsafe { (*old.as_ptr()).link };
        self.head = svc.phys_to_virt(link).cast();
        self.population -= 1;
        old
    }

    /// Append one fresh descriptor at the tail: link it in, then clear the
    /// old tail's end-of-list bit so the device keeps walking.
    pub fn append_tail(&mut self, svc: &dyn KernelServices) -> KResult<()> {
        let new = alloc_rfd(svc, true)?;
        unsafe {
            (*self.tail.as_ptr()).link = svc.virt_to_phys(new.cast());
            (*self.tail.as_ptr()).command &= !RFD_EL;
        }
        self.tail = new;
        self.population += 1;
        Ok(())
    }
}
