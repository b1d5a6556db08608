//! Command Block List: the transmit ring.
//!
//! A fixed pool of page-sized command blocks whose hardware link fields are
//! closed into a physical ring at init. The driver tracks free/in-use state
//! with index cursors; ownership of a block moves driver -> device when the
//! CU reaches it and back when the reclaim pass sees the complete bit.

use alloc::vec::Vec;
use core::ptr::NonNull;

use super::regs::CbStatus;
use crate::net::ethernet::ETH_MAX_DATA;
use crate::services::KernelServices;
use crate::util::{KError, KResult};

/// Ring size.
pub const CB_COUNT: usize = 128;

/// Inline payload capacity of one transmit command block.
pub const CB_MAX_DATA: usize = ETH_MAX_DATA;

/// Configure command payload length.
pub const CFG_LEN: usize = 22;

/// Transmit frame as laid out inside a TCB: the hardware inserts the
/// source address, so only destination and ethertype precede the data.
#[repr(C)]
pub struct TxFrame {
    pub dst: [u8; 6],
    pub ethertype: [u8; 2],
    pub data: [u8; CB_MAX_DATA],
}

/// Transmit command block body (simplified mode, data inline).
#[repr(C)]
pub struct Tcb {
    pub tbd_array: u32,
    pub byte_count: u16,
    pub threshold: u8,
    pub tbd_count: u8,
    pub frame: TxFrame,
}

const CB_PAYLOAD: usize = core::mem::size_of::<Tcb>();

/// One command block. `payload` is viewed as a configure block, an
/// individual-address block or a TCB depending on `command`.
#[repr(C)]
pub struct CommandBlock {
    pub status: u16,
    pub command: u16,
    pub link: u32,
    payload: [u8; CB_PAYLOAD],
}

impl CommandBlock {
    pub fn config_mut(&mut self) -> &mut [u8; CFG_LEN] {
        unsafe { &mut *self.payload.as_mut_ptr().cast::<[u8; CFG_LEN]>() }
    }

    pub fn ia_mut(&mut self) -> &mut [u8; 6] {
        unsafe { &mut *self.payload.as_mut_ptr().cast::<[u8; 6]>() }
    }

    pub fn tcb(&self) -> &Tcb {
        unsafe { &*self.payload.as_ptr().cast::<Tcb>() }
    }

    pub fn tcb_mut(&mut self) -> &mut Tcb {
        unsafe { &mut *self.payload.as_mut_ptr().cast::<Tcb>() }
    }
}

/// The transmit ring and its cursors.
///
/// `avail` plus the distance from `to_check` to `next_free` (in ring order)
/// always accounts for every slot.
pub struct CbRing {
    slots: Vec<NonNull<CommandBlock>>,
    next_free: usize,
    to_check: usize,
    avail: usize,
}

unsafe impl Send for CbRing {}

impl CbRing {
    /// Allocate `count` command blocks, one page each, and close their link
    /// fields into a physical ring.
    pub fn new(svc: &dyn KernelServices, count: usize) -> KResult<Self> {
        debug_assert!(count >= 2);
        debug_assert!(core::mem::size_of::<CommandBlock>() <= crate::services::PAGE_SIZE);

        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            let page = svc.page_alloc().ok_or(KError::NoMemory)?;
            slots.push(page.cast::<CommandBlock>());
        }
        for i in 0..count {
            let next_phys = svc.virt_to_phys(slots[(i + 1) % count].cast());
            unsafe {
                let cb = slots[i].as_ptr();
                (*cb).status = 0;
                (*cb).command = 0;
                (*cb).link = next_phys;
            }
        }

        Ok(Self { slots, next_free: 0, to_check: 0, avail: count })
    }

    /// Claim the next free command block, reclaiming completed ones first
    /// if the ring looks empty. Fails with no side effect when nothing can
    /// be recycled.
    pub fn claim(&mut self) -> Option<NonNull<CommandBlock>> {
        if self.avail == 0 {
            self.release();
            if self.avail == 0 {
                return None;
            }
        }
        let cb = self.slots[self.next_free];
        self.next_free = (self.next_free + 1) % self.slots.len();
        self.avail -= 1;
        Some(cb)
    }

    /// Reclaim pass: recycle blocks the device has marked complete, in ring
    /// order, stopping at the first one still owned by the device.
    pub fn release(&mut self) -> usize {
        let mut recycled = 0;
        while self.avail < self.slots.len() {
            let cb = self.slots[self.to_check].as_ptr();
            let status = unsafe { core::ptr::read_volatile(core::ptr::addr_of!((*cb).status)) };
            if status & CbStatus::COMPLETE.bits() == 0 {
                break;
            }
            unsafe {
                core::ptr::write_volatile(
                    core::ptr::addr_of_mut!((*cb).status),
                    status & !CbStatus::COMPLETE.bits(),
                );
                core::ptr::write_volatile(core::ptr::addr_of_mut!((*cb).command), 0);
            }
            self.avail += 1;
            recycled += 1;
            self.to_check = (self.to_check + 1) % self.slots.len();
        }
        recycled
    }

    pub fn available(&self) -> usize {
        self.avail
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn slot(&self, index: usize) -> NonNull<CommandBlock> {
        self.slots[index]
    }
}
