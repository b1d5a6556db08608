//! Seam between the network subsystem and the hosting kernel.
//!
//! The driver needs a handful of primitives the kernel already owns: page
//! allocation for DMA-visible descriptor memory, interrupt vector hookup,
//! cooperative sleep and a timed busy-wait for the EEPROM bit-bang. They are
//! gathered in one trait so the driver can be exercised on a hosted target
//! with a mock implementation.

use core::ptr::NonNull;

/// Page size assumed for all descriptor allocations.
pub const PAGE_SIZE: usize = 4096;

/// Kernel primitives consumed by the driver.
///
/// Bus addresses are 32 bits wide because the 8255x is a 32-bit DMA device;
/// every pointer handed to the hardware goes through `virt_to_phys` first.
pub trait KernelServices: Sync {
    /// Allocate one zeroed page of physically contiguous memory.
    fn page_alloc(&self) -> Option<NonNull<u8>>;

    /// Return a page previously obtained from [`Self::page_alloc`].
    ///
    /// # Safety
    /// `page` must come from `page_alloc` on the same instance and must not
    /// be used afterwards.
    unsafe fn page_free(&self, page: NonNull<u8>);

    /// Bus address the device uses to reach `ptr`.
    fn virt_to_phys(&self, ptr: NonNull<u8>) -> u32;

    /// CPU pointer for a bus address previously produced by
    /// [`Self::virt_to_phys`] (or read back from a descriptor link).
    fn phys_to_virt(&self, phys: u32) -> NonNull<u8>;

    /// Hook `handler` to the given interrupt vector.
    fn register_irq_handler(&self, vector: u8, handler: fn());

    /// Cooperatively suspend the calling task for `ticks` timer ticks.
    fn sleep_ticks(&self, ticks: u64);

    /// Busy-wait approximately `usec` microseconds without yielding.
    fn udelay(&self, usec: u32);
}
