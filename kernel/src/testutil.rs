//! Shared test doubles: hosted `KernelServices` and a mock net device.

#![allow(dead_code)]

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Mutex;

use crate::net::arp::ArpCache;
use crate::net::{Ipv4Addr, MacAddr, NetDevice};
use crate::services::{KernelServices, PAGE_SIZE};
use crate::sync::IrqSafeMutex;
use crate::util::KResult;

struct PageRecord {
    virt: usize,
    phys: u32,
}

#[derive(Default)]
struct ServiceLog {
    pages: Vec<PageRecord>,
    freed: usize,
    sleeps: Vec<u64>,
    irqs: Vec<u8>,
}

/// Hosted implementation of the kernel seam.
///
/// Pages are real zeroed allocations; "bus addresses" are synthetic 32-bit
/// handles so descriptor links stay hardware-shaped on a 64-bit host.
/// Freed pages are only recorded, never returned to the allocator, so
/// stale-pointer bugs surface as assertion failures instead of UB.
pub struct TestServices {
    log: Mutex<ServiceLog>,
}

impl TestServices {
    pub fn new() -> &'static TestServices {
        Box::leak(Box::new(TestServices { log: Mutex::new(ServiceLog::default()) }))
    }

    pub fn sleeps(&self) -> Vec<u64> {
        self.log.lock().unwrap().sleeps.clone()
    }

    pub fn irqs(&self) -> Vec<u8> {
        self.log.lock().unwrap().irqs.clone()
    }

    /// Pages currently allocated and not freed.
    pub fn live_pages(&self) -> usize {
        let log = self.log.lock().unwrap();
        log.pages.len() - log.freed
    }
}

impl KernelServices for TestServices {
    fn page_alloc(&self) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(PAGE_SIZE, PAGE_SIZE).unwrap();
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr)?;
        let mut log = self.log.lock().unwrap();
        let phys = 0x0010_0000 + (log.pages.len() as u32) * PAGE_SIZE as u32;
        log.pages.push(PageRecord { virt: ptr.as_ptr() as usize, phys });
        Some(ptr)
    }

    unsafe fn page_free(&self, page: NonNull<u8>) {
        let mut log = self.log.lock().unwrap();
        let virt = page.as_ptr() as usize;
        assert!(
            log.pages.iter().any(|p| p.virt == virt),
            "page_free of pointer not from page_alloc"
        );
        log.freed += 1;
    }

    fn virt_to_phys(&self, ptr: NonNull<u8>) -> u32 {
        let virt = ptr.as_ptr() as usize;
        let log = self.log.lock().unwrap();
        log.pages
            .iter()
            .find(|p| p.virt == virt)
            .map(|p| p.phys)
            .expect("virt_to_phys of unknown page")
    }

    fn phys_to_virt(&self, phys: u32) -> NonNull<u8> {
        let log = self.log.lock().unwrap();
        let virt = log
            .pages
            .iter()
            .find(|p| p.phys == phys)
            .map(|p| p.virt)
            .expect("phys_to_virt of unknown bus address");
        NonNull::new(virt as *mut u8).unwrap()
    }

    fn register_irq_handler(&self, vector: u8, _handler: fn()) {
        self.log.lock().unwrap().irqs.push(vector);
    }

    fn sleep_ticks(&self, ticks: u64) {
        self.log.lock().unwrap().sleeps.push(ticks);
    }

    fn udelay(&self, _usec: u32) {}
}

/// Net device double for pure pipeline tests: records outbound frames.
pub struct MockDevice {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub cache: IrqSafeMutex<ArpCache>,
    pub svc: &'static TestServices,
    pub sent: Mutex<Vec<(MacAddr, u16, Vec<u8>)>>,
}

impl MockDevice {
    pub fn new(mac: MacAddr, ip: Ipv4Addr) -> Self {
        Self {
            mac,
            ip,
            cache: IrqSafeMutex::new(ArpCache::new()),
            svc: TestServices::new(),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl NetDevice for MockDevice {
    fn mac(&self) -> MacAddr {
        self.mac
    }

    fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    fn send_frame(&self, dst: MacAddr, ethertype: u16, payload: &[u8]) -> KResult<()> {
        self.sent.lock().unwrap().push((dst, ethertype, payload.to_vec()));
        Ok(())
    }

    fn arp_cache(&self) -> &IrqSafeMutex<ArpCache> {
        &self.cache
    }

    fn services(&self) -> &'static dyn KernelServices {
        self.svc
    }
}
