//! Intel 8255x (i82557 "e100") Fast Ethernet driver.
//!
//! The controller executes commands from the Command Block List (transmit,
//! configure, address setup) and fills the Receive Frame Area on its own;
//! the driver's job is to keep both rings fed and drained. Simplified mode
//! is used throughout: frame data lives inline in the descriptors.

#![allow(dead_code)]

pub mod cb;
pub mod eeprom;
pub mod regs;
pub mod rfa;

#[cfg(test)]
pub(crate) mod sim;

use core::ptr::NonNull;
use core::sync::atomic::{fence, AtomicPtr, AtomicU32, Ordering};

use self::cb::{CbRing, CB_COUNT, CFG_LEN};
use self::eeprom::Eeprom;
use self::regs::{
    CbCommand, Csr, StatAck, CUC_LOAD_CU_BASE, CUC_START, CU_IDLE, CU_MASK, CU_SUSPENDED,
    RUC_LOAD_RU_BASE, RUC_START, SCB_COMMAND, SCB_GEN_PTR, SCB_STATUS, SCB_STAT_ACK, TCB_EOF,
};
use self::rfa::{Rfd, RfaState, RFD_COUNT, RFD_COUNT_MASK, RFD_DATA_LEN, RFD_EOF, RFD_F};

use crate::net::arp::ArpCache;
use crate::net::ethernet::{ETH_HEADER_LEN, ETH_MAX_DATA, ETH_MIN_DATA};
use crate::net::{self, Ipv4Addr, MacAddr, NetDevice};
use crate::services::KernelServices;
use crate::sync::IrqSafeMutex;
use crate::util::{hexdump, kprint, kprintln, KError, KResult};

/// Reclaim cadence of the transmit monitor.
pub const TX_MONITOR_TICKS: u64 = 500;

/// Drain cadence of the receive monitor.
pub const RX_MONITOR_TICKS: u64 = 10;

/// Byte-level configure payload: simplified receive mode, standard TCB/CB
/// layout, source address insertion, padding enabled.
const CONFIG_BLOCK: [u8; CFG_LEN] = [
    16,          // byte count of this block
    8,           // rx fifo limit
    0, 0, 0, 0,  // adaptive IFS / reserved
    0b1111_0110, // standard stat counters, late SCB, TNO interrupts
    0b0000_0010, // discard short frames
    0, 0,        // tx underrun retries / no flow control
    0b0010_0110, // source address insertion, NSAI, loopback off
    0,           // linear priority off
    0x60,        // interframe spacing
    0x00, 0xF2,  // reserved
    0b1100_1001, // promiscuous-adjacent rx, CRC stripped, broadcast ok
    0, 0, 0, 0, 0, 0,
];

/// Driver state for one adapter.
///
/// Ring and cache mutation happens in task context behind one mutex per
/// resource; the interrupt handler touches only `rfa_next`, the count field
/// of the finished descriptor, and the stat-ack register.
pub struct Nic<C: Csr> {
    csr: C,
    svc: &'static dyn KernelServices,
    mac: MacAddr,
    eeprom: Eeprom,
    ip: AtomicU32,
    tx: IrqSafeMutex<CbRing>,
    rfa: IrqSafeMutex<RfaState>,
    rfa_next: AtomicPtr<Rfd>,
    arp_cache: IrqSafeMutex<ArpCache>,
}

impl<C: Csr> Nic<C> {
    /// Bring the controller up to the point where commands can be issued:
    /// EEPROM cached and verified, MAC derived, CU/RU bases zeroed, both
    /// rings built, ARP cache empty.
    pub fn bring_up(csr: C, svc: &'static dyn KernelServices) -> KResult<Self> {
        kprintln!("i8255x: loading data from EEPROM...");
        let eeprom = eeprom::load(&csr, svc);

        let mut mac = [0u8; 6];
        for i in 0..3 {
            let word = eeprom.word(i);
            mac[i * 2] = word as u8;
            mac[i * 2 + 1] = (word >> 8) as u8;
        }
        let mac = MacAddr(mac);
        kprintln!("i8255x: hardware address: {}", mac);

        // Descriptor links are absolute bus addresses: load base 0 into
        // both units.
        csr.write32(SCB_GEN_PTR, 0);
        csr.write8(SCB_COMMAND, CUC_LOAD_CU_BASE);
        csr.flush();
        csr.write32(SCB_GEN_PTR, 0);
        csr.write8(SCB_COMMAND, RUC_LOAD_RU_BASE);
        csr.flush();

        kprintln!("i8255x: initializing CBL");
        let tx = CbRing::new(svc, CB_COUNT)?;
        kprintln!("i8255x: initializing RFA");
        let (rfa, next) = RfaState::new(svc, RFD_COUNT)?;
        kprintln!("i8255x: initializing ARP cache");
        let arp_cache = ArpCache::new();

        Ok(Self {
            csr,
            svc,
            mac,
            eeprom,
            ip: AtomicU32::new(0),
            tx: IrqSafeMutex::new(tx),
            rfa: IrqSafeMutex::new(rfa),
            rfa_next: AtomicPtr::new(next.as_ptr()),
            arp_cache: IrqSafeMutex::new(arp_cache),
        })
    }

    /// Issue the configure block chained to the individual-address block;
    /// the CU executes both and idles on the EL bit.
    pub fn configure(&self) -> KResult<()> {
        let mut tx = self.tx.lock();
        let cfg_cb = tx.claim().ok_or(KError::Busy)?;
        let ia_cb = tx.claim().ok_or(KError::Busy)?;

        unsafe {
            let cfg = &mut *cfg_cb.as_ptr();
            cfg.command = CbCommand::CONFIGURE.bits();
            *cfg.config_mut() = CONFIG_BLOCK;

            let ia = &mut *ia_cb.as_ptr();
            ia.command = (CbCommand::IA | CbCommand::EL).bits();
            ia.ia_mut().copy_from_slice(&self.mac.0);
        }
        kprintln!("i8255x: setting IA to {}", self.mac);

        fence(Ordering::SeqCst);
        self.csr.write32(SCB_GEN_PTR, self.svc.virt_to_phys(cfg_cb.cast()));
        self.csr.write8(SCB_COMMAND, CUC_START);
        self.csr.flush();
        Ok(())
    }

    /// Queue one Ethernet frame. Payloads above the maximum are rejected
    /// before any ring state is touched; short payloads are zero-padded to
    /// the minimum frame size. Never blocks: with no free command block
    /// (even after a reclaim attempt) the send fails and the caller may
    /// retry.
    pub fn send_frame(&self, dst: MacAddr, ethertype: u16, data: &[u8]) -> KResult<()> {
        if data.len() > ETH_MAX_DATA {
            return Err(KError::Invalid);
        }

        let mut tx = self.tx.lock();
        let Some(cb) = tx.claim() else {
            kprintln!("i8255x: no command blocks available");
            return Err(KError::Busy);
        };

        let tx_len = data.len().max(ETH_MIN_DATA);
        unsafe {
            let block = &mut *cb.as_ptr();
            block.command = (CbCommand::EL | CbCommand::SF | CbCommand::TRANSMIT).bits();
            let tcb = block.tcb_mut();
            tcb.tbd_array = 0xFFFF_FFFF; // simplified mode: data inline, no TBDs
            tcb.byte_count = (tx_len + ETH_HEADER_LEN) as u16 | TCB_EOF;
            tcb.threshold = 1;
            tcb.tbd_count = 0;
            tcb.frame.dst = dst.0;
            tcb.frame.ethertype = ethertype.to_be_bytes();
            if data.len() <= ETH_MIN_DATA {
                tcb.frame.data[data.len()..=ETH_MIN_DATA].fill(0);
            }
            tcb.frame.data[..data.len()].copy_from_slice(data);
        }
        fence(Ordering::SeqCst);

        // Kick the CU if it idled or suspended on a previous EL; otherwise
        // it reaches this block by ring traversal on its own.
        let cu_state = self.csr.read8(SCB_STATUS) & CU_MASK;
        if cu_state == CU_IDLE || cu_state == CU_SUSPENDED {
            self.csr.write32(SCB_GEN_PTR, self.svc.virt_to_phys(cb.cast()));
            self.csr.write8(SCB_COMMAND, CUC_START);
            self.csr.flush();
        }
        Ok(())
    }

    /// Interrupt handler body. Acknowledges controller status; on a
    /// finished-receive interrupt, clears the completion flags of the
    /// descriptor under the `next` cursor and advances the cursor along
    /// the descriptor's link. Draining is left to the receive monitor.
    pub fn handle_interrupt(&self) {
        let stat_ack = self.csr.read8(SCB_STAT_ACK);
        if stat_ack & StatAck::FR.bits() != 0 {
            let rfd = self.rfa_next.load(Ordering::Acquire);
            if !rfd.is_null() {
                unsafe {
                    let count_ptr = core::ptr::addr_of_mut!((*rfd).count);
                    let count = core::ptr::read_volatile(count_ptr);
                    core::ptr::write_volatile(count_ptr, count & !(RFD_EOF | RFD_F));
                    let link = core::ptr::read_volatile(core::ptr::addr_of!((*rfd).link));
                    self.rfa_next
                        .store(self.svc.phys_to_virt(link).cast::<Rfd>().as_ptr(), Ordering::Release);
                }
            }
        }

        self.csr.write8(SCB_STAT_ACK, 0xFF);
        self.csr.flush();
    }

    /// Arm the receive unit at the current `next` descriptor.
    pub fn rx_enable(&self) {
        let Some(next) = NonNull::new(self.rfa_next.load(Ordering::Acquire)) else {
            return;
        };
        self.csr.write32(SCB_GEN_PTR, self.svc.virt_to_phys(next.cast()));
        self.csr.write8(SCB_COMMAND, RUC_START);
    }

    /// Drain pass: hand every completed frame to the dispatch pipeline,
    /// replacing each consumed descriptor with a fresh one at the tail so
    /// the RFA population stays constant. Returns the number of frames
    /// processed.
    pub fn rx_drain(&self) -> usize {
        let mut drained = 0;
        loop {
            let mut rfa = self.rfa.lock();
            if rfa.head().as_ptr() == self.rfa_next.load(Ordering::Acquire) {
                break;
            }

            let head = rfa.head();
            let frame = unsafe {
                let count = core::ptr::read_volatile(core::ptr::addr_of!((*head.as_ptr()).count));
                let len = ((count & RFD_COUNT_MASK) as usize).min(RFD_DATA_LEN);
                core::slice::from_raw_parts((*head.as_ptr()).data.as_ptr(), len)
            };

            net::dispatch(self, frame);
            hexdump(frame, 16);

            let old = rfa.advance_head(self.svc);
            unsafe { self.svc.page_free(old.cast()) };
            if rfa.append_tail(self.svc).is_err() {
                kprintln!("i8255x: failed to replenish RFA");
            }
            drained += 1;
        }
        drained
    }

    /// Reclaim completed transmit command blocks.
    pub fn tx_reclaim(&self) -> usize {
        self.tx.lock().release()
    }

    /// Transmit monitor task: periodically recycle finished command blocks.
    pub fn tx_monitor(&self) -> ! {
        loop {
            self.tx_reclaim();
            self.svc.sleep_ticks(TX_MONITOR_TICKS);
        }
    }

    /// Receive monitor task: enable the RU once, then drain forever.
    pub fn rx_monitor(&self) -> ! {
        self.rx_enable();
        loop {
            self.rx_drain();
            self.svc.sleep_ticks(RX_MONITOR_TICKS);
        }
    }

    /// Assign the adapter's IPv4 address (static configuration).
    pub fn set_ip(&self, ip: Ipv4Addr) {
        self.ip.store(ip.to_u32(), Ordering::Relaxed);
    }

    pub fn eeprom(&self) -> &Eeprom {
        &self.eeprom
    }

    /// Log the cached EEPROM contents.
    pub fn eeprom_dump(&self) {
        for i in 0..self.eeprom.count() {
            if i % 6 == 0 {
                kprint!("\neep:");
            }
            kprint!(" [{}]=0x{:04x}", i, self.eeprom.word(i));
        }
        kprintln!();
    }

    #[cfg(test)]
    pub(crate) fn csr(&self) -> &C {
        &self.csr
    }

    #[cfg(test)]
    pub(crate) fn tx_ring(&self) -> &IrqSafeMutex<CbRing> {
        &self.tx
    }

    #[cfg(test)]
    pub(crate) fn rfa_state(&self) -> &IrqSafeMutex<RfaState> {
        &self.rfa
    }

    #[cfg(test)]
    pub(crate) fn rfa_next_ptr(&self) -> *mut Rfd {
        self.rfa_next.load(Ordering::Acquire)
    }
}

impl<C: Csr> NetDevice for Nic<C> {
    fn mac(&self) -> MacAddr {
        self.mac
    }

    fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from_u32(self.ip.load(Ordering::Relaxed))
    }

    fn send_frame(&self, dst: MacAddr, ethertype: u16, payload: &[u8]) -> KResult<()> {
        Nic::send_frame(self, dst, ethertype, payload)
    }

    fn arp_cache(&self) -> &IrqSafeMutex<ArpCache> {
        &self.arp_cache
    }

    fn services(&self) -> &'static dyn KernelServices {
        self.svc
    }
}
