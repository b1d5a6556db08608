//! Network drivers.
//!
//! One adapter is supported: the Intel 8255x that QEMU's `i82557b` model
//! and older lab machines expose. The kernel-facing functions below wrap
//! the driver singleton; everything stateful lives in [`i8255x::Nic`].

pub mod i8255x;

use spin::Once;

use self::i8255x::regs::{MmioCsr, I8255X_DEVICE_ID, INTEL_VENDOR_ID, INT_VECTOR};
use self::i8255x::Nic;

use crate::drivers::pci;
use crate::net::{ipv4, Ipv4Addr, MacAddr};
use crate::services::KernelServices;
use crate::util::{kprintln, KError, KResult};

/// Static IPv4 address assigned at bring-up (no DHCP).
const STATIC_IP: Ipv4Addr = Ipv4Addr::new(110, 110, 50, 90);

static NIC: Once<Nic<MmioCsr>> = Once::new();

fn nic_interrupt() {
    if let Some(nic) = NIC.get() {
        nic.handle_interrupt();
    }
}

/// The active adapter, if bring-up succeeded.
pub fn nic() -> Option<&'static Nic<MmioCsr>> {
    NIC.get()
}

/// Locate and initialize the adapter. Intended to run once at boot; if the
/// device is missing the driver stays uninitialized and every send fails
/// with `NotSupported`.
#[cfg(target_arch = "x86_64")]
pub fn init(svc: &'static dyn KernelServices) {
    let access = pci::PortConfig;
    let Some(addr) = pci::find_device(&access, INTEL_VENDOR_ID, I8255X_DEVICE_ID) else {
        kprintln!("i8255x: adapter not found");
        return;
    };
    kprintln!("i8255x: adapter found - bus: {}, slot: {}", addr.bus, addr.device);

    let bar = pci::read_bar0(&access, addr);
    kprintln!("i8255x: CSR MMIO base addr: {:#010x}", bar);
    let csr = MmioCsr::new(svc.phys_to_virt(bar));

    match Nic::bring_up(csr, svc) {
        Ok(nic) => {
            let nic = NIC.call_once(|| nic);
            svc.register_irq_handler(INT_VECTOR, nic_interrupt);
            if nic.configure().is_err() {
                kprintln!("i8255x: initial configuration failed");
                return;
            }
            nic.set_ip(STATIC_IP);
        }
        Err(err) => {
            kprintln!("i8255x: bring-up failed: {:?}", err);
        }
    }
}

/// Send a raw Ethernet frame.
pub fn send_frame(dst: MacAddr, ethertype: u16, data: &[u8]) -> KResult<()> {
    nic().ok_or(KError::NotSupported)?.send_frame(dst, ethertype, data)
}

/// Send an IPv4 datagram (resolves the destination via ARP first).
pub fn send_ipv4(dst: Ipv4Addr, protocol: u8, data: &[u8]) -> KResult<()> {
    ipv4::send(nic().ok_or(KError::NotSupported)?, dst, protocol, data)
}

/// Reassign the adapter's IPv4 address.
pub fn set_ip(ip: Ipv4Addr) {
    if let Some(nic) = nic() {
        nic.set_ip(ip);
    }
}

/// Arm the receive unit at the current descriptor.
pub fn rx_enable() {
    if let Some(nic) = nic() {
        nic.rx_enable();
    }
}

/// Transmit monitor entry point for the scheduler; never returns while the
/// adapter exists.
pub fn tx_monitor() {
    if let Some(nic) = nic() {
        nic.tx_monitor();
    }
}

/// Receive monitor entry point for the scheduler; never returns while the
/// adapter exists.
pub fn rx_monitor() {
    if let Some(nic) = nic() {
        nic.rx_monitor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_fails_cleanly_without_adapter() {
        // The singleton is never initialized in tests.
        assert!(nic().is_none());
        assert_eq!(
            send_frame(MacAddr::BROADCAST, 0x0800, &[1, 2, 3]),
            Err(KError::NotSupported)
        );
        assert_eq!(
            send_ipv4(Ipv4Addr::new(10, 0, 0, 1), 17, &[1, 2, 3]),
            Err(KError::NotSupported)
        );
        set_ip(Ipv4Addr::new(10, 0, 0, 1));
        rx_enable();
        tx_monitor();
        rx_monitor();
    }
}
