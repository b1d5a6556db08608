//! PCI (legacy config space via 0xCF8/0xCFC).
//!
//! Este módulo faz varredura do barramento PCI e leitura do config space.
//! É suficiente para localizar a NIC no QEMU e em máquinas reais antigas.

#![allow(dead_code)]

use crate::util::kprintln;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct PciId {
    pub vendor_id: u16,
    pub device_id: u16,
}

pub const PCI_VENDOR: u8 = 0x00;
pub const PCI_DEVICE: u8 = 0x02;
pub const PCI_BAR0: u8 = 0x10;

/// Bounded scan window: legacy bus segment only.
pub const MAX_BUS: u8 = 8;
pub const MAX_SLOT: u8 = 32;

/// Raw access to PCI configuration space.
///
/// One 32-bit read is the only primitive; word and byte reads are derived
/// from it by offset-within-word masking.
pub trait ConfigAccess {
    fn read32(&self, bus: u8, device: u8, function: u8, offset: u8) -> u32;
}

#[inline]
fn config_addr(bus: u8, device: u8, function: u8, offset: u8) -> u32 {
    let bus = bus as u32;
    let device = device as u32;
    let function = function as u32;
    let offset = (offset as u32) & 0xFC;
    (1u32 << 31) | (bus << 16) | (device << 11) | (function << 8) | offset
}

/// Port-backed configuration access (mechanism #1).
#[cfg(target_arch = "x86_64")]
pub struct PortConfig;

#[cfg(all(target_arch = "x86_64", not(test)))]
impl ConfigAccess for PortConfig {
    fn read32(&self, bus: u8, device: u8, function: u8, offset: u8) -> u32 {
        use x86_64::instructions::port::Port;

        const CONFIG_ADDRESS: u16 = 0xCF8;
        const CONFIG_DATA: u16 = 0xCFC;

        unsafe {
            let mut addr = Port::<u32>::new(CONFIG_ADDRESS);
            let mut data = Port::<u32>::new(CONFIG_DATA);
            addr.write(config_addr(bus, device, function, offset));
            data.read()
        }
    }
}

// `in`/`out` fault in ring 3; the hosted test build never probes real ports.
#[cfg(all(target_arch = "x86_64", test))]
impl ConfigAccess for PortConfig {
    fn read32(&self, _bus: u8, _device: u8, _function: u8, _offset: u8) -> u32 {
        0xFFFF_FFFF
    }
}

pub fn read_u32<A: ConfigAccess>(access: &A, bus: u8, device: u8, function: u8, offset: u8) -> u32 {
    access.read32(bus, device, function, offset & 0xFC)
}

pub fn read_u16<A: ConfigAccess>(access: &A, bus: u8, device: u8, function: u8, offset: u8) -> u16 {
    let value = read_u32(access, bus, device, function, offset);
    let shift = ((offset & 2) * 8) as u32;
    ((value >> shift) & 0xFFFF) as u16
}

pub fn read_u8<A: ConfigAccess>(access: &A, bus: u8, device: u8, function: u8, offset: u8) -> u8 {
    let value = read_u32(access, bus, device, function, offset);
    let shift = ((offset & 3) * 8) as u32;
    ((value >> shift) & 0xFF) as u8
}

/// Scan the bounded bus window for the first `vendor:device` match,
/// logging every slot that answers the vendor probe.
pub fn find_device<A: ConfigAccess>(access: &A, vendor: u16, device: u16) -> Option<PciAddress> {
    for bus in 0..MAX_BUS {
        for slot in 0..MAX_SLOT {
            let vendor_id = read_u16(access, bus, slot, 0, PCI_VENDOR);
            if vendor_id == 0xFFFF {
                continue;
            }
            let device_id = read_u16(access, bus, slot, 0, PCI_DEVICE);
            kprintln!("pci: {:02x}:{:02x} [{:04x}:{:04x}]", bus, slot, vendor_id, device_id);
            if vendor_id == vendor && device_id == device {
                return Some(PciAddress { bus, device: slot, function: 0 });
            }
        }
    }
    None
}

/// Diagnostic listing of every populated slot in the given window.
pub fn list_devices<A: ConfigAccess>(access: &A, max_bus: u8, max_slot: u8) {
    for bus in 0..max_bus {
        for slot in 0..max_slot {
            let vendor_id = read_u16(access, bus, slot, 0, PCI_VENDOR);
            if vendor_id == 0xFFFF {
                continue;
            }
            let device_id = read_u16(access, bus, slot, 0, PCI_DEVICE);
            kprintln!(
                "pci: bus {}, slot {}, vendor {:04x}, device {:04x}",
                bus,
                slot,
                vendor_id,
                device_id
            );
        }
    }
}

/// Memory BAR0 with the low type bits masked off.
pub fn read_bar0<A: ConfigAccess>(access: &A, addr: PciAddress) -> u32 {
    read_u32(access, addr.bus, addr.device, addr.function, PCI_BAR0) & 0xFFFF_FFF0
}
