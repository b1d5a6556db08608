//! Maritaca OS - network subsystem.
//!
//! Driver for the Intel 8255x (i82557 "e100") Ethernet controller plus the
//! minimal framing the kernel needs to talk to remote hosts by IP:
//!
//! - PCI bus scan and device bring-up (EEPROM, CSR programming)
//! - Command Block List (transmit ring) and Receive Frame Area
//! - ARP cache with blocking resolution
//! - Ethernet / ARP / IPv4 framing and inbound dispatch
//!
//! Everything the hosting kernel must provide (page allocation, interrupt
//! registration, cooperative sleep, address translation, diagnostics) comes
//! in through [`services::KernelServices`]; this crate never touches the
//! scheduler or the allocator directly.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod util;

pub mod drivers;
pub mod net;
pub mod services;
pub mod sync;

#[cfg(test)]
pub(crate) mod testutil;
