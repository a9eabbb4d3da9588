//! # Common Entry Flag View
//!
//! All four paging structures share one 64-bit layout for their control
//! bits; only the interpretation of bits 7 and 12 shifts between leaf and
//! non-leaf forms. [`EntryFlags`] is the superset view used to surface a
//! mapping's attributes without caring which structure produced them.

use bitfield_struct::bitfield;
use pagewalk_addresses::PhysicalAddress;

/// Flag bits common to PML4Es, PDPTEs, PDEs and PTEs.
///
/// | Bit(s) | Name | Meaning |
/// |--------|------|---------|
/// | 0 | P | Present. |
/// | 1 | R/W | Writes allowed. |
/// | 2 | U/S | User-mode access allowed. |
/// | 3 | PWT | Page-level write-through. |
/// | 4 | PCD | Page-level cache disable. |
/// | 5 | A | Accessed; set by hardware on use. |
/// | 6 | D | Dirty; set by hardware on write (leaf entries). |
/// | 7 | PS | Page size in PDPTEs/PDEs; PAT in PTEs; ignored in PML4Es. |
/// | 8 | G | Global translation (leaf entries). |
/// | 9‒11 | AVL | Available to software; bit 11 doubles as HLAT restart. |
/// | 12‒51 | ADDR | Physical base (bits 12 and up are PAT/reserved in large leaves). |
/// | 52‒58 | AVL | Available to software. |
/// | 59‒62 | PK | Protection key (leaf entries, with `CR4.PKE`). |
/// | 63 | XD | Execution disabled (with `EFER.NXE`). |
#[bitfield(u64)]
pub struct EntryFlags {
    /// Present.
    pub present: bool,

    /// Writes allowed to the region controlled by this entry.
    pub writable: bool,

    /// User-mode access allowed to the region controlled by this entry.
    pub user: bool,

    /// Page-level write-through.
    pub write_through: bool,

    /// Page-level cache disable.
    pub cache_disable: bool,

    /// Set by hardware when the entry has been used for translation.
    pub accessed: bool,

    /// Set by hardware on a write through a leaf entry.
    pub dirty: bool,

    /// `PS` in PDPTEs and PDEs. A PTE reads its `PAT` bit here, and a
    /// PML4E ignores the position entirely.
    pub large_page: bool,

    /// Translation survives a CR3 switch (leaf entries).
    pub global: bool,

    /// Bits 9‒11, available to software (bit 11 is HLAT restart).
    #[bits(3)]
    pub os_available_low: u8,

    /// Bits 51:12 of the physical base address.
    #[bits(40)]
    phys_addr_51_12: u64,

    /// Bits 52‒58, available to software.
    #[bits(7)]
    pub os_available_high: u8,

    /// Protection key of a leaf entry.
    #[bits(4)]
    pub protection_key: u8,

    /// Execution disabled.
    pub no_execute: bool,
}

impl EntryFlags {
    /// Physical base address stored in bits 51:12.
    ///
    /// For table references and 4 KiB leaves this is the full base; large
    /// leaves keep their low base bits elsewhere, so prefer the typed
    /// entry views in [`crate::page_table`] for those.
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_51_12() << 12)
    }

    /// Replace the physical base address (must be 4 KiB aligned).
    #[must_use]
    pub fn with_physical_address(self, addr: PhysicalAddress) -> Self {
        debug_assert_eq!(addr.as_u64() & 0xFFF, 0, "base must be 4K aligned");
        self.with_phys_addr_51_12(addr.as_u64() >> 12)
    }

    /// Replace the physical base address (must be 4 KiB aligned).
    pub fn set_physical_address(&mut self, addr: PhysicalAddress) {
        *self = self.with_physical_address(addr);
    }
}
