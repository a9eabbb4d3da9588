//! # Page Map Level 4 (L4)
//!
//! The root level of the hierarchy:
//!
//! - [`L4Index`]: index type for virtual-address bits `[47:39]`.
//! - [`Pml4Entry`]: a single PML4 entry referencing a PDPT.
//!
//! ## Semantics
//!
//! A PML4E never maps a page. Bit 7, which selects the large-page form in
//! the two levels below, is ignored here, so decoding only distinguishes
//! present from not-present.

use bitfield_struct::bitfield;
use pagewalk_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

use crate::layout;

/// L4 **PML4E** — reference to a **PDPT** (always non-leaf).
///
/// - The physical address (bits **51:12**) is a 4 KiB-aligned PDPT base.
/// - Leaf-only bits (`dirty`, `global`, protection key) are ignored here.
///
/// Reference: AMD APM / Intel SDM paging structures (x86-64).
#[doc(alias = "PML4E")]
#[bitfield(u64)]
pub struct Pml4Entry {
    /// **Present** (bit 0): the entry references a PDPT if set.
    ///
    /// When clear, the remaining bits carry no architectural meaning.
    pub present: bool,

    /// **Writable** (bit 1): write permission for the 512 GiB region.
    ///
    /// Intersects with the permissions of the lower levels.
    pub writable: bool,

    /// **User/Supervisor** (bit 2): allow user-mode access if set.
    pub user: bool,

    /// **Page Write-Through** (PWT, bit 3): caching policy for the PDPT
    /// access.
    pub write_through: bool,

    /// **Page Cache Disable** (PCD, bit 4): disable caching for the PDPT
    /// access.
    pub cache_disable: bool,

    /// **Accessed** (A, bit 5): set by the CPU on first use of this entry.
    pub accessed: bool,

    /// (bit 6): **ignored**; `dirty` only exists on leaf entries.
    #[bits(1)]
    __d_ignored: u8,

    /// (bit 7): **ignored** at L4; a PML4E can never map a page.
    #[bits(1)]
    __ps_ignored: u8,

    /// (bit 8): **ignored**; `global` only exists on leaf entries.
    #[bits(1)]
    __g_ignored: u8,

    /// **OS-available low** (bits 9..11): not interpreted by hardware.
    #[bits(3)]
    pub os_available_low: u8,

    /// **Next-level table physical address** (bits 12..51).
    ///
    /// Stores the PDPT base (4 KiB-aligned) with the low 12 bits omitted.
    #[bits(40)]
    phys_addr_51_12: u64,

    /// **OS-available high** (bits 52..58): not interpreted by hardware.
    #[bits(7)]
    pub os_available_high: u8,

    /// (bits 59..62): **ignored**; protection keys apply to leaves only.
    #[bits(4)]
    __pk_ignored: u8,

    /// **No-Execute** (NX, bit 63 / XD on Intel).
    pub no_execute: bool,
}

/// Index into the PML4 (derived from virtual-address bits `[47:39]`).
///
/// The newtype prevents mixing indices of different levels and keeps the
/// range `0..512` checked in debug builds.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L4Index(u16);

impl L4Index {
    /// Extract the index from a virtual address (bits `[47:39]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_va(va: VirtualAddress) -> Self {
        Self::new(layout::pml4e::index(va.as_u64()) as u16)
    }

    /// Construct an index from a raw `u16`.
    ///
    /// Debug builds assert `v < 512`.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < 512);
        Self(v)
    }

    /// Return the index as `u64`.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// Physical address of this entry within the PML4 at `table`.
    ///
    /// Entries are 8 bytes wide, so the index is scaled by 8.
    #[inline]
    #[must_use]
    pub const fn entry_address(self, table: PhysicalPage<Size4K>) -> PhysicalAddress {
        PhysicalAddress::new(layout::entry_address(table.base().as_u64(), self.as_u64()))
    }
}

impl Pml4Entry {
    /// If present, return the physical page of the referenced PDPT.
    ///
    /// Presence alone decides whether the walk can descend; bit 7 is not
    /// consulted at this level.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> Option<PhysicalPage<Size4K>> {
        if !self.present() {
            return None;
        }
        Some(self.table_base())
    }

    /// The referenced PDPT base (bits 51:12).
    #[inline]
    #[must_use]
    pub const fn table_base(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.phys_addr_51_12() << 12))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_entry_references_a_pdpt() {
        let e = Pml4Entry::from_bits(0x1234_5000 | layout::pml4e::PRESENT | layout::pml4e::RW);
        assert!(e.writable());
        assert_eq!(e.next_table().unwrap().base().as_u64(), 0x1234_5000);
    }

    #[test]
    fn not_present_yields_none() {
        let e = Pml4Entry::from_bits(0x1234_5000 | layout::pml4e::RW | layout::pml4e::XD);
        assert!(e.next_table().is_none());
    }

    #[test]
    fn bit_7_is_ignored_at_this_level() {
        let e = Pml4Entry::from_bits(0x1234_5000 | layout::pml4e::PRESENT | (1 << 7));
        assert_eq!(e.next_table().unwrap().base().as_u64(), 0x1234_5000);
    }

    #[test]
    fn index_scales_by_entry_size() {
        let table = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x10_1000));
        let at = L4Index::new(511).entry_address(table);
        assert_eq!(at.as_u64(), 0x10_1FF8);
    }
}
