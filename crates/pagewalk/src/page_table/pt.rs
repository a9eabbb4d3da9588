//! # Page Table (PT / L1)
//!
//! The final paging level:
//!
//! - [`L1Index`]: index type for virtual-address bits `[20:12]`.
//! - [`PtEntry`]: a PTE mapping a single 4 KiB page.
//!
//! ## Semantics
//!
//! A PTE is always a leaf, so there is no dual-form union here. Bit 7,
//! which means "page size" one and two levels up, is the `PAT` selector
//! in this structure and must never be interpreted as `PS`.

use bitfield_struct::bitfield;
use pagewalk_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

use crate::entry_flags::EntryFlags;
use crate::layout;

/// L1 **PTE** — maps a single **4 KiB page** (always a leaf).
///
/// The physical base uses bits **51:12**; all leaf attribute bits
/// (`dirty`, `global`, protection key) are meaningful.
#[doc(alias = "PTE")]
#[bitfield(u64)]
pub struct PtEntry {
    /// **Present** (bit 0): the entry maps a 4 KiB page if set.
    pub present: bool,

    /// **Writable** (bit 1): write permission for the mapped page.
    pub writable: bool,

    /// **User/Supervisor** (bit 2): allow user-mode access if set.
    pub user: bool,

    /// **Page Write-Through** (PWT, bit 3): caching policy for the page.
    pub write_through: bool,

    /// **Page Cache Disable** (PCD, bit 4): disable caching for the page.
    pub cache_disable: bool,

    /// **Accessed** (A, bit 5): set by the CPU on first use of this entry.
    pub accessed: bool,

    /// **Dirty** (D, bit 6): set by the CPU on first write to the page.
    pub dirty: bool,

    /// **PAT** (bit 7). Not `PS`: a PTE cannot reference another table,
    /// so the bit keeps its memory-type meaning.
    pub pat: bool,

    /// **Global** (G, bit 8): the TLB entry survives a CR3 reload.
    pub global: bool,

    /// **OS-available low** (bits 9..11): not interpreted by hardware.
    #[bits(3)]
    pub os_available_low: u8,

    /// **4 KiB page physical address** (bits 12..51).
    ///
    /// Stores the page base (4 KiB-aligned) with the low 12 bits omitted.
    #[bits(40)]
    phys_addr_51_12: u64,

    /// **OS-available high** (bits 52..58): not interpreted by hardware.
    #[bits(7)]
    pub os_available_high: u8,

    /// **Protection Key** (bits 59..62): with `CR4.PKE`.
    #[bits(4)]
    pub protection_key: u8,

    /// **No-Execute** (NX, bit 63 / XD on Intel).
    pub no_execute: bool,
}

/// Index into the Page Table (derived from VA bits `[20:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L1Index(u16);

impl L1Index {
    /// Extract the index from a virtual address (bits `[20:12]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_va(va: VirtualAddress) -> Self {
        Self::new(layout::pte::index(va.as_u64()) as u16)
    }

    /// Construct from a raw `u16`.
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

    /// Physical address of this entry within the PT at `table`.
    #[inline]
    #[must_use]
    pub const fn entry_address(self, table: PhysicalPage<Size4K>) -> PhysicalAddress {
        PhysicalAddress::new(layout::entry_address(table.base().as_u64(), self.as_u64()))
    }
}

impl PtEntry {
    /// The mapped 4 KiB page base (bits 51:12).
    #[inline]
    #[must_use]
    pub const fn page_base(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.phys_addr_51_12() << 12))
    }

    /// If present, return the mapped page together with the entry's flags.
    ///
    /// Returns `None` if the entry is not present.
    #[inline]
    #[must_use]
    pub const fn page_4k(self) -> Option<(PhysicalPage<Size4K>, EntryFlags)> {
        if !self.present() {
            return None;
        }
        Some((self.page_base(), EntryFlags::from_bits(self.into_bits())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_pte_maps_a_page() {
        let e = PtEntry::from_bits(
            0x0000_0010_2000_0000
                | layout::pte::PRESENT
                | layout::pte::RW
                | layout::pte::DIRTY
                | layout::pte::GLOBAL,
        );
        let (page, flags) = e.page_4k().unwrap();
        assert_eq!(page.base().as_u64(), 0x0000_0010_2000_0000);
        assert!(flags.writable());
        assert!(flags.dirty());
        assert!(flags.global());
    }

    #[test]
    fn not_present_yields_none() {
        let e = PtEntry::from_bits(0x0000_0010_2000_0000 | layout::pte::RW);
        assert!(e.page_4k().is_none());
    }

    #[test]
    fn bit_7_is_pat_not_page_size() {
        let e = PtEntry::from_bits(0x5000 | layout::pte::PRESENT | layout::pte::PAT);
        assert!(e.pat());
        // Still a perfectly ordinary 4 KiB mapping.
        let (page, _) = e.page_4k().unwrap();
        assert_eq!(page.base().as_u64(), 0x5000);
    }
}
