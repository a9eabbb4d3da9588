//! # Page Directory (PD / L2)
//!
//! The second paging level:
//!
//! - [`L2Index`]: index type for virtual-address bits `[29:21]`.
//! - [`PdEntry`]: a PD entry that is either a reference to a PT (`PS=0`)
//!   or a 2 MiB leaf (`PS=1`).
//! - [`PdEntryKind`]: decoded view of a present entry.
//!
//! The dual-form mechanics match the PDPT level (see
//! [`pdpt`](super::pdpt)); only the field widths differ. A 2 MiB leaf
//! keeps its base in bits 51:21, with `PAT` at bit 12 and bits 20:13
//! reserved.

use bitfield_struct::bitfield;
use pagewalk_addresses::{PhysicalAddress, PhysicalPage, Size2M, Size4K, VirtualAddress};

use crate::layout;

/// **Borrowed view** into an L2 PDE, selected by the `PS` bit.
///
/// Returned by [`PdEntry::view`].
pub enum L2View {
    /// Non-leaf PDE view (`PS=0`).
    Entry(Pde),
    /// 2 MiB leaf PDE view (`PS=1`).
    Leaf2M(Pde2M),
}

/// **L2 PDE union** — overlays non-leaf [`Pde`] and leaf [`Pde2M`] on the
/// same 64-bit storage.
///
/// Prefer [`PdEntry::kind`] (or [`PdEntry::view`]) for typed access.
#[derive(Copy, Clone)]
#[repr(C)]
pub union PdEntry {
    /// Raw 64-bit storage of the entry.
    bits: u64,
    /// Non-leaf form: reference to a Page Table (`PS=0`).
    entry: Pde,
    /// Leaf form: 2 MiB mapping (`PS=1`).
    leaf_2m: Pde2M,
}

/// L2 **PDE** — reference to a **Page Table** (non-leaf; `PS=0`).
///
/// Bits 12..51 are entirely the PT base address; `PAT` only exists in the
/// leaf form.
#[bitfield(u64)]
pub struct Pde {
    /// **Present** (bit 0): the entry references a PT if set.
    pub present: bool,

    /// **Writable** (bit 1): write permission for the 2 MiB region.
    pub writable: bool,

    /// **User/Supervisor** (bit 2): allow user-mode access if set.
    pub user: bool,

    /// **Page Write-Through** (PWT, bit 3): caching policy for the PT
    /// access.
    pub write_through: bool,

    /// **Page Cache Disable** (PCD, bit 4): disable caching for the PT
    /// access.
    pub cache_disable: bool,

    /// **Accessed** (A, bit 5): set by the CPU on first use of this entry.
    pub accessed: bool,

    /// (bit 6): **ignored**; `dirty` only exists on leaf entries.
    #[bits(1)]
    __d_ignored: u8,

    /// **Page Size** (PS, bit 7): **must be 0** in this form.
    #[bits(1)]
    __ps_must_be_0: u8,

    /// (bit 8): **ignored**; `global` only exists on leaf entries.
    #[bits(1)]
    __g_ignored: u8,

    /// **OS-available low** (bits 9..11): not interpreted by hardware.
    #[bits(3)]
    pub os_available_low: u8,

    /// **Next-level table physical address** (bits 12..51).
    ///
    /// Stores the PT base (4 KiB-aligned) with the low 12 bits omitted.
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

impl Pde {
    /// The referenced Page Table base (bits 51:12).
    #[inline]
    #[must_use]
    pub const fn table_base(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.phys_addr_51_12() << 12))
    }
}

/// L2 **PDE (2 MiB leaf)** — maps a single 2 MiB page (`PS=1`).
///
/// - **PAT** lives at bit **12** in this form.
/// - The physical base uses bits **51:21**; bits 20:13 are reserved.
#[bitfield(u64)]
pub struct Pde2M {
    /// **Present** (bit 0): the entry maps a 2 MiB page if set.
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

    /// **Page Size** (PS, bit 7): **must be 1** for a 2 MiB leaf.
    #[bits(default = true)]
    pub page_size: bool,

    /// **Global** (G, bit 8): the TLB entry survives a CR3 reload.
    pub global: bool,

    /// **OS-available low** (bits 9..11): not interpreted by hardware.
    #[bits(3)]
    pub os_available_low: u8,

    /// **PAT** (bit 12): memory-type selector for 2 MiB mappings.
    pub pat_large: bool,

    /// **Reserved** (bits 13..20): must be 0.
    #[bits(8)]
    __res13_20: u8,

    /// **2 MiB page physical address** (bits 21..51).
    ///
    /// Stores the page base (2 MiB-aligned) with the low 21 bits omitted.
    #[bits(31)]
    phys_addr_51_21: u32,

    /// **OS-available high** (bits 52..58): not interpreted by hardware.
    #[bits(7)]
    pub os_available_high: u8,

    /// **Protection Key** (bits 59..62): with `CR4.PKE`.
    #[bits(4)]
    pub protection_key: u8,

    /// **No-Execute** (NX, bit 63 / XD on Intel).
    pub no_execute: bool,
}

impl Pde2M {
    /// The mapped 2 MiB page base (bits 51:21).
    #[inline]
    #[must_use]
    pub const fn page_base(self) -> PhysicalPage<Size2M> {
        PhysicalPage::from_addr(PhysicalAddress::new((self.phys_addr_51_21() as u64) << 21))
    }
}

/// Index into the Page Directory (derived from VA bits `[29:21]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L2Index(u16);

/// Decoded PDE kind.
///
/// - [`NextPageTable`](PdEntryKind::NextPageTable): non-leaf (`PS=0`),
///   carries the 4 KiB-aligned PT base.
/// - [`Leaf2MiB`](PdEntryKind::Leaf2MiB): leaf (`PS=1`), carries the
///   2 MiB-aligned page base.
pub enum PdEntryKind {
    NextPageTable(PhysicalPage<Size4K>, Pde),
    Leaf2MiB(PhysicalPage<Size2M>, Pde2M),
}

impl L2Index {
    /// Extract the index from a virtual address (bits `[29:21]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_va(va: VirtualAddress) -> Self {
        Self::new(layout::pde::index(va.as_u64()) as u16)
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

    /// Physical address of this entry within the PD at `table`.
    #[inline]
    #[must_use]
    pub const fn entry_address(self, table: PhysicalPage<Size4K>) -> PhysicalAddress {
        PhysicalAddress::new(layout::entry_address(table.base().as_u64(), self.as_u64()))
    }
}

impl Default for PdEntry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PdEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// Construct the union from raw `bits` (no validation).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self { bits }
    }

    /// Extract the raw `bits` back from the union.
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u64 {
        unsafe { self.bits }
    }

    #[inline]
    #[must_use]
    pub const fn present(self) -> bool {
        unsafe { self.bits & layout::pde::PRESENT != 0 }
    }

    /// **Typed read-only view** chosen by the `PS` bit.
    #[inline]
    #[must_use]
    pub const fn view(self) -> L2View {
        unsafe {
            if self.bits & layout::pde::PS != 0 {
                L2View::Leaf2M(self.leaf_2m)
            } else {
                L2View::Entry(self.entry)
            }
        }
    }

    /// Decode the entry into its semantic kind, or `None` if not present.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<PdEntryKind> {
        if !self.present() {
            return None;
        }

        Some(match self.view() {
            L2View::Entry(entry) => PdEntryKind::NextPageTable(entry.table_base(), entry),
            L2View::Leaf2M(leaf) => PdEntryKind::Leaf2MiB(leaf.page_base(), leaf),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pd_table_vs_2m() {
        let e_tbl = PdEntry::from_bits(0x0030_0000 | layout::pde::PRESENT);
        match e_tbl.kind().unwrap() {
            PdEntryKind::NextPageTable(p, f) => {
                assert_eq!(p.base().as_u64(), 0x0030_0000);
                assert!(f.present());
            }
            PdEntryKind::Leaf2MiB(..) => panic!("expected next PT"),
        }

        let e_2m = PdEntry::from_bits(0x0020_0000 | layout::pde::PRESENT | layout::pde::PS);
        match e_2m.kind().unwrap() {
            PdEntryKind::Leaf2MiB(p, f) => {
                assert_eq!(p.base().as_u64(), 0x0020_0000);
                assert!(f.page_size());
            }
            PdEntryKind::NextPageTable(..) => panic!("expected 2MiB leaf"),
        }
    }

    #[test]
    fn not_present_is_none_even_with_ps() {
        let e = PdEntry::from_bits(0x0020_0000 | layout::pde::PS);
        assert!(e.kind().is_none());
        assert_eq!(e.into_bits(), 0x0020_0000 | layout::pde::PS);
        assert!(PdEntry::default().kind().is_none());
    }

    #[test]
    fn low_leaf_bits_stay_out_of_the_2m_base() {
        // PAT and the reserved bits 13..20 must not leak into the base.
        let e = PdEntry::from_bits(
            0x0000_0001_0060_0000
                | layout::pde::leaf_2m::PAT
                | (0xFF << 13)
                | layout::pde::PRESENT
                | layout::pde::PS,
        );
        match e.kind().unwrap() {
            PdEntryKind::Leaf2MiB(p, f) => {
                assert_eq!(p.base().as_u64(), 0x0000_0001_0060_0000);
                assert!(f.pat_large());
            }
            PdEntryKind::NextPageTable(..) => panic!("expected 2MiB leaf"),
        }
    }
}
