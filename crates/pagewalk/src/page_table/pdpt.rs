//! # Page-Directory-Pointer Table (PDPT / L3)
//!
//! The third paging level, and the first that can terminate a walk:
//!
//! - [`L3Index`]: index type for virtual-address bits `[38:30]`.
//! - [`PdptEntry`]: a PDPT entry that is either a reference to a PD
//!   (`PS=0`) or a 1 GiB leaf (`PS=1`).
//! - [`PdptEntryKind`]: decoded view of a present entry.
//!
//! ## Semantics
//!
//! Bit 7 (`PS`) selects the role of an entry:
//! - `PS=0`: the entry references a Page Directory, 4 KiB-aligned.
//! - `PS=1`: the entry maps a 1 GiB page; bits 29:12 of the address field
//!   are re-purposed (`PAT` at bit 12, the rest reserved), leaving bits
//!   51:30 as the page base.

use bitfield_struct::bitfield;
use pagewalk_addresses::{PhysicalAddress, PhysicalPage, Size1G, Size4K, VirtualAddress};

use crate::layout;

/// **Borrowed view** into an L3 PDPTE, selected by the `PS` bit.
///
/// Returned by [`PdptEntry::view`].
pub enum L3View {
    /// Non-leaf PDPTE view (`PS=0`).
    Entry(Pdpte),
    /// 1 GiB leaf PDPTE view (`PS=1`).
    Leaf1G(Pdpte1G),
}

/// **L3 PDPTE union** — overlays non-leaf [`Pdpte`] and leaf [`Pdpte1G`]
/// on the same 64-bit storage.
///
/// Prefer [`PdptEntry::kind`] (or [`PdptEntry::view`]) for typed access;
/// both check the `PS` bit and hand out the matching form.
#[derive(Copy, Clone)]
#[repr(C)]
pub union PdptEntry {
    /// Raw 64-bit storage of the entry.
    bits: u64,
    /// Non-leaf form: reference to a Page Directory (`PS=0`).
    entry: Pdpte,
    /// Leaf form: 1 GiB mapping (`PS=1`).
    leaf_1g: Pdpte1G,
}

/// L3 **PDPTE** — reference to a **Page Directory** (non-leaf; `PS=0`).
///
/// Bits 12..51 are entirely the PD base address; `PAT` only exists in the
/// leaf form.
#[bitfield(u64)]
pub struct Pdpte {
    /// **Present** (bit 0): the entry references a PD if set.
    pub present: bool,

    /// **Writable** (bit 1): write permission for the 1 GiB region.
    pub writable: bool,

    /// **User/Supervisor** (bit 2): allow user-mode access if set.
    pub user: bool,

    /// **Page Write-Through** (PWT, bit 3): caching policy for the PD
    /// access.
    pub write_through: bool,

    /// **Page Cache Disable** (PCD, bit 4): disable caching for the PD
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
    /// Stores the PD base (4 KiB-aligned) with the low 12 bits omitted.
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

impl Pdpte {
    /// The referenced Page Directory base (bits 51:12).
    #[inline]
    #[must_use]
    pub const fn table_base(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.phys_addr_51_12() << 12))
    }
}

/// L3 **PDPTE (1 GiB leaf)** — maps a single 1 GiB page (`PS=1`).
///
/// - **PAT** lives at bit **12** in this form.
/// - The physical base uses bits **51:30**; bits 29:13 are reserved.
/// - `Dirty` and `Global` are meaningful here, unlike in the non-leaf form.
#[bitfield(u64)]
pub struct Pdpte1G {
    /// **Present** (bit 0): the entry maps a 1 GiB page if set.
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

    /// **Page Size** (PS, bit 7): **must be 1** for a 1 GiB leaf.
    #[bits(default = true)]
    pub page_size: bool,

    /// **Global** (G, bit 8): the TLB entry survives a CR3 reload.
    pub global: bool,

    /// **OS-available low** (bits 9..11): not interpreted by hardware.
    #[bits(3)]
    pub os_available_low: u8,

    /// **PAT** (bit 12): memory-type selector for 1 GiB mappings.
    pub pat_large: bool,

    /// **Reserved** (bits 13..29): must be 0.
    #[bits(17)]
    __res_13_29: u32,

    /// **1 GiB page physical address** (bits 30..51).
    ///
    /// Stores the page base (1 GiB-aligned) with the low 30 bits omitted.
    #[bits(22)]
    phys_addr_51_30: u32,

    /// **OS-available high** (bits 52..58): not interpreted by hardware.
    #[bits(7)]
    pub os_available_high: u8,

    /// **Protection Key** (bits 59..62): with `CR4.PKE`.
    #[bits(4)]
    pub protection_key: u8,

    /// **No-Execute** (NX, bit 63 / XD on Intel).
    pub no_execute: bool,
}

impl Pdpte1G {
    /// The mapped 1 GiB page base (bits 51:30).
    #[inline]
    #[must_use]
    pub const fn page_base(self) -> PhysicalPage<Size1G> {
        PhysicalPage::from_addr(PhysicalAddress::new((self.phys_addr_51_30() as u64) << 30))
    }
}

/// Index into the PDPT (derived from virtual-address bits `[38:30]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L3Index(u16);

/// Decoded PDPTE kind.
///
/// - [`NextPageDirectory`](PdptEntryKind::NextPageDirectory): non-leaf
///   (`PS=0`), carries the 4 KiB-aligned PD base.
/// - [`Leaf1GiB`](PdptEntryKind::Leaf1GiB): leaf (`PS=1`), carries the
///   1 GiB-aligned page base.
pub enum PdptEntryKind {
    NextPageDirectory(PhysicalPage<Size4K>, Pdpte),
    Leaf1GiB(PhysicalPage<Size1G>, Pdpte1G),
}

impl L3Index {
    /// Extract the index from a virtual address (bits `[38:30]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_va(va: VirtualAddress) -> Self {
        Self::new(layout::pdpte::index(va.as_u64()) as u16)
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

    /// Physical address of this entry within the PDPT at `table`.
    #[inline]
    #[must_use]
    pub const fn entry_address(self, table: PhysicalPage<Size4K>) -> PhysicalAddress {
        PhysicalAddress::new(layout::entry_address(table.base().as_u64(), self.as_u64()))
    }
}

impl Default for PdptEntry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PdptEntry {
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
        unsafe { self.bits & layout::pdpte::PRESENT != 0 }
    }

    /// **Typed read-only view** chosen by the `PS` bit.
    #[inline]
    #[must_use]
    pub const fn view(self) -> L3View {
        unsafe {
            if self.bits & layout::pdpte::PS != 0 {
                L3View::Leaf1G(self.leaf_1g)
            } else {
                L3View::Entry(self.entry)
            }
        }
    }

    /// Decode the entry into its semantic kind, or `None` if not present.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<PdptEntryKind> {
        if !self.present() {
            return None;
        }

        Some(match self.view() {
            L3View::Entry(entry) => PdptEntryKind::NextPageDirectory(entry.table_base(), entry),
            L3View::Leaf1G(leaf) => PdptEntryKind::Leaf1GiB(leaf.page_base(), leaf),
        })
    }
}
