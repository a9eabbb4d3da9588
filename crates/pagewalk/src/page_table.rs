//! # Typed Page-Table Entries
//!
//! One submodule per paging structure, top-down: [`pml4`], [`pdpt`],
//! [`pd`] and [`pt`]. Each provides a 9-bit index newtype and a typed
//! entry that decodes the raw 64-bit value read from physical memory.
//!
//! ## Semantics
//!
//! PDPTEs and PDEs are dual-form: bit 7 (`PS`) selects between a
//! reference to the next table and a large-page leaf, re-purposing part
//! of the address field as extra offset bits. Their entry types are
//! unions over both forms with a [`kind`](pdpt::PdptEntry::kind) accessor
//! that resolves the view. PML4Es ignore bit 7 entirely, and PTEs
//! interpret it as `PAT`, so neither is a union.

pub mod pd;
pub mod pdpt;
pub mod pml4;
pub mod pt;

pub use self::pd::L2Index;
pub use self::pdpt::L3Index;
pub use self::pml4::L4Index;
pub use self::pt::L1Index;

use core::fmt;

use pagewalk_addresses::VirtualAddress;

/// The four levels of the hierarchy, in walk order.
///
/// Used to report where a translation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Page-Map Level 4.
    Pml4,
    /// Page-Directory-Pointer Table.
    Pdpt,
    /// Page Directory.
    Pd,
    /// Page Table.
    Pt,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pml4 => "PML4",
            Self::Pdpt => "PDPT",
            Self::Pd => "PD",
            Self::Pt => "PT",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a virtual address into its four table indices, top-down.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (L4Index, L3Index, L2Index, L1Index) {
    (
        L4Index::from_va(va),
        L3Index::from_va(va),
        L2Index::from_va(va),
        L1Index::from_va(va),
    )
}
