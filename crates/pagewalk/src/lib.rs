//! # Page-Table Walking for x86-64
//!
//! A software walker for the x86-64 4-level paging hierarchy.
//!
//! Point it at a PML4 root and a source of physical memory, such as a
//! guest's RAM or a memory snapshot, and it resolves virtual addresses
//! the way the MMU would on a TLB miss.
//!
//! ## What you get
//!
//! - A [`Walker`] (and one-shot [`translate`]) resolving VAs to
//!   physical addresses, page sizes and leaf flags.
//! - The [`PhysRead`] capability trait that decouples walking from how
//!   physical memory is accessed.
//! - Typed entries for all four structures in [`page_table`], plus the
//!   raw bit-level map in [`layout`].
//! - [`Cr3`] decoding and the address newtypes re-exported from
//!   [`pagewalk_addresses`](addresses).
//!
//! ## Virtual Address → Physical Address
//!
//! Each 48-bit virtual address divides into five fields:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! The four 9-bit fields index four levels of tables, each holding 512
//! entries of 8 bytes:
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  Physical Page
//!   │        │        │       │
//!   │        │        │       └───► PTE   → maps a 4 KiB page (always a leaf)
//!   │        │        └───────────► PDE   → PS=1 maps a 2 MiB page
//!   │        └────────────────────► PDPTE → PS=1 maps a 1 GiB page
//!   └─────────────────────────────► PML4E → never a leaf
//! ```
//!
//! | Level | Table | Entry | Role |
//! |:------|:------|:------|:-----|
//! | 1 | **PML4** (Page Map Level 4) | **PML4E** | Root table, referenced by CR3. Bit 7 is ignored here. |
//! | 2 | **PDPT** (Page Directory Pointer Table) | **PDPTE** | References a PD, or maps a 1 GiB page when `PS=1`. |
//! | 3 | **PD** (Page Directory) | **PDE** | References a PT, or maps a 2 MiB page when `PS=1`. |
//! | 4 | **PT** (Page Table) | **PTE** | Maps a 4 KiB page; bit 7 is `PAT`, not `PS`. |
//!
//! A leaf contributes the page base; the virtual address contributes the
//! remaining offset bits (12, 21 or 30 of them). The walker checks
//! presence only, without access-rights or canonicality checks, and
//! reads exactly one entry per visited level.
//!
//! ## Example
//!
//! ```rust
//! use pagewalk::{PageSize, PhysRead, Walker};
//! use pagewalk::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
//! use std::collections::HashMap;
//!
//! /// Sparse guest memory of naturally aligned 8-byte words.
//! struct GuestMemory(HashMap<u64, u64>);
//!
//! impl PhysRead for GuestMemory {
//!     type Error = ();
//!
//!     fn read_u64(&mut self, addr: PhysicalAddress) -> Result<u64, ()> {
//!         self.0.get(&addr.as_u64()).copied().ok_or(())
//!     }
//! }
//!
//! // A PML4 at 0x1000 whose entry 0 references a PDPT at 0x2000, whose
//! // entry 0 maps the first gigabyte as one large page based at 0x0.
//! let mut mem = GuestMemory(HashMap::from([
//!     (0x1000_u64, 0x2000 | 0x1),       // PML4E: present
//!     (0x2000_u64, 0x1 | (1 << 7)),     // PDPTE: present + PS
//! ]));
//!
//! let root = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x1000));
//! let t = Walker::from_root(root, &mut mem)
//!     .translate(VirtualAddress::new(0x1234))
//!     .unwrap();
//! assert_eq!(t.physical_address.as_u64(), 0x1234);
//! assert_eq!(t.page_size, PageSize::Size1G);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod layout;
pub mod page_table;

mod cr3;
mod entry_flags;
mod walk;

use core::fmt;

pub use crate::cr3::Cr3;
pub use crate::entry_flags::EntryFlags;
pub use crate::page_table::{Level, split_indices};
pub use crate::walk::{PhysRead, TranslateFault, Translation, Walker, translate};

/// The address vocabulary this crate builds on.
pub use pagewalk_addresses as addresses;
pub use pagewalk_addresses::{
    PageOffset, PhysicalAddress, PhysicalPage, Size1G, Size2M, Size4K, VirtualAddress,
};

/// Size of the page a translation resolved through.
///
/// Follows from the level where the walk terminated: 4 KiB pages come
/// from the PT, 2 MiB and 1 GiB pages terminate early at the PD or PDPT.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PageSize {
    /// 4 KiB page mapped by a PTE (PT leaf).
    Size4K,
    /// 2 MiB page mapped by a PDE with `PS=1` (PD leaf).
    Size2M,
    /// 1 GiB page mapped by a PDPTE with `PS=1` (PDPT leaf).
    Size1G,
}

impl PageSize {
    /// Page size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Size4K => 4096,
            Self::Size2M => 2 * 1024 * 1024,
            Self::Size1G => 1024 * 1024 * 1024,
        }
    }

    /// `log2` of [`bytes`](Self::bytes), i.e. the offset width in bits.
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Size4K => 12,
            Self::Size2M => 21,
            Self::Size1G => 30,
        }
    }

    /// Mask covering the in-page offset bits.
    #[must_use]
    pub const fn offset_mask(self) -> u64 {
        self.bytes() - 1
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Size4K => "4K",
            Self::Size2M => "2M",
            Self::Size1G => "1G",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
