//! # Page-Table Walk
//!
//! A software rendition of what the MMU does on a TLB miss: starting from
//! the PML4 base, read one entry per level, descend until a leaf, and
//! compose the physical address from the leaf base and the remaining
//! offset bits of the virtual address.
//!
//! ## Semantics
//!
//! - The walk stops early at a 1 GiB (PDPTE) or 2 MiB (PDE) leaf.
//! - A PML4E is never a leaf; bit 7 is ignored there.
//! - Entries are fetched through an injected [`PhysRead`], so the walker
//!   works against guest memory just as well as against a test fixture.
//!
//! ## Invariants
//!
//! - Exactly one read per visited level; a fault never triggers reads
//!   beyond the failing level.
//! - No access-rights checks and no canonicality checks: this resolves
//!   mappings, it does not emulate permission faults.

use pagewalk_addresses::{
    PhysicalAddress, PhysicalPage, Size1G, Size2M, Size4K, VirtualAddress,
};

use crate::PageSize;
use crate::cr3::Cr3;
use crate::entry_flags::EntryFlags;
use crate::page_table::pd::{PdEntry, PdEntryKind};
use crate::page_table::pdpt::{PdptEntry, PdptEntryKind};
use crate::page_table::pml4::Pml4Entry;
use crate::page_table::pt::PtEntry;
use crate::page_table::{Level, split_indices};

/// Read access to physical memory, 64 bits at a time.
///
/// The walker needs nothing else: every paging structure is read as
/// naturally aligned little-endian `u64` words.
pub trait PhysRead {
    /// Error produced when a read fails.
    type Error;

    /// Read the `u64` at `addr`.
    ///
    /// # Errors
    /// Returns the implementor's error when `addr` cannot be read, e.g.
    /// because it lies outside the backing memory.
    fn read_u64(&mut self, addr: PhysicalAddress) -> Result<u64, Self::Error>;
}

impl<T: PhysRead + ?Sized> PhysRead for &mut T {
    type Error = T::Error;

    #[inline]
    fn read_u64(&mut self, addr: PhysicalAddress) -> Result<u64, Self::Error> {
        (**self).read_u64(addr)
    }
}

/// Why a translation could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TranslateFault<E> {
    /// The entry consulted at `Level` had its present bit clear.
    #[error("entry not present ({0})")]
    NotPresent(Level),

    /// Fetching the entry at `level` from physical memory failed.
    #[error("physical read failed ({level})")]
    ReadError {
        /// Level whose entry could not be read.
        level: Level,
        /// Error reported by the [`PhysRead`] implementation.
        cause: E,
    },
}

/// A resolved mapping.
#[derive(Debug, Clone, Copy)]
pub struct Translation {
    /// Physical address the virtual address maps to.
    pub physical_address: PhysicalAddress,
    /// Size of the page that terminated the walk.
    pub page_size: PageSize,
    /// Flags of the leaf entry that produced the mapping.
    pub flags: EntryFlags,
}

/// Walks the 4-level hierarchy below a PML4 root.
///
/// Borrows the physical-read capability for its lifetime, so one walker
/// can serve many lookups against the same address space.
pub struct Walker<'m, M: PhysRead> {
    root: PhysicalPage<Size4K>,
    phys: &'m mut M,
}

impl<'m, M: PhysRead> Walker<'m, M> {
    /// Create a walker for the hierarchy rooted at `root`.
    #[must_use]
    pub fn from_root(root: PhysicalPage<Size4K>, phys: &'m mut M) -> Self {
        Self { root, phys }
    }

    /// Create a walker for the hierarchy a CR3 value points at.
    #[must_use]
    pub fn from_cr3(cr3: Cr3, phys: &'m mut M) -> Self {
        Self::from_root(cr3.pml4_table(), phys)
    }

    /// Resolve `va` to its physical mapping.
    ///
    /// Reads one entry per level until a leaf terminates the walk. The
    /// upper bits of `va` are not checked for canonicality.
    ///
    /// # Errors
    /// [`TranslateFault::NotPresent`] when an entry's present bit is
    /// clear, and [`TranslateFault::ReadError`] when fetching an entry
    /// fails; in both cases no further entries are read.
    pub fn translate(
        &mut self,
        va: VirtualAddress,
    ) -> Result<Translation, TranslateFault<M::Error>> {
        let (i4, i3, i2, i1) = split_indices(va);

        let e4 = Pml4Entry::from_bits(self.read(Level::Pml4, i4.entry_address(self.root))?);
        let Some(pdpt) = e4.next_table() else {
            return Err(TranslateFault::NotPresent(Level::Pml4));
        };

        let e3 = PdptEntry::from_bits(self.read(Level::Pdpt, i3.entry_address(pdpt))?);
        let pd = match e3.kind() {
            None => return Err(TranslateFault::NotPresent(Level::Pdpt)),
            Some(PdptEntryKind::Leaf1GiB(page, leaf)) => {
                return Ok(resolved(
                    va,
                    page.join(va.offset::<Size1G>()),
                    PageSize::Size1G,
                    EntryFlags::from_bits(leaf.into_bits()),
                ));
            }
            Some(PdptEntryKind::NextPageDirectory(page, _)) => page,
        };

        let e2 = PdEntry::from_bits(self.read(Level::Pd, i2.entry_address(pd))?);
        let pt = match e2.kind() {
            None => return Err(TranslateFault::NotPresent(Level::Pd)),
            Some(PdEntryKind::Leaf2MiB(page, leaf)) => {
                return Ok(resolved(
                    va,
                    page.join(va.offset::<Size2M>()),
                    PageSize::Size2M,
                    EntryFlags::from_bits(leaf.into_bits()),
                ));
            }
            Some(PdEntryKind::NextPageTable(page, _)) => page,
        };

        let e1 = PtEntry::from_bits(self.read(Level::Pt, i1.entry_address(pt))?);
        let Some((page, flags)) = e1.page_4k() else {
            return Err(TranslateFault::NotPresent(Level::Pt));
        };
        Ok(resolved(
            va,
            page.join(va.offset::<Size4K>()),
            PageSize::Size4K,
            flags,
        ))
    }

    fn read(
        &mut self,
        level: Level,
        at: PhysicalAddress,
    ) -> Result<u64, TranslateFault<M::Error>> {
        match self.phys.read_u64(at) {
            Ok(bits) => Ok(bits),
            Err(cause) => Err(TranslateFault::ReadError { level, cause }),
        }
    }
}

fn resolved(
    va: VirtualAddress,
    physical_address: PhysicalAddress,
    page_size: PageSize,
    flags: EntryFlags,
) -> Translation {
    log::trace!("translated {va} -> {physical_address} ({page_size} page)");
    Translation {
        physical_address,
        page_size,
        flags,
    }
}

/// Resolve `va` through the hierarchy rooted at `root`.
///
/// One-shot convenience wrapper around [`Walker`].
///
/// # Errors
/// See [`Walker::translate`].
pub fn translate<M: PhysRead>(
    root: PhysicalPage<Size4K>,
    va: VirtualAddress,
    phys: &mut M,
) -> Result<Translation, TranslateFault<M::Error>> {
    Walker::from_root(root, phys).translate(va)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use std::collections::HashMap;

    /// Sparse physical memory of 8-byte words; reads of absent words fail.
    struct TestMemory {
        words: HashMap<u64, u64>,
        reads: usize,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Unmapped(u64);

    impl TestMemory {
        fn new() -> Self {
            Self {
                words: HashMap::new(),
                reads: 0,
            }
        }

        fn write_u64(&mut self, at: u64, value: u64) {
            self.words.insert(at, value);
        }
    }

    impl PhysRead for TestMemory {
        type Error = Unmapped;

        fn read_u64(&mut self, addr: PhysicalAddress) -> Result<u64, Unmapped> {
            self.reads += 1;
            self.words
                .get(&addr.as_u64())
                .copied()
                .ok_or(Unmapped(addr.as_u64()))
        }
    }

    // One table per level, laid out back to back.
    const PML4: u64 = 0x1000;
    const PDPT: u64 = 0x2000;
    const PD: u64 = 0x3000;
    const PT: u64 = 0x4000;

    fn root() -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(PML4))
    }

    /// Indices 1/2/3/4 down the levels, offset 0xABC.
    fn va_4k() -> VirtualAddress {
        VirtualAddress::new((1 << 39) | (2 << 30) | (3 << 21) | (4 << 12) | 0xABC)
    }

    /// Entry words the indices of [`va_4k`] select (index times 8).
    const E4_AT: u64 = PML4 + 8;
    const E3_AT: u64 = PDPT + 0x10;
    const E2_AT: u64 = PD + 0x18;
    const E1_AT: u64 = PT + 0x20;

    fn mem_with_4k_chain() -> TestMemory {
        let mut mem = TestMemory::new();
        mem.write_u64(E4_AT, PDPT | layout::pml4e::PRESENT);
        mem.write_u64(E3_AT, PD | layout::pdpte::PRESENT);
        mem.write_u64(E2_AT, PT | layout::pde::PRESENT);
        mem.write_u64(
            E1_AT,
            0x0000_0010_2000_0000
                | layout::pte::PRESENT
                | layout::pte::RW
                | layout::pte::DIRTY,
        );
        mem
    }

    #[test]
    fn resolves_a_4k_mapping() {
        let mut mem = mem_with_4k_chain();
        let t = translate(root(), va_4k(), &mut mem).unwrap();
        assert_eq!(t.physical_address.as_u64(), 0x0000_0010_2000_0ABC);
        assert_eq!(t.page_size, PageSize::Size4K);
        assert!(t.flags.writable());
        assert!(t.flags.dirty());
        assert_eq!(mem.reads, 4);
    }

    #[test]
    fn resolves_a_1g_mapping() {
        let mut mem = TestMemory::new();
        let va = VirtualAddress::new((1 << 39) | (2 << 30) | 0x1234);
        mem.write_u64(E4_AT, PDPT | layout::pml4e::PRESENT);
        mem.write_u64(
            E3_AT,
            0x4000_0000 | layout::pdpte::PRESENT | layout::pdpte::PS | layout::pdpte::XD,
        );

        let t = translate(root(), va, &mut mem).unwrap();
        assert_eq!(t.physical_address.as_u64(), 0x4000_1234);
        assert_eq!(t.page_size, PageSize::Size1G);
        assert!(t.flags.no_execute());
        assert_eq!(mem.reads, 2);
    }

    #[test]
    fn resolves_a_2m_mapping() {
        let mut mem = TestMemory::new();
        let va = VirtualAddress::new((1 << 39) | (2 << 30) | (3 << 21) | 0xABC);
        mem.write_u64(E4_AT, PDPT | layout::pml4e::PRESENT);
        mem.write_u64(E3_AT, PD | layout::pdpte::PRESENT);
        mem.write_u64(
            E2_AT,
            0x0020_0000 | layout::pde::PRESENT | layout::pde::PS | layout::pde::US,
        );

        let t = translate(root(), va, &mut mem).unwrap();
        assert_eq!(t.physical_address.as_u64(), 0x0020_0ABC);
        assert_eq!(t.page_size, PageSize::Size2M);
        assert!(t.flags.user());
        assert_eq!(mem.reads, 3);
    }

    #[test]
    fn not_present_pml4e_faults_regardless_of_other_bits() {
        let mut mem = TestMemory::new();
        // Address and permission bits set, present clear.
        mem.write_u64(
            E4_AT,
            PDPT | layout::pml4e::RW | layout::pml4e::US | layout::pml4e::XD,
        );

        let fault = translate(root(), va_4k(), &mut mem).unwrap_err();
        assert_eq!(fault, TranslateFault::NotPresent(Level::Pml4));
        assert_eq!(mem.reads, 1);
    }

    #[test]
    fn not_present_mid_walk_names_the_level() {
        let mut mem = mem_with_4k_chain();
        mem.write_u64(E3_AT, PD | layout::pdpte::RW);

        let fault = translate(root(), va_4k(), &mut mem).unwrap_err();
        assert_eq!(fault, TranslateFault::NotPresent(Level::Pdpt));
        assert_eq!(mem.reads, 2);
    }

    #[test]
    fn read_failure_stops_the_walk() {
        let mut mem = mem_with_4k_chain();
        mem.words.remove(&E2_AT);

        let fault = translate(root(), va_4k(), &mut mem).unwrap_err();
        assert_eq!(
            fault,
            TranslateFault::ReadError {
                level: Level::Pd,
                cause: Unmapped(E2_AT),
            }
        );
        // The PT entry exists but must never be fetched.
        assert_eq!(mem.reads, 3);
    }

    #[test]
    fn pml4e_bit_7_is_ignored() {
        let mut mem = TestMemory::new();
        let va = VirtualAddress::new((1 << 39) | (2 << 30));
        mem.write_u64(E4_AT, PDPT | layout::pml4e::PRESENT | (1 << 7));
        mem.write_u64(
            E3_AT,
            0x4000_0000 | layout::pdpte::PRESENT | layout::pdpte::PS,
        );

        let t = translate(root(), va, &mut mem).unwrap();
        assert_eq!(t.physical_address.as_u64(), 0x4000_0000);
        assert_eq!(t.page_size, PageSize::Size1G);
    }

    #[test]
    fn upper_va_bits_are_not_validated() {
        let mut mem = mem_with_4k_chain();
        // Same low 48 bits as `va_4k`, garbage above bit 47.
        let va = VirtualAddress::new(0xDEAD_0000_0000_0000 | va_4k().as_u64());

        let t = translate(root(), va, &mut mem).unwrap();
        assert_eq!(t.physical_address.as_u64(), 0x0000_0010_2000_0ABC);
    }

    #[test]
    fn reads_pass_through_mut_references() {
        let mut mem = mem_with_4k_chain();
        let mut by_ref = &mut mem;
        let t = translate(root(), va_4k(), &mut by_ref).unwrap();
        assert_eq!(t.physical_address.as_u64(), 0x0000_0010_2000_0ABC);
    }

    #[test]
    fn walker_serves_repeated_lookups() {
        let mut mem = mem_with_4k_chain();
        let mut walker = Walker::from_root(root(), &mut mem);

        let first = walker.translate(va_4k()).unwrap();
        let again = walker.translate(va_4k()).unwrap();
        assert_eq!(first.physical_address, again.physical_address);
    }

    #[test]
    fn walker_from_cr3_uses_the_pml4_base() {
        let mut mem = mem_with_4k_chain();
        let cr3 = Cr3::from_pml4_phys(PhysicalAddress::new(PML4)).with_pcd(true);

        let t = Walker::from_cr3(cr3, &mut mem).translate(va_4k()).unwrap();
        assert_eq!(t.physical_address.as_u64(), 0x0000_0010_2000_0ABC);
    }
}
