//! # Raw x86-64 Paging Layout
//!
//! Bit positions, masks and `const fn` helpers for the four paging
//! structures, grouped per structure: [`cr3`], [`pml4e`], [`pdpte`],
//! [`pde`] and [`pte`]. The grouping mirrors the SDM format tables, so
//! flags that only exist for a given structure (or only for its large-page
//! form) live in that structure's namespace.
//!
//! | Structure | Indexed by VA bits | Leaf form |
//! |-----------|--------------------|-----------|
//! | PML4E | 47:39 | never |
//! | PDPTE | 38:30 | 1 GiB page when `PS` is set |
//! | PDE | 29:21 | 2 MiB page when `PS` is set |
//! | PTE | 20:12 | always (bit 7 is `PAT` here) |
//!
//! Everything in this module operates on raw `u64` values. The typed view
//! built on top of it lives in [`crate::page_table`].

/// Bits 51:12 of an entry, i.e. the 4 KiB aligned base of the next table.
pub const TABLE_BASE_MASK: u64 = 0x000F_FFFF_FFFF_F000;

/// Extract the next-table base from a non-leaf entry.
#[inline]
#[must_use]
pub const fn table_base(entry: u64) -> u64 {
    entry & TABLE_BASE_MASK
}

/// Physical address of the entry at `index` within the table at `table_base`.
///
/// Each table holds 512 entries of 8 bytes; the base is 4 KiB aligned, so
/// OR-ing the scaled index is exact.
#[inline]
#[must_use]
pub const fn entry_address(table_base: u64, index: u64) -> u64 {
    table_base | (index * 8)
}

/// Virtual-address field positions.
pub mod va {
    /// Shift for the PML4 index (bits 47:39).
    pub const PML4E_SHIFT: u32 = 39;
    /// Shift for the PDPT index (bits 38:30).
    pub const PDPTE_SHIFT: u32 = 30;
    /// Shift for the PD index (bits 29:21).
    pub const PDE_SHIFT: u32 = 21;
    /// Shift for the PT index (bits 20:12).
    pub const PTE_SHIFT: u32 = 12;

    /// Each index field is 9 bits wide.
    pub const INDEX_MASK: u64 = 0x1FF;

    /// Offset within a 4 KiB page (bits 11:0).
    pub const PAGE_OFFSET_4K_MASK: u64 = 0xFFF;
    /// Offset within a 2 MiB page (bits 20:0).
    pub const PAGE_OFFSET_2M_MASK: u64 = 0x1F_FFFF;
    /// Offset within a 1 GiB page (bits 29:0).
    pub const PAGE_OFFSET_1G_MASK: u64 = 0x3FFF_FFFF;
}

/// Control register 3: the paging root.
///
/// Only the cache-control bits and the PML4 base are architectural here;
/// with PCIDs disabled the low 12 bits are otherwise reserved.
pub mod cr3 {
    /// Page-level write-through for the PML4 access.
    pub const PWT: u64 = 1 << 3;
    /// Page-level cache disable for the PML4 access.
    pub const PCD: u64 = 1 << 4;
    /// Bits 51:12, the physical base of the PML4 table.
    pub const PML4_BASE_MASK: u64 = super::TABLE_BASE_MASK;
}

/// Page-Map Level 4 Entry. References a PDPT; never maps a page itself
/// (bit 7 is ignored in this structure).
pub mod pml4e {
    /// Entry references a page-directory-pointer table.
    pub const PRESENT: u64 = 1;
    /// Writes allowed to the 512 GiB region.
    pub const RW: u64 = 1 << 1;
    /// User-mode access allowed to the 512 GiB region.
    pub const US: u64 = 1 << 2;
    /// Page-level write-through for the PDPT access.
    pub const PWT: u64 = 1 << 3;
    /// Page-level cache disable for the PDPT access.
    pub const PCD: u64 = 1 << 4;
    /// Set by hardware when the entry has been used for translation.
    pub const ACCESSED: u64 = 1 << 5;
    /// HLAT restart: ordinary translation restarts from this entry.
    pub const RESTART: u64 = 1 << 11;
    /// Execution disabled for the 512 GiB region (requires `EFER.NXE`).
    pub const XD: u64 = 1 << 63;

    /// Bits 51:12, the physical base of the referenced PDPT.
    pub const PDPT_ADDRESS_MASK: u64 = super::TABLE_BASE_MASK;

    /// PML4 index of a virtual address (bits 47:39).
    #[inline]
    #[must_use]
    pub const fn index(va: u64) -> u64 {
        (va >> super::va::PML4E_SHIFT) & super::va::INDEX_MASK
    }
}

/// Page-Directory-Pointer Table Entry. References a PD, or maps a 1 GiB
/// page when [`PS`](pdpte::PS) is set (the [`leaf_1g`](pdpte::leaf_1g)
/// namespace holds the leaf-only bits).
pub mod pdpte {
    /// Entry references a page directory or maps a 1 GiB page.
    pub const PRESENT: u64 = 1;
    /// Writes allowed to the 1 GiB region.
    pub const RW: u64 = 1 << 1;
    /// User-mode access allowed to the 1 GiB region.
    pub const US: u64 = 1 << 2;
    /// Page-level write-through.
    pub const PWT: u64 = 1 << 3;
    /// Page-level cache disable.
    pub const PCD: u64 = 1 << 4;
    /// Set by hardware when the entry has been used for translation.
    pub const ACCESSED: u64 = 1 << 5;
    /// Page size: set means this entry maps a 1 GiB page.
    pub const PS: u64 = 1 << 7;
    /// HLAT restart.
    pub const RESTART: u64 = 1 << 11;
    /// Execution disabled for the 1 GiB region.
    pub const XD: u64 = 1 << 63;

    /// Bits 51:12, the physical base of the referenced PD (`PS` clear).
    pub const PD_ADDRESS_MASK: u64 = super::TABLE_BASE_MASK;

    /// PDPT index of a virtual address (bits 38:30).
    #[inline]
    #[must_use]
    pub const fn index(va: u64) -> u64 {
        (va >> super::va::PDPTE_SHIFT) & super::va::INDEX_MASK
    }

    /// Does this entry map a 1 GiB page rather than reference a PD?
    #[inline]
    #[must_use]
    pub const fn is_large_page(entry: u64) -> bool {
        entry & PS != 0
    }

    /// Bits that only exist when the entry maps a 1 GiB page.
    pub mod leaf_1g {
        use super::super::va;

        /// Set by hardware on a write to the 1 GiB page.
        pub const DIRTY: u64 = 1 << 6;
        /// Translation survives a CR3 switch (requires `CR4.PGE`).
        pub const GLOBAL: u64 = 1 << 8;
        /// PAT bit; moves to bit 12 in the large-page forms.
        pub const PAT: u64 = 1 << 12;
        /// Bits 62:59, the protection key (requires `CR4.PKE`).
        pub const PKE: u64 = 1 << 59;

        /// Bits 51:30, the physical base of the 1 GiB page.
        pub const PHYS_ADDRESS_MASK: u64 = 0x000F_FFFF_C000_0000;

        /// Physical address mapped by a 1 GiB leaf for the given VA.
        #[inline]
        #[must_use]
        pub const fn page_address(entry: u64, va: u64) -> u64 {
            (entry & PHYS_ADDRESS_MASK) | (va & va::PAGE_OFFSET_1G_MASK)
        }
    }
}

/// Page Directory Entry. References a PT, or maps a 2 MiB page when
/// [`PS`](pde::PS) is set.
pub mod pde {
    /// Entry references a page table or maps a 2 MiB page.
    pub const PRESENT: u64 = 1;
    /// Writes allowed to the 2 MiB region.
    pub const RW: u64 = 1 << 1;
    /// User-mode access allowed to the 2 MiB region.
    pub const US: u64 = 1 << 2;
    /// Page-level write-through.
    pub const PWT: u64 = 1 << 3;
    /// Page-level cache disable.
    pub const PCD: u64 = 1 << 4;
    /// Set by hardware when the entry has been used for translation.
    pub const ACCESSED: u64 = 1 << 5;
    /// Page size: set means this entry maps a 2 MiB page.
    pub const PS: u64 = 1 << 7;
    /// HLAT restart.
    pub const RESTART: u64 = 1 << 11;
    /// Execution disabled for the 2 MiB region.
    pub const XD: u64 = 1 << 63;

    /// Bits 51:12, the physical base of the referenced PT (`PS` clear).
    pub const PT_ADDRESS_MASK: u64 = super::TABLE_BASE_MASK;

    /// PD index of a virtual address (bits 29:21).
    #[inline]
    #[must_use]
    pub const fn index(va: u64) -> u64 {
        (va >> super::va::PDE_SHIFT) & super::va::INDEX_MASK
    }

    /// Does this entry map a 2 MiB page rather than reference a PT?
    #[inline]
    #[must_use]
    pub const fn is_large_page(entry: u64) -> bool {
        entry & PS != 0
    }

    /// Bits that only exist when the entry maps a 2 MiB page.
    pub mod leaf_2m {
        use super::super::va;

        /// Set by hardware on a write to the 2 MiB page.
        pub const DIRTY: u64 = 1 << 6;
        /// Translation survives a CR3 switch (requires `CR4.PGE`).
        pub const GLOBAL: u64 = 1 << 8;
        /// PAT bit; moves to bit 12 in the large-page forms.
        pub const PAT: u64 = 1 << 12;
        /// Bits 62:59, the protection key (requires `CR4.PKE`).
        pub const PKE: u64 = 1 << 59;

        /// Bits 51:21, the physical base of the 2 MiB page.
        pub const PHYS_ADDRESS_MASK: u64 = 0x000F_FFFF_FFE0_0000;

        /// Physical address mapped by a 2 MiB leaf for the given VA.
        #[inline]
        #[must_use]
        pub const fn page_address(entry: u64, va: u64) -> u64 {
            (entry & PHYS_ADDRESS_MASK) | (va & va::PAGE_OFFSET_2M_MASK)
        }
    }
}

/// Page Table Entry. Always maps a 4 KiB page; bit 7 is `PAT` here, not
/// `PS`, so the leaf-only bits live directly in this namespace.
pub mod pte {
    /// Entry maps a 4 KiB page.
    pub const PRESENT: u64 = 1;
    /// Writes allowed to the page.
    pub const RW: u64 = 1 << 1;
    /// User-mode access allowed to the page.
    pub const US: u64 = 1 << 2;
    /// Page-level write-through.
    pub const PWT: u64 = 1 << 3;
    /// Page-level cache disable.
    pub const PCD: u64 = 1 << 4;
    /// Set by hardware when the entry has been used for translation.
    pub const ACCESSED: u64 = 1 << 5;
    /// Set by hardware on a write to the page.
    pub const DIRTY: u64 = 1 << 6;
    /// PAT bit; occupies the `PS` position of the other structures.
    pub const PAT: u64 = 1 << 7;
    /// Translation survives a CR3 switch (requires `CR4.PGE`).
    pub const GLOBAL: u64 = 1 << 8;
    /// HLAT restart.
    pub const RESTART: u64 = 1 << 11;
    /// Bits 62:59, the protection key (requires `CR4.PKE`).
    pub const PKE: u64 = 1 << 59;
    /// Execution disabled for the page.
    pub const XD: u64 = 1 << 63;

    /// Bits 51:12, the physical base of the 4 KiB page.
    pub const PHYS_ADDRESS_MASK: u64 = super::TABLE_BASE_MASK;

    /// PT index of a virtual address (bits 20:12).
    #[inline]
    #[must_use]
    pub const fn index(va: u64) -> u64 {
        (va >> super::va::PTE_SHIFT) & super::va::INDEX_MASK
    }

    /// Physical address mapped by a PTE for the given VA.
    #[inline]
    #[must_use]
    pub const fn page_address(entry: u64, va: u64) -> u64 {
        (entry & PHYS_ADDRESS_MASK) | (va & super::va::PAGE_OFFSET_4K_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn va_fields_reconstruct_low_48_bits() {
        for va in [
            0x0000_7FFF_FFFF_FFFF_u64,
            0xFFFF_8000_4123_4567,
            0x0000_0000_0000_0000,
            0xDEAD_BEEF_CAFE_F00D,
        ] {
            let rebuilt = (pml4e::index(va) << va::PML4E_SHIFT)
                | (pdpte::index(va) << va::PDPTE_SHIFT)
                | (pde::index(va) << va::PDE_SHIFT)
                | (pte::index(va) << va::PTE_SHIFT)
                | (va & va::PAGE_OFFSET_4K_MASK);
            assert_eq!(rebuilt, va & 0x0000_FFFF_FFFF_FFFF);
        }
    }

    #[test]
    fn index_fields_are_9_bits() {
        let va = u64::MAX;
        assert_eq!(pml4e::index(va), 511);
        assert_eq!(pdpte::index(va), 511);
        assert_eq!(pde::index(va), 511);
        assert_eq!(pte::index(va), 511);
    }

    #[test]
    fn entries_are_8_bytes_apart() {
        let base = 0x0000_0000_0010_1000_u64;
        assert_eq!(entry_address(base, 0), base);
        assert_eq!(entry_address(base, 1), base + 8);
        assert_eq!(entry_address(base, 511), base + 0xFF8);
        for index in 0..512 {
            let at = entry_address(base, index);
            assert_eq!(at % 8, 0);
            assert!(at >= base && at < base + 4096);
        }
    }

    #[test]
    fn table_base_strips_flags_and_high_bits() {
        let entry = 0xFFF0_0000_1234_5FFF_u64;
        assert_eq!(table_base(entry), 0x0000_0000_1234_5000);
        // The per-structure aliases all name the same bits 51:12 field.
        assert_eq!(entry & pml4e::PDPT_ADDRESS_MASK, 0x0000_0000_1234_5000);
        assert_eq!(entry & pdpte::PD_ADDRESS_MASK, 0x0000_0000_1234_5000);
        assert_eq!(entry & pde::PT_ADDRESS_MASK, 0x0000_0000_1234_5000);
    }

    #[test]
    fn large_page_detection() {
        assert!(pdpte::is_large_page(pdpte::PRESENT | pdpte::PS));
        assert!(!pdpte::is_large_page(pdpte::PRESENT));
        assert!(pde::is_large_page(pde::PS));
        assert!(!pde::is_large_page(pde::PRESENT | pde::RW));
    }

    #[test]
    fn leaf_compose_1g() {
        let entry = 0x4000_0000_u64 | pdpte::PRESENT | pdpte::PS;
        assert_eq!(pdpte::leaf_1g::page_address(entry, 0x1234), 0x4000_1234);
    }

    #[test]
    fn leaf_compose_2m() {
        let entry = 0x0020_0000_u64 | pde::PRESENT | pde::PS;
        assert_eq!(pde::leaf_2m::page_address(entry, 0xABC), 0x0020_0ABC);
    }

    #[test]
    fn leaf_compose_4k() {
        let entry = 0x0000_0010_2000_0000_u64 | pte::PRESENT | pte::DIRTY;
        assert_eq!(
            pte::page_address(entry, 0xFFFF_8000_0000_0ABC),
            0x0000_0010_2000_0ABC
        );
    }

    #[test]
    fn flag_positions_are_shared_across_structures() {
        // Bit 7 is PS in PDPTEs and PDEs but PAT in PTEs; the large-page
        // forms move PAT up to bit 12.
        assert_eq!(pdpte::PS, pde::PS);
        assert_eq!(pdpte::PS, pte::PAT);
        assert_eq!(pdpte::leaf_1g::PAT, 1 << 12);
        assert_eq!(pde::leaf_2m::PAT, 1 << 12);

        // The remaining control bits sit in the same position at every level.
        assert_eq!(pml4e::PRESENT | pdpte::PRESENT | pde::PRESENT | pte::PRESENT, 1);
        for (rw, us, pwt, pcd) in [
            (pml4e::RW, pml4e::US, pml4e::PWT, pml4e::PCD),
            (pdpte::RW, pdpte::US, pdpte::PWT, pdpte::PCD),
            (pde::RW, pde::US, pde::PWT, pde::PCD),
            (pte::RW, pte::US, pte::PWT, pte::PCD),
        ] {
            assert_eq!(rw | us | pwt | pcd, 0b1_1110);
        }
        assert_eq!(pml4e::ACCESSED, pte::ACCESSED);
        assert_eq!(pml4e::RESTART, pte::RESTART);
        assert_eq!(pml4e::XD, pdpte::XD);
        assert_eq!(pde::XD, pte::XD);
        assert_eq!(pte::DIRTY, pde::leaf_2m::DIRTY);
        assert_eq!(pte::GLOBAL, pdpte::leaf_1g::GLOBAL);
        assert_eq!(pte::PKE, pdpte::leaf_1g::PKE);
        assert_eq!(pde::leaf_2m::PKE, 1 << 59);
    }

    #[test]
    fn leaf_masks_cover_their_fields() {
        assert_eq!(pdpte::leaf_1g::PHYS_ADDRESS_MASK, 0x000F_FFFF_C000_0000);
        assert_eq!(pde::leaf_2m::PHYS_ADDRESS_MASK, 0x000F_FFFF_FFE0_0000);
        assert_eq!(pte::PHYS_ADDRESS_MASK, 0x000F_FFFF_FFFF_F000);
        // Large-page masks are the table mask minus the extra offset bits.
        assert_eq!(
            pdpte::leaf_1g::PHYS_ADDRESS_MASK,
            TABLE_BASE_MASK & !va::PAGE_OFFSET_1G_MASK
        );
        assert_eq!(
            pde::leaf_2m::PHYS_ADDRESS_MASK,
            TABLE_BASE_MASK & !va::PAGE_OFFSET_2M_MASK
        );
    }
}
