//! # Control Register 3
//!
//! CR3 anchors the paging hierarchy: bits 51:12 hold the physical base of
//! the PML4 table, and two bits control the memory type used for accessing
//! it. This is a plain value type; reading the register of a live CPU (or
//! of a guest VCPU) is the caller's business.

use bitfield_struct::bitfield;
use pagewalk_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// The CR3 register value (assuming `CR4.PCIDE = 0`).
///
/// ```rust
/// # use pagewalk::Cr3;
/// let cr3 = Cr3::from_bits(0x0000_0000_0010_1018);
/// assert!(cr3.pwt() && cr3.pcd());
/// assert_eq!(cr3.pml4_phys().as_u64(), 0x10_1000);
/// ```
#[bitfield(u64)]
pub struct Cr3 {
    #[bits(3)]
    reserved0: u8,

    /// Page-level write-through; affects the memory type used to access
    /// the PML4 table during translation.
    pub pwt: bool,

    /// Page-level cache disable; affects the memory type used to access
    /// the PML4 table during translation.
    pub pcd: bool,

    #[bits(7)]
    reserved1: u8,

    /// Physical base of the PML4 table, in units of 4 KiB.
    #[bits(40)]
    pml4_base_4k: u64,

    #[bits(12)]
    reserved2: u16,
}

impl Cr3 {
    /// Build a CR3 value pointing at the PML4 table at `addr`.
    ///
    /// Debug assertions require `addr` to be 4 KiB aligned and below
    /// 2^52.
    #[must_use]
    pub fn from_pml4_phys(addr: PhysicalAddress) -> Self {
        debug_assert_eq!(addr.as_u64() & 0xFFF, 0, "PML4 base must be 4K aligned");
        debug_assert_eq!(addr.as_u64() >> 52, 0, "PML4 base exceeds 52 bits");
        Self::new().with_pml4_base_4k(addr.as_u64() >> 12)
    }

    /// Physical address of the PML4 table.
    #[inline]
    #[must_use]
    pub const fn pml4_phys(self) -> PhysicalAddress {
        PhysicalAddress::new(self.pml4_base_4k() << 12)
    }

    /// The PML4 table as a typed 4 KiB page, the root of a walk.
    #[inline]
    #[must_use]
    pub const fn pml4_table(self) -> PhysicalPage<Size4K> {
        self.pml4_phys().page::<Size4K>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_raw_value() {
        let cr3 = Cr3::from_bits(0x0000_0000_0010_1018);
        assert!(cr3.pwt());
        assert!(cr3.pcd());
        assert_eq!(cr3.pml4_phys(), PhysicalAddress::new(0x10_1000));
        assert_eq!(cr3.pml4_table().base().as_u64(), 0x10_1000);
    }

    #[test]
    fn base_round_trips() {
        let addr = PhysicalAddress::new(0x0000_000A_BCDE_F000);
        let cr3 = Cr3::from_pml4_phys(addr);
        assert_eq!(cr3.pml4_phys(), addr);
        assert!(!cr3.pwt());
        assert!(!cr3.pcd());
    }

    #[test]
    fn cache_bits_choose_their_positions() {
        let cr3 = Cr3::from_pml4_phys(PhysicalAddress::new(0x1000))
            .with_pwt(true)
            .with_pcd(true);
        assert_eq!(
            cr3.into_bits(),
            0x1000 | crate::layout::cr3::PWT | crate::layout::cr3::PCD
        );
        assert_eq!(cr3.into_bits() & crate::layout::cr3::PML4_BASE_MASK, 0x1000);
    }
}
