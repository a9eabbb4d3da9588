//! # Address Vocabulary for x86-64 Paging
//!
//! Zero-cost typed wrappers for the raw `u64` values that flow through a
//! page-table walk: virtual addresses, physical addresses, page-aligned
//! physical bases, and in-page offsets.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address subject to translation. |
//! | [`PhysicalAddress`] | An address in physical memory or MMIO space. |
//! | [`PhysicalPage<S>`] | The page-aligned base of a physical page of size `S`. |
//! | [`PageOffset<S>`] | An offset within a page of size `S`. |
//!
//! The three x86-64 page sizes are marker types implementing [`PageSize`]:
//! [`Size4K`], [`Size2M`], and [`Size1G`]. The marker selects the offset
//! width at compile time, so a 1 GiB base can only be joined with a 1 GiB
//! offset.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use pagewalk_addresses::*;
//! let va = VirtualAddress::new(0xFFFF_8000_4123_4567);
//!
//! // The in-page offset depends on the page size of the final mapping.
//! assert_eq!(va.offset::<Size4K>().as_u64(), 0x567);
//! assert_eq!(va.offset::<Size2M>().as_u64(), 0x3_4567);
//! assert_eq!(va.offset::<Size1G>().as_u64(), 0x123_4567);
//!
//! // Joining a page base with an offset reconstructs a full address.
//! let frame = PhysicalPage::<Size2M>::from_addr(PhysicalAddress::new(0x4020_0000));
//! let pa = frame.join(va.offset::<Size2M>());
//! assert_eq!(pa.as_u64(), 0x4023_4567);
//! ```
//!
//! All helpers are `const fn` and the wrappers are `#[repr(transparent)]`,
//! so nothing here costs anything at runtime.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

use core::fmt;
use core::hash::Hash;
use core::marker::PhantomData;
use core::ops::Add;

/// Sealed trait pattern to restrict [`PageSize`] impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for the supported x86-64 page sizes.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Display + fmt::Debug
{
    /// Page size in bytes (a power of two).
    const SIZE: u64;
    /// `log2(SIZE)`, i.e. the number of low bits used for the offset.
    const SHIFT: u32;

    fn as_str() -> &'static str;
}

/// 4 KiB page (4096 bytes): the base translation granule, mapped by a PTE.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size4K;
impl sealed::Sealed for Size4K {}
impl PageSize for Size4K {
    const SIZE: u64 = 4096;
    const SHIFT: u32 = 12;

    fn as_str() -> &'static str {
        "4K"
    }
}

/// 2 MiB page (`2_097_152` bytes), mapped by a PDE with `PS=1`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size2M;
impl sealed::Sealed for Size2M {}
impl PageSize for Size2M {
    const SIZE: u64 = 2 * 1024 * 1024;
    const SHIFT: u32 = 21;

    fn as_str() -> &'static str {
        "2M"
    }
}

/// 1 GiB page (`1_073_741_824` bytes), mapped by a PDPTE with `PS=1`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size1G;
impl sealed::Sealed for Size1G {}
impl PageSize for Size1G {
    const SIZE: u64 = 1024 * 1024 * 1024;
    const SHIFT: u32 = 30;

    fn as_str() -> &'static str {
        "1G"
    }
}

impl fmt::Display for Size4K {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Display for Size2M {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Display for Size1G {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Debug for Size4K {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Debug for Size2M {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Debug for Size1G {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Virtual memory address.
///
/// Carries the *kind* of address at the type level so virtual and physical
/// values cannot be mixed up. Canonicality is **not** validated; the walk
/// derives its table indices from bits 47:12 regardless of the upper bits.
///
/// ### Examples
/// ```rust
/// # use pagewalk_addresses::*;
/// let va = VirtualAddress::new(0xFFFF_FFFF_8000_1234);
/// assert_eq!(va.offset::<Size4K>().as_u64(), 0x234);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The offset within the page of size `S` that contains this address.
    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> PageOffset<S> {
        PageOffset::from_raw(self.0)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<VirtualAddress> for u64 {
    #[inline]
    fn from(a: VirtualAddress) -> Self {
        a.as_u64()
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// Physical memory address.
///
/// The output side of a translation, and the address space the injected
/// read capability operates on. Page-table entries store page-aligned
/// physical bases; use [`PhysicalAddress::page`] to reason about base vs.
/// offset explicitly.
///
/// ### Examples
/// ```rust
/// # use pagewalk_addresses::*;
/// let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
/// let page = pa.page::<Size4K>();
/// assert_eq!(page.base().as_u64(), 0x0000_0010_2000_0000);
/// assert_eq!(page.join(pa.offset::<Size4K>()), pa);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The page of size `S` that contains this address (low bits zeroed).
    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> PhysicalPage<S> {
        PhysicalPage::from_addr(self)
    }

    /// The offset within the page of size `S` that contains this address.
    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> PageOffset<S> {
        PageOffset::from_raw(self.0)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(a: PhysicalAddress) -> Self {
        a.as_u64()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// A physical page base for size `S` (the low `S::SHIFT` bits are zero).
///
/// ### Examples
/// ```rust
/// # use pagewalk_addresses::*;
/// let base = PhysicalPage::<Size1G>::from_addr(PhysicalAddress::new(0x4000_0000));
/// let off = VirtualAddress::new(0x1234).offset::<Size1G>();
/// assert_eq!(base.join(off).as_u64(), 0x4000_1234);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize> {
    value: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> PhysicalPage<S> {
    /// Create from an address, aligning down to the page boundary.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: PhysicalAddress) -> Self {
        Self {
            value: addr.as_u64() & !(S::SIZE - 1),
            _phantom: PhantomData,
        }
    }

    /// Return the page base as a [`PhysicalAddress`].
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.value)
    }

    /// Combine the base with an in-page offset to form a full address.
    #[inline]
    #[must_use]
    pub const fn join(self, off: PageOffset<S>) -> PhysicalAddress {
        PhysicalAddress::new(self.value + off.as_u64())
    }
}

impl<S: PageSize> From<PhysicalAddress> for PhysicalPage<S> {
    #[inline]
    fn from(addr: PhysicalAddress) -> Self {
        Self::from_addr(addr)
    }
}

impl<S: PageSize> From<PhysicalPage<S>> for PhysicalAddress {
    #[inline]
    fn from(page: PhysicalPage<S>) -> Self {
        page.base()
    }
}

impl<S: PageSize> fmt::Display for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/{}", self.value, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage<{}>(0x{:016X})", S::as_str(), self.value)
    }
}

/// The offset within a page of size `S` (`0..S::SIZE`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset<S: PageSize> {
    value: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> PageOffset<S> {
    /// Create from a raw value, asserting it is in range in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        debug_assert!(value < S::SIZE, "offset must be < page size");
        Self::from_raw(value)
    }

    /// Keep only the offset bits of an arbitrary raw address value.
    #[inline]
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self {
            value: value & (S::SIZE - 1),
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.value
    }
}

impl<S: PageSize> fmt::Debug for PageOffset<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset<{}>({:#X})", S::as_str(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_join_4k() {
        let pa = PhysicalAddress::new(0x1234_5678_9ABC_DEF0);
        let (page, off) = (pa.page::<Size4K>(), pa.offset::<Size4K>());
        assert_eq!(page.base().as_u64() & 0xFFF, 0);
        assert_eq!(off.as_u64(), pa.as_u64() & 0xFFF);
        assert_eq!(page.join(off), pa);
    }

    #[test]
    fn offset_and_join_2m() {
        let pa = PhysicalAddress::new(0x0000_0008_1234_5678);
        let (page, off) = (pa.page::<Size2M>(), pa.offset::<Size2M>());
        assert_eq!(page.base().as_u64() & (Size2M::SIZE - 1), 0);
        assert_eq!(off.as_u64(), pa.as_u64() & (Size2M::SIZE - 1));
        assert_eq!(page.join(off), pa);
    }

    #[test]
    fn offset_and_join_1g() {
        let pa = PhysicalAddress::new(0x0000_0004_1234_5678);
        let (page, off) = (pa.page::<Size1G>(), pa.offset::<Size1G>());
        assert_eq!(page.base().as_u64() & (Size1G::SIZE - 1), 0);
        assert_eq!(off.as_u64(), pa.as_u64() & (Size1G::SIZE - 1));
        assert_eq!(page.join(off), pa);
    }

    #[test]
    fn virtual_offsets_track_page_size() {
        let va = VirtualAddress::new(0xFFFF_8000_4123_4567);
        assert_eq!(va.offset::<Size4K>().as_u64(), 0x567);
        assert_eq!(va.offset::<Size2M>().as_u64(), 0x3_4567);
        assert_eq!(va.offset::<Size1G>().as_u64(), 0x123_4567);
    }

    #[test]
    fn page_aligns_down() {
        let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x2345));
        assert_eq!(page.base().as_u64(), 0x2000);
    }

    #[test]
    fn offset_new_masks() {
        let off = PageOffset::<Size4K>::new(0xABC);
        assert_eq!(off.as_u64(), 0xABC);
    }

    #[test]
    fn conversions() {
        let va: VirtualAddress = 0x1000_u64.into();
        assert_eq!(u64::from(va), 0x1000);
        let pa = PhysicalAddress::new(0x2000) + 0x40;
        assert_eq!(pa.as_u64(), 0x2040);
        let page: PhysicalPage<Size4K> = PhysicalAddress::new(0x3456).into();
        assert_eq!(PhysicalAddress::from(page).as_u64(), 0x3000);
    }

    #[test]
    fn display_formats() {
        let va = VirtualAddress::new(0x1000);
        assert_eq!(format!("{va}"), "0x0000000000001000");
        let page = PhysicalPage::<Size2M>::from_addr(PhysicalAddress::new(0x20_0000));
        assert_eq!(format!("{page}"), "0x0000000000200000/2M");
    }
}
