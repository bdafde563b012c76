//! VLAN tag allocator

use crate::error::EngineError;
use std::collections::BTreeSet;
use std::ops::Range;

/// Tags handed out to generic networks
pub const VLAN_RANGE: Range<u16> = 2000..4096;

/// Monotonic cursor over [`VLAN_RANGE`]; each tag is issued at most once
/// and tags marked as taken are never issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanAllocator {
    next: u16,
    end: u16,
    taken: BTreeSet<u16>,
}

impl Default for VlanAllocator {
    fn default() -> Self {
        Self::with_range(VLAN_RANGE)
    }
}

impl VlanAllocator {
    /// Allocator over the standard range
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator over a custom range
    #[inline]
    #[must_use]
    pub fn with_range(range: Range<u16>) -> Self {
        Self {
            next: range.start,
            end: range.end,
            taken: BTreeSet::new(),
        }
    }

    /// Mark tags already in use elsewhere; tags outside the range are ignored
    pub fn reserve(&mut self, tags: impl IntoIterator<Item = u16>) {
        let range = self.next..self.end;
        self.taken.extend(tags.into_iter().filter(|tag| range.contains(tag)));
    }

    /// Issue the next free tag
    ///
    /// # Errors
    /// Returns [`EngineError::VlanExhausted`] once the range is used up
    pub fn next_vlan(&mut self) -> Result<u16, EngineError> {
        while self.next < self.end {
            let vlan = self.next;
            self.next += 1;
            if !self.taken.remove(&vlan) {
                return Ok(vlan);
            }
        }
        Err(EngineError::VlanExhausted)
    }

    /// Tags still available
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> u16 {
        let taken = u16::try_from(self.taken.len()).unwrap_or(u16::MAX);
        self.end.saturating_sub(self.next).saturating_sub(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn starts_at_2000() {
        let mut vlans = VlanAllocator::new();
        assert_eq!(vlans.next_vlan().unwrap(), 2000);
        assert_eq!(vlans.next_vlan().unwrap(), 2001);
        assert_eq!(vlans.remaining(), 4096 - 2002);
    }

    #[test]
    fn exhausts_at_4096() {
        let mut vlans = VlanAllocator::new();
        let mut last = 0;
        while let Ok(vlan) = vlans.next_vlan() {
            last = vlan;
        }
        assert_eq!(last, 4095);
        assert!(matches!(vlans.next_vlan(), Err(EngineError::VlanExhausted)));
    }

    #[test]
    fn reserved_tags_are_skipped() {
        let mut vlans = VlanAllocator::new();
        vlans.reserve([100, 2000, 2002]);
        assert_eq!(vlans.remaining(), 4096 - 2000 - 2);
        assert_eq!(vlans.next_vlan().unwrap(), 2001);
        assert_eq!(vlans.next_vlan().unwrap(), 2003);

        vlans.reserve([2001, 2004]);
        assert_eq!(vlans.next_vlan().unwrap(), 2005);
    }

    proptest! {
        #[test]
        fn tags_are_unique_and_in_range(draws in 0usize..3000) {
            let mut vlans = VlanAllocator::new();
            let mut seen = HashSet::new();
            for _ in 0..draws {
                match vlans.next_vlan() {
                    Ok(vlan) => {
                        prop_assert!(VLAN_RANGE.contains(&vlan));
                        prop_assert!(seen.insert(vlan));
                    }
                    Err(_) => prop_assert_eq!(seen.len(), VLAN_RANGE.len()),
                }
            }
        }

        #[test]
        fn reserved_tags_never_issued(reserved in proptest::collection::vec(2000u16..2100, 0..40)) {
            let mut vlans = VlanAllocator::with_range(2000..2100);
            vlans.reserve(reserved.iter().copied());
            while let Ok(vlan) = vlans.next_vlan() {
                prop_assert!(!reserved.contains(&vlan));
            }
        }
    }
}
