//! Stock change classification between two consecutive snapshots.

use crate::{
    options::MessageFilter,
    snapshot::{Snapshot, StoreAvailability},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    Unchanged,
    IncreasedFromZero,
    Increased,
    DecreasedToZero,
    Decreased,
}

/// Classify one store's stock movement. A store never seen before counts as
/// `previous == 0`, so it comes out as `IncreasedFromZero` (or `Unchanged` at 0).
pub fn classify(current: u32, previous: Option<u32>) -> Verdict {
    let previous = previous.unwrap_or(0);
    if current == previous {
        Verdict::Unchanged
    } else if current == 0 {
        Verdict::DecreasedToZero
    } else if current < previous {
        Verdict::Decreased
    } else if previous == 0 {
        Verdict::IncreasedFromZero
    } else {
        Verdict::Increased
    }
}

impl MessageFilter {
    pub fn allows(&self, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Unchanged => self.show_unchanged,
            Verdict::IncreasedFromZero => self.show_increase_from_zero,
            Verdict::Increased => self.show_increase,
            Verdict::DecreasedToZero => self.show_decrease_to_zero,
            Verdict::Decreased => self.show_decrease,
        }
    }
}

/// Stores from `current` whose change against `previous` passes `filter`,
/// in `current`'s iteration order.
pub fn detect_changes(
    current: &Snapshot,
    previous: &Snapshot,
    filter: &MessageFilter,
) -> Vec<StoreAvailability> {
    current
        .iter()
        .filter(|store| {
            let before = previous.get(&store.item_id).map(|p| p.items_available);
            filter.allows(classify(store.items_available, before))
        })
        .cloned()
        .collect()
}
