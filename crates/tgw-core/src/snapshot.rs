//! Typed store availability records and the per-fetch snapshot.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::domain::ItemId;

#[derive(Clone, Debug, PartialEq)]
pub struct Price {
    pub minor_units: i64,
    pub decimals: u32,
    pub code: String,
}

impl Price {
    /// `minor_units / 10^decimals`, printed with exactly `decimals` places.
    pub fn format_amount(&self) -> String {
        let decimals = self.decimals.min(9);
        if decimals == 0 {
            return self.minor_units.to_string();
        }
        let scale = 10i64.pow(decimals);
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        let scale = scale.unsigned_abs();
        format!(
            "{sign}{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = decimals as usize
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickupWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One favorited store as seen by a single fetch.
///
/// Only `item_id` is mandatory; adapters default everything else so a sparse
/// record still renders.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreAvailability {
    pub item_id: ItemId,
    pub display_name: String,
    pub items_available: u32,
    pub price: Option<Price>,
    pub pickup_window: Option<PickupWindow>,
    pub store_id: Option<String>,
    pub address: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub logo_url: Option<String>,
}

impl StoreAvailability {
    /// Minimal record: everything optional left empty.
    pub fn new(item_id: impl Into<String>, display_name: impl Into<String>, available: u32) -> Self {
        Self {
            item_id: ItemId(item_id.into()),
            display_name: display_name.into(),
            items_available: available,
            price: None,
            pickup_window: None,
            store_id: None,
            address: None,
            coordinates: None,
            logo_url: None,
        }
    }
}

/// Availability keyed by item id, iterated in fetch order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    items: Vec<StoreAvailability>,
    index: HashMap<ItemId, usize>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &ItemId) -> Option<&StoreAvailability> {
        self.index.get(item_id).map(|&i| &self.items[i])
    }

    /// Insert or replace. A replaced record keeps its original position.
    pub fn insert(&mut self, record: StoreAvailability) {
        match self.index.get(&record.item_id) {
            Some(&i) => self.items[i] = record,
            None => {
                self.index.insert(record.item_id.clone(), self.items.len());
                self.items.push(record);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoreAvailability> {
        self.items.iter()
    }
}

impl FromIterator<StoreAvailability> for Snapshot {
    fn from_iter<I: IntoIterator<Item = StoreAvailability>>(iter: I) -> Self {
        let mut snap = Snapshot::new();
        for record in iter {
            snap.insert(record);
        }
        snap
    }
}
