//! Wire shapes of the favorites listing and their mapping into core records.
//!
//! Every field is optional on the wire. Only `item.item_id` is required; a record
//! without it is dropped, everything else is defaulted.

use chrono::DateTime;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use tgw_core::{
    domain::ItemId,
    errors::Error,
    snapshot::{Coordinates, PickupWindow, Price, StoreAvailability},
    Result,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BusinessRecord {
    #[serde(default)]
    pub item: WireItem,
    #[serde(default, deserialize_with = "lenient")]
    pub store: Option<WireStore>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub items_available: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub pickup_interval: Option<WireInterval>,
    #[serde(default, deserialize_with = "lenient")]
    pub pickup_location: Option<WireLocation>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireItem {
    #[serde(default)]
    pub item_id: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub price_including_taxes: Option<WirePrice>,
    #[serde(default, deserialize_with = "lenient")]
    pub price: Option<WirePrice>,
    #[serde(default, deserialize_with = "lenient")]
    pub logo_picture: Option<WirePicture>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WirePrice {
    #[serde(default, deserialize_with = "lenient")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub minor_units: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub decimals: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WirePicture {
    #[serde(default, deserialize_with = "lenient")]
    pub current_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireStore {
    #[serde(default, deserialize_with = "lenient")]
    pub store_id: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub store_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub logo_picture: Option<WirePicture>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireInterval {
    #[serde(default, deserialize_with = "lenient")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub end: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireLocation {
    #[serde(default, deserialize_with = "lenient")]
    pub address: Option<WireAddress>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<WireCoordinates>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireAddress {
    #[serde(default, deserialize_with = "lenient")]
    pub address_line: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireCoordinates {
    #[serde(default, deserialize_with = "lenient")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub longitude: Option<f64>,
}

impl BusinessRecord {
    pub fn into_availability(self) -> Result<StoreAvailability> {
        let item_id = self
            .item
            .item_id
            .as_ref()
            .and_then(id_string)
            .ok_or_else(|| Error::MalformedRecord("record has no item.item_id".to_string()))?;

        let store = self.store.unwrap_or_default();
        let display_name = non_blank(self.display_name)
            .or_else(|| non_blank(store.store_name.clone()))
            .unwrap_or_else(|| "?".to_string());

        let items_available = self
            .items_available
            .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0);

        let price = self
            .item
            .price_including_taxes
            .and_then(WirePrice::into_price)
            .or_else(|| self.item.price.and_then(WirePrice::into_price));

        let pickup_window = self.pickup_interval.and_then(|w| {
            let start = DateTime::parse_from_rfc3339(w.start.as_deref()?).ok()?;
            let end = DateTime::parse_from_rfc3339(w.end.as_deref()?).ok()?;
            Some(PickupWindow { start, end })
        });

        let (address, coordinates) = match self.pickup_location {
            Some(loc) => (
                loc.address.and_then(|a| non_blank(a.address_line)),
                loc.location.and_then(|c| {
                    Some(Coordinates {
                        latitude: c.latitude?,
                        longitude: c.longitude?,
                    })
                }),
            ),
            None => (None, None),
        };

        let logo_url = self
            .item
            .logo_picture
            .and_then(|p| non_blank(p.current_url))
            .or_else(|| store.logo_picture.and_then(|p| non_blank(p.current_url)));

        Ok(StoreAvailability {
            item_id: ItemId(item_id),
            display_name,
            items_available,
            price,
            pickup_window,
            store_id: store.store_id.as_ref().and_then(id_string),
            address,
            coordinates,
            logo_url,
        })
    }
}

impl WirePrice {
    fn into_price(self) -> Option<Price> {
        Some(Price {
            minor_units: self.minor_units?,
            decimals: self.decimals.unwrap_or(0),
            code: self.code.unwrap_or_default(),
        })
    }
}

/// Map raw listing entries one by one; a bad entry is logged and skipped.
pub fn map_records(raw: Vec<Value>) -> Vec<StoreAvailability> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(idx, value)| {
            let mapped = serde_json::from_value::<BusinessRecord>(value)
                .map_err(|e| Error::MalformedRecord(e.to_string()))
                .and_then(BusinessRecord::into_availability);
            match mapped {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index = idx, error = %e, "skipping listing entry");
                    None
                }
            }
        })
        .collect()
}

/// Decode an optional field, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(de: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(de)?;
    Ok(serde_json::from_value(raw).ok())
}

/// Ids arrive as strings or bare numbers depending on the endpoint version.
pub(crate) fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_record() -> Value {
        json!({
            "item": {
                "item_id": "123",
                "price_including_taxes": {"code": "EUR", "minor_units": 399, "decimals": 2},
                "logo_picture": {"current_url": "https://img.example/item.png"}
            },
            "store": {
                "store_id": 777,
                "store_name": "Bakery Store",
                "logo_picture": {"current_url": "https://img.example/store.png"}
            },
            "display_name": "Bakery (Magic Bag)",
            "items_available": 3,
            "pickup_interval": {"start": "2024-05-15T14:00:00Z", "end": "2024-05-15T16:00:00Z"},
            "pickup_location": {
                "address": {"address_line": "Main St 1, Berlin"},
                "location": {"latitude": 52.5, "longitude": 13.4}
            },
            "favorite": true
        })
    }

    #[test]
    fn maps_full_record() {
        let out = map_records(vec![full_record()]);
        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.item_id.as_str(), "123");
        assert_eq!(s.display_name, "Bakery (Magic Bag)");
        assert_eq!(s.items_available, 3);
        assert_eq!(s.price.as_ref().unwrap().format_amount(), "3.99");
        assert_eq!(s.price.as_ref().unwrap().code, "EUR");
        assert!(s.pickup_window.is_some());
        assert_eq!(s.store_id.as_deref(), Some("777"));
        assert_eq!(s.address.as_deref(), Some("Main St 1, Berlin"));
        assert_eq!(s.coordinates.unwrap().latitude, 52.5);
        assert_eq!(s.logo_url.as_deref(), Some("https://img.example/item.png"));
    }

    #[test]
    fn sparse_record_gets_defaults() {
        let out = map_records(vec![json!({
            "item": {"item_id": 55, "price": {"minor_units": 250}},
            "store": {"store_name": "Deli", "logo_picture": {"current_url": "https://img.example/s.png"}},
            "pickup_interval": {"start": "not a date", "end": "2024-05-15T16:00:00Z"}
        })]);
        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.item_id.as_str(), "55");
        assert_eq!(s.display_name, "Deli");
        assert_eq!(s.items_available, 0);
        assert_eq!(s.price.as_ref().unwrap().format_amount(), "250");
        assert!(s.pickup_window.is_none());
        assert!(s.address.is_none());
        assert!(s.coordinates.is_none());
        assert_eq!(s.logo_url.as_deref(), Some("https://img.example/s.png"));
    }

    #[test]
    fn entries_without_item_id_are_skipped_not_fatal() {
        let out = map_records(vec![
            json!({"item": {}}),
            json!({"item": {"item_id": ""}, "display_name": "blank id"}),
            json!({"item": "not an object"}),
            json!("not even an object"),
            full_record(),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].item_id.as_str(), "123");
    }

    #[test]
    fn wrongly_typed_optional_fields_fall_back_to_defaults() {
        let out = map_records(vec![json!({
            "item": {
                "item_id": "1",
                "logo_picture": "https://img.example/x.png",
                "price_including_taxes": {"code": "EUR", "minor_units": "cheap"},
                "price": {"code": "EUR", "minor_units": 450, "decimals": 2}
            },
            "store": "Bakery Store",
            "display_name": "Bakery",
            "items_available": "lots",
            "pickup_interval": ["2024-05-15T14:00:00Z"],
            "pickup_location": {
                "address": {"address_line": 12},
                "location": {"latitude": "52.5", "longitude": 13.4}
            }
        })]);

        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.item_id.as_str(), "1");
        assert_eq!(s.display_name, "Bakery");
        assert_eq!(s.items_available, 0);
        assert_eq!(s.price.as_ref().unwrap().format_amount(), "4.50");
        assert!(s.logo_url.is_none());
        assert!(s.store_id.is_none());
        assert!(s.pickup_window.is_none());
        assert!(s.address.is_none());
        assert!(s.coordinates.is_none());
    }

    #[test]
    fn record_with_bad_logo_still_reaches_the_snapshot() {
        let out = map_records(vec![json!({
            "item": {"item_id": "1", "logo_picture": "https://img/x.png"},
            "display_name": "Bakery",
            "items_available": 3
        })]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].items_available, 3);
    }

    #[test]
    fn negative_stock_is_clamped() {
        let out = map_records(vec![json!({"item": {"item_id": "9"}, "items_available": -2})]);
        assert_eq!(out[0].items_available, 0);
    }
}
