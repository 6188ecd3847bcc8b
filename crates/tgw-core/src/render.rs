//! Per-channel message bodies for a batch of changed stores.
//!
//! Console and desktop get plain text, the chat bot gets Telegram HTML with one
//! message per store. Missing optional fields render as placeholders; a sparse
//! record never fails the batch.

use chrono::{DateTime, Local, TimeZone};

use crate::{
    formatting::{calendar_time, escape_html},
    snapshot::StoreAvailability,
};

pub const SHARE_BASE_URL: &str = "https://share.toogoodtogo.com/item/";
pub const MAPS_BASE_URL: &str = "https://www.google.com/maps/search/?api=1&query=";
pub const DESKTOP_TITLE: &str = "TooGoodToGo";

const PLACEHOLDER: &str = "?";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Console,
    Desktop,
    Chat,
}

/// Render `stores` for `channel` relative to the local clock.
pub fn render(stores: &[StoreAvailability], channel: Channel) -> Vec<String> {
    render_at(stores, channel, &Local::now())
}

/// Console: exactly one block (a status line when `stores` is empty).
/// Desktop: one summary, or nothing for an empty batch.
/// Chat: one HTML message per store.
pub fn render_at<Tz: TimeZone>(
    stores: &[StoreAvailability],
    channel: Channel,
    now: &DateTime<Tz>,
) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    match channel {
        Channel::Console => vec![console_block(stores, now)],
        Channel::Desktop if stores.is_empty() => Vec::new(),
        Channel::Desktop => vec![desktop_summary(stores, now)],
        Channel::Chat => stores.iter().map(|s| chat_message(s, now)).collect(),
    }
}

pub fn share_link(store: &StoreAvailability) -> String {
    format!("{SHARE_BASE_URL}{}", store.item_id)
}

pub fn map_link(store: &StoreAvailability) -> Option<String> {
    store
        .coordinates
        .map(|c| format!("{MAPS_BASE_URL}{},{}", c.latitude, c.longitude))
}

/// `Today 14:00 - Today 16:00`, or `?` without a pickup window.
pub fn pickup_interval<Tz: TimeZone>(store: &StoreAvailability, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(window) = store.pickup_window else {
        return PLACEHOLDER.to_string();
    };
    let tz = now.timezone();
    let start = window.start.with_timezone(&tz);
    let end = window.end.with_timezone(&tz);
    format!(
        "{} - {}",
        calendar_time(&start, now),
        calendar_time(&end, now)
    )
}

pub fn price_label(store: &StoreAvailability) -> String {
    match &store.price {
        Some(p) => format!("{} {}", p.format_amount(), p.code),
        None => PLACEHOLDER.to_string(),
    }
}

fn display_name(store: &StoreAvailability) -> &str {
    if store.display_name.trim().is_empty() {
        PLACEHOLDER
    } else {
        &store.display_name
    }
}

fn console_block<Tz: TimeZone>(stores: &[StoreAvailability], now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if stores.is_empty() {
        return format!(
            "[{}] No interesting stock changes.",
            now.format("%Y-%m-%d %H:%M:%S")
        );
    }
    stores
        .iter()
        .map(|s| plain_entry(s, now))
        .collect::<Vec<_>>()
        .join("\n")
}

fn plain_entry<Tz: TimeZone>(store: &StoreAvailability, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let address = store.address.as_deref().unwrap_or(PLACEHOLDER);
    let location = match map_link(store) {
        Some(link) => format!("{address} ({link})"),
        None => address.to_string(),
    };
    format!(
        "🍽 {name}\n🥡 {count}\n⏰ {interval}\n💰 {price}\n📍 {location}\n🆔 {store_id}\n🔗 {share}\n",
        name = display_name(store),
        count = store.items_available,
        interval = pickup_interval(store, now),
        price = price_label(store),
        store_id = store.store_id.as_deref().unwrap_or(PLACEHOLDER),
        share = share_link(store),
    )
}

fn desktop_summary<Tz: TimeZone>(stores: &[StoreAvailability], now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    stores
        .iter()
        .map(|s| {
            format!(
                "{}: {} left ({})",
                display_name(s),
                s.items_available,
                pickup_interval(s, now)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn chat_message<Tz: TimeZone>(store: &StoreAvailability, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let name = escape_html(display_name(store));
    let mut out = format!("🔥{name}🔥\n");

    // Zero-width joiner link: Telegram shows the logo as the link preview.
    if let Some(logo) = store.logo_url.as_deref().filter(|u| !u.is_empty()) {
        out.push_str(&format!("<a href=\"{}\">&#8205;</a>\n", escape_html(logo)));
    }

    out.push_str(&format!(
        "⏰ {}\n🥡 <b>{}</b>\n💰 {}\n",
        escape_html(&pickup_interval(store, now)),
        store.items_available,
        escape_html(&price_label(store)),
    ));
    out.push_str("-----------------------------------\n");
    out.push_str(&format!(
        "<a href=\"{}\">🍽 <b>{name}</b></a>\n",
        escape_html(&share_link(store))
    ));

    let address = escape_html(store.address.as_deref().unwrap_or(PLACEHOLDER));
    match map_link(store) {
        Some(link) => out.push_str(&format!(
            "<a href=\"{}\">📍 <i>{address}</i></a>\n",
            escape_html(&link)
        )),
        None => out.push_str(&format!("📍 <i>{address}</i>\n")),
    }

    out.push_str(&format!(
        "🆔 {}\n",
        escape_html(store.store_id.as_deref().unwrap_or(PLACEHOLDER))
    ));
    out
}
