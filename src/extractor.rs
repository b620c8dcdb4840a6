//! Flattens one search response page into price rows.
//!
//! Only the fields the exporter reads are modelled. Unknown fields are
//! ignored and absent or `null` leaves decode to their empty value; the
//! result total is the one field a page cannot do without.

use crate::error::Result;
use serde::{Deserialize, Deserializer};

/// One positive-priced observation ready to be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRow {
    pub url: String,
    pub cruise_id: String,
    pub itinerary: String,
    pub stateroom_class: String,
    pub date_label: String,
    pub ship: String,
    pub departure_port: String,
    pub days: String,
    pub ship_code: String,
    pub destination_code: String,
    /// Minor currency units.
    pub price: i64,
}

impl PriceRow {
    /// Values in the order of [`crate::metrics::PRICE_LABELS`].
    pub fn label_values(&self) -> [&str; 10] {
        [
            self.url.as_str(),
            self.cruise_id.as_str(),
            self.itinerary.as_str(),
            self.stateroom_class.as_str(),
            self.date_label.as_str(),
            self.ship.as_str(),
            self.departure_port.as_str(),
            self.days.as_str(),
            self.ship_code.as_str(),
            self.destination_code.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<PriceRow>,
    pub total: i64,
    /// Candidates discarded for a non-positive price.
    pub dropped: u64,
}

impl Page {
    pub fn empty(total: i64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }
}

fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: SearchData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    cruise_search: CruiseSearch,
}

#[derive(Debug, Deserialize)]
struct CruiseSearch {
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default, deserialize_with = "null_default")]
    cruises: Vec<Cruise>,
    total: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cruise {
    #[serde(default, deserialize_with = "null_default")]
    id: String,
    #[serde(default, deserialize_with = "null_default")]
    master_sailing: MasterSailing,
    #[serde(default, deserialize_with = "null_default")]
    sailings: Vec<Sailing>,
}

#[derive(Debug, Default, Deserialize)]
struct MasterSailing {
    #[serde(default, deserialize_with = "null_default")]
    itinerary: MasterItinerary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasterItinerary {
    #[serde(default, deserialize_with = "null_default")]
    ship: Ship,
    #[serde(default, deserialize_with = "null_default")]
    departure_port: Named,
    #[serde(default, deserialize_with = "null_default")]
    destination: Coded,
    #[serde(default, deserialize_with = "null_default")]
    total_nights: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Ship {
    #[serde(default, deserialize_with = "null_default")]
    code: String,
    #[serde(default, deserialize_with = "null_default")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Named {
    #[serde(default, deserialize_with = "null_default")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Coded {
    #[serde(default, deserialize_with = "null_default")]
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sailing {
    #[serde(default, deserialize_with = "null_default")]
    itinerary: Coded,
    #[serde(default, deserialize_with = "null_default")]
    sail_date: String,
    #[serde(default, deserialize_with = "null_default")]
    stateroom_class_pricing: Vec<StateroomPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateroomPrice {
    #[serde(default, deserialize_with = "null_default")]
    price: Price,
    #[serde(default, deserialize_with = "null_default")]
    stateroom_class: StateroomClass,
}

#[derive(Debug, Default, Deserialize)]
struct Price {
    #[serde(default, deserialize_with = "null_default")]
    value: i64,
}

#[derive(Debug, Default, Deserialize)]
struct StateroomClass {
    #[serde(default, deserialize_with = "null_default")]
    id: String,
}

/// Decodes one response body for `url`.
///
/// Every (cruise, sailing, stateroom price) triple is one candidate. Ship,
/// port, destination and length come from the cruise's master sailing, the
/// itinerary code and date from the sailing itself.
pub fn extract(url: &str, body: &[u8]) -> Result<Page> {
    let response: SearchResponse = serde_json::from_slice(body)?;
    let results = response.data.cruise_search.results;

    let mut page = Page::empty(results.total);
    for cruise in &results.cruises {
        let master = &cruise.master_sailing.itinerary;
        let days = master.total_nights.to_string();

        for sailing in &cruise.sailings {
            for stateroom in &sailing.stateroom_class_pricing {
                if stateroom.price.value <= 0 {
                    page.dropped += 1;
                    continue;
                }
                page.rows.push(PriceRow {
                    url: url.to_string(),
                    cruise_id: cruise.id.clone(),
                    itinerary: sailing.itinerary.code.clone(),
                    stateroom_class: stateroom.stateroom_class.id.clone(),
                    date_label: sailing.sail_date.clone(),
                    ship: master.ship.name.clone(),
                    departure_port: master.departure_port.name.clone(),
                    days: days.clone(),
                    ship_code: master.ship.code.clone(),
                    destination_code: master.destination.code.clone(),
                    price: stateroom.price.value,
                });
            }
        }
    }

    Ok(page)
}
