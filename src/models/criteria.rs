use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

/// Sort key understood by the search endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Price,
    Rooms,
    Area,
    Location,
}

impl SortKey {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "price" => Some(Self::Price),
            "rooms" => Some(Self::Rooms),
            "area" => Some(Self::Area),
            "location" => Some(Self::Location),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// The user's current search intent.
///
/// Every field is optional and absent by default. Absent fields are never
/// serialized, so the JSON sent to `POST /search` carries exactly the keys
/// that were set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Free-text query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    /// Whether the unit is sold with interior finishing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schools: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shops: Option<bool>,
    /// Category identifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl FilterCriteria {
    /// Criteria a fresh search view starts from: sorted by ascending price,
    /// nothing else set.
    pub fn baseline() -> Self {
        Self {
            sort_by: Some(SortKey::Price),
            sort_order: Some(SortOrder::Asc),
            ..Self::default()
        }
    }

    /// Merges `patch` into these criteria.
    pub fn merge(&mut self, patch: FilterPatch) {
        let FilterPatch {
            query,
            min_price,
            max_price,
            rooms,
            bathrooms,
            decoration,
            complex_id,
            parks,
            schools,
            shops,
            categories,
            sort_by,
            sort_order,
        } = patch;

        query.apply(&mut self.query);
        min_price.apply(&mut self.min_price);
        max_price.apply(&mut self.max_price);
        rooms.apply(&mut self.rooms);
        bathrooms.apply(&mut self.bathrooms);
        decoration.apply(&mut self.decoration);
        complex_id.apply(&mut self.complex_id);
        parks.apply(&mut self.parks);
        schools.apply(&mut self.schools);
        shops.apply(&mut self.shops);
        categories.apply(&mut self.categories);
        sort_by.apply(&mut self.sort_by);
        sort_order.apply(&mut self.sort_order);

        // NaN and infinities would serialize as null
        self.min_price = self.min_price.filter(|v| v.is_finite());
        self.max_price = self.max_price.filter(|v| v.is_finite());
    }

    /// Query object sent to the search endpoint.
    pub fn to_query(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            _ => Map::new(),
        }
    }

    /// Returns `true` when nothing besides sorting narrows the search.
    pub fn is_unfiltered(&self) -> bool {
        Self {
            sort_by: None,
            sort_order: None,
            ..self.clone()
        } == Self::default()
    }
}

/// Change to a single criteria field
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    /// Leave the field as it is
    Keep,
    Set(T),
    /// Remove the field from the criteria
    Clear,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

impl<T> Patch<T> {
    pub fn apply(self, slot: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(v) => *slot = Some(v),
            Self::Clear => *slot = None,
        }
    }
}

/// A partial update of [`FilterCriteria`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub query: Patch<String>,
    pub min_price: Patch<f64>,
    pub max_price: Patch<f64>,
    pub rooms: Patch<u32>,
    pub bathrooms: Patch<u32>,
    pub decoration: Patch<bool>,
    pub complex_id: Patch<String>,
    pub parks: Patch<bool>,
    pub schools: Patch<bool>,
    pub shops: Patch<bool>,
    pub categories: Patch<BTreeSet<String>>,
    pub sort_by: Patch<SortKey>,
    pub sort_order: Patch<SortOrder>,
}

impl FilterPatch {
    /// Builds a patch from raw form input keyed by the wire field name.
    ///
    /// Input that does not coerce to the field's type clears the field
    /// instead of failing. Unknown field names are skipped.
    pub fn from_form<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut patch = Self::default();
        for (name, raw) in pairs {
            if !patch.set_raw(name, raw) {
                warn!("Ignoring unknown filter field '{}'", name);
            }
        }
        patch
    }

    /// Coerces `raw` into the field called `name`. Returns `false` if no
    /// such field exists.
    pub fn set_raw(&mut self, name: &str, raw: &str) -> bool {
        match name {
            "query" => self.query = parse_text(raw).into(),
            "minPrice" => self.min_price = parse_number(raw).into(),
            "maxPrice" => self.max_price = parse_number(raw).into(),
            "rooms" => self.rooms = parse_count(raw).into(),
            "bathrooms" => self.bathrooms = parse_count(raw).into(),
            "decoration" => self.decoration = parse_flag(raw).into(),
            "complexId" => self.complex_id = parse_text(raw).into(),
            "parks" => self.parks = parse_flag(raw).into(),
            "schools" => self.schools = parse_flag(raw).into(),
            "shops" => self.shops = parse_flag(raw).into(),
            "categories" => self.categories = parse_set(raw).into(),
            "sortBy" => self.sort_by = SortKey::parse(raw).into(),
            "sortOrder" => self.sort_order = SortOrder::parse(raw).into(),
            _ => return false,
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn parse_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// TODO: confirm with product whether malformed numbers should be reported
// to the user rather than dropping the filter.
fn parse_number(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn parse_count(raw: &str) -> Option<u32> {
    let value = parse_number(raw)?;
    (value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX)).then(|| value as u32)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn parse_set(raw: &str) -> Option<BTreeSet<String>> {
    let ids: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    (!ids.is_empty()).then_some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_criteria_serialize_to_empty_query() {
        assert!(FilterCriteria::default().to_query().is_empty());
    }

    #[test]
    fn query_contains_exactly_the_set_fields() {
        let mut criteria = FilterCriteria::default();
        criteria.merge(FilterPatch {
            min_price: Patch::Set(1_000_000.0),
            parks: Patch::Set(false),
            complex_id: Patch::Set("c7".into()),
            categories: Patch::Set(BTreeSet::from(["k1".to_string()])),
            ..FilterPatch::default()
        });

        let query = criteria.to_query();
        let mut keys: Vec<&str> = query.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["categories", "complexId", "minPrice", "parks"]);
        assert_eq!(query["parks"], Value::Bool(false));
        assert_eq!(query["categories"], serde_json::json!(["k1"]));
    }

    #[test]
    fn baseline_serializes_sorting_only() {
        let query = FilterCriteria::baseline().to_query();
        assert_eq!(query.len(), 2);
        assert_eq!(query["sortBy"], "price");
        assert_eq!(query["sortOrder"], "asc");
        assert!(FilterCriteria::baseline().is_unfiltered());
    }

    #[test]
    fn merge_keeps_untouched_fields_and_clears_explicitly() {
        let mut criteria = FilterCriteria::baseline();
        criteria.merge(FilterPatch {
            rooms: Patch::Set(3),
            query: Patch::Set("river".into()),
            ..FilterPatch::default()
        });
        criteria.merge(FilterPatch {
            query: Patch::Clear,
            ..FilterPatch::default()
        });

        assert_eq!(criteria.rooms, Some(3));
        assert_eq!(criteria.query, None);
        assert_eq!(criteria.sort_by, Some(SortKey::Price));
    }

    #[test]
    fn non_finite_prices_are_dropped() {
        let mut criteria = FilterCriteria::default();
        criteria.merge(FilterPatch {
            min_price: Patch::Set(f64::NAN),
            max_price: Patch::Set(f64::INFINITY),
            ..FilterPatch::default()
        });
        assert!(criteria.to_query().is_empty());
    }

    #[test]
    fn form_input_is_coerced() {
        let patch = FilterPatch::from_form([
            ("minPrice", " 2500000 "),
            ("maxPrice", "NaN"),
            ("rooms", "2.5"),
            ("bathrooms", "1"),
            ("parks", "on"),
            ("categories", "k1, k2,,"),
            ("sortBy", "AREA"),
            ("sortOrder", "sideways"),
            ("colour", "blue"),
        ]);

        assert_eq!(patch.min_price, Patch::Set(2_500_000.0));
        assert_eq!(patch.max_price, Patch::Clear);
        assert_eq!(patch.rooms, Patch::Clear);
        assert_eq!(patch.bathrooms, Patch::Set(1));
        assert_eq!(patch.parks, Patch::Set(true));
        assert_eq!(
            patch.categories,
            Patch::Set(BTreeSet::from(["k1".to_string(), "k2".to_string()]))
        );
        assert_eq!(patch.sort_by, Patch::Set(SortKey::Area));
        assert_eq!(patch.sort_order, Patch::Clear);
        assert_eq!(patch.query, Patch::Keep);
    }

    #[test]
    fn criteria_round_trip_through_json() {
        let raw = r#"{"query":"loft","rooms":2,"sortBy":"rooms","sortOrder":"desc"}"#;
        let criteria: FilterCriteria = serde_json::from_str(raw).unwrap();
        assert_eq!(criteria.sort_order, Some(SortOrder::Desc));
        assert_eq!(serde_json::to_string(&criteria).unwrap(), raw);
    }
}
