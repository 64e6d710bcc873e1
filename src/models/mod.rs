pub mod criteria;

use serde::{Deserialize, Serialize};

pub use criteria::{FilterCriteria, FilterPatch, Patch, SortKey, SortOrder};

/// Reference to the complex a listing belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Reference to a category a listing is filed under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single dwelling unit as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub rooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    /// Living area in square meters
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub complex: Option<ComplexRef>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    /// Absolute media URLs once the listing has passed through the client
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// A residential complex containing several listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Complex {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Listing category. Categories flagged `show_on_home` form the curated
/// sections of the landing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub show_on_home: bool,
}

/// A curated landing page section: one category with its visible listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CuratedSection {
    pub category: Category,
    pub listings: Vec<ListingSummary>,
}

/// Items carrying a publish flag
pub trait Publishable {
    fn is_published(&self) -> bool;
}

impl Publishable for ListingSummary {
    fn is_published(&self) -> bool {
        self.published == Some(true)
    }
}

impl Publishable for Complex {
    fn is_published(&self) -> bool {
        self.published == Some(true)
    }
}

/// Applies the publish visibility rule: anonymous callers only see items
/// explicitly published, authenticated callers see everything.
pub fn visible<T: Publishable>(items: Vec<T>, authenticated: bool) -> Vec<T> {
    if authenticated {
        return items;
    }
    items.into_iter().filter(Publishable::is_published).collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::ListingSummary;

    pub(crate) fn listing(id: &str, published: Option<bool>) -> ListingSummary {
        ListingSummary {
            id: id.to_string(),
            title: format!("Flat {id}"),
            price: Some(100_000.0),
            rooms: Some(2),
            bathrooms: Some(1),
            area: Some(54.0),
            address: None,
            complex: None,
            categories: vec![],
            images: vec![],
            published,
        }
    }
}
