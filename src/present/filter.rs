//! Campus / provider scope.

use crate::model::{DeviceCatalogEntry, StationView};

/// The active campus and provider selection. `None` passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub campus_id: Option<String>,
    pub provider_id: Option<String>,
}

fn normalize(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// Exact string match; an empty scope passes all.
fn scope_matches(scope: Option<&str>, value: Option<&str>) -> bool {
    match scope {
        None => true,
        Some(wanted) => value == Some(wanted),
    }
}

impl ScopeFilter {
    /// Empty strings are treated as "all", matching the selector buttons.
    pub fn new(campus_id: Option<&str>, provider_id: Option<&str>) -> Self {
        ScopeFilter {
            campus_id: normalize(campus_id),
            provider_id: normalize(provider_id),
        }
    }

    pub fn all() -> Self {
        ScopeFilter::default()
    }

    pub fn matches_campus(&self, campus_id: Option<&str>) -> bool {
        scope_matches(self.campus_id.as_deref(), campus_id)
    }

    pub fn matches_provider(&self, provider_id: &str) -> bool {
        scope_matches(self.provider_id.as_deref(), Some(provider_id))
    }

    pub fn matches_entry(&self, entry: &DeviceCatalogEntry) -> bool {
        self.matches_campus(entry.campus_id.as_deref()) && self.matches_provider(&entry.provider_id)
    }

    pub fn matches_view(&self, view: &StationView) -> bool {
        self.matches_campus(view.campus_id.as_deref()) && self.matches_provider(&view.provider_id)
    }
}

/// Keeps views whose campus string-equals the scope.
pub fn filter_by_campus(views: Vec<StationView>, campus_scope: Option<&str>) -> Vec<StationView> {
    let scope = normalize(campus_scope);
    views
        .into_iter()
        .filter(|v| scope_matches(scope.as_deref(), v.campus_id.as_deref()))
        .collect()
}

/// Keeps views whose provider string-equals the scope.
pub fn filter_by_provider(views: Vec<StationView>, provider_scope: Option<&str>) -> Vec<StationView> {
    let scope = normalize(provider_scope);
    views
        .into_iter()
        .filter(|v| scope_matches(scope.as_deref(), Some(v.provider_id.as_str())))
        .collect()
}
