//! Country lookup for connecting players.
//!
//! Lookups are best effort: a `None` only suppresses the "connected from"
//! announcement.

use std::collections::HashMap;

pub trait GeoLookup: Send + Sync {
    fn country(&self, address: &str) -> Option<String>;
}

/// Lookup that never knows a country
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeo;

impl GeoLookup for NoGeo {
    fn country(&self, _address: &str) -> Option<String> {
        None
    }
}

/// Fixed address to country table
#[derive(Debug, Default, Clone)]
pub struct StaticGeo {
    countries: HashMap<String, String>,
}

impl StaticGeo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, country: &str) -> Self {
        self.countries
            .insert(address.to_string(), country.to_string());
        self
    }
}

impl GeoLookup for StaticGeo {
    fn country(&self, address: &str) -> Option<String> {
        self.countries.get(address).cloned()
    }
}
