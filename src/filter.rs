use crate::types::{City, CityCatalog, Filters, PropertyType, Purpose, RenderGeneration};

/// Several filter fields changed at once. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    pub city: Option<String>,
    pub purpose: Option<Purpose>,
    pub property_type: Option<PropertyType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    pub generation: RenderGeneration,
    pub boundaries: bool,
    pub stats: bool,
}

/// The user's current selection plus the generation that tags requests made for it.
#[derive(Debug, Clone)]
pub struct FilterState {
    filters: Filters,
    generation: RenderGeneration,
}

impl FilterState {
    pub fn new(filters: Filters) -> Self {
        Self {
            filters,
            generation: RenderGeneration::default(),
        }
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn generation(&self) -> RenderGeneration {
        self.generation
    }

    pub fn set_city(&mut self, catalog: &CityCatalog, name: &str) -> Option<Invalidation> {
        let city: &City = catalog.get(name)?;
        if self.filters.city == *city {
            return None;
        }
        self.filters.city = city.clone();
        Some(self.mint(true))
    }

    pub fn set_purpose(&mut self, purpose: Purpose) -> Option<Invalidation> {
        if self.filters.purpose == purpose {
            return None;
        }
        self.filters.purpose = purpose;
        Some(self.mint(false))
    }

    pub fn set_property_type(&mut self, property_type: PropertyType) -> Option<Invalidation> {
        if self.filters.property_type == property_type {
            return None;
        }
        self.filters.property_type = property_type;
        Some(self.mint(false))
    }

    /// Applies every field of `selection` under a single generation. An unknown
    /// city rejects the whole selection.
    pub fn apply(&mut self, catalog: &CityCatalog, selection: &FilterSelection) -> Option<Invalidation> {
        let city = match &selection.city {
            Some(name) => Some(catalog.get(name)?.clone()),
            None => None,
        };

        let mut next = self.filters.clone();
        if let Some(city) = city {
            next.city = city;
        }
        if let Some(purpose) = selection.purpose {
            next.purpose = purpose;
        }
        if let Some(property_type) = selection.property_type {
            next.property_type = property_type;
        }
        if next == self.filters {
            return None;
        }

        let boundaries = next.city != self.filters.city;
        self.filters = next;
        Some(self.mint(boundaries))
    }

    /// Mints a generation without touching the selection, invalidating everything.
    /// Used when the map is (re)opened.
    pub fn reload(&mut self) -> Invalidation {
        self.mint(true)
    }

    pub fn is_current(&self, generation: RenderGeneration) -> bool {
        self.generation == generation
    }

    fn mint(&mut self, boundaries: bool) -> Invalidation {
        self.generation = self.generation.next();
        Invalidation {
            generation: self.generation,
            boundaries,
            stats: true,
        }
    }
}
