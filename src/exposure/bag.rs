//! Taxonomy / damage-state bags: the unit of building inventory.

use serde::{Deserialize, Serialize};

use crate::core::types::{sanitize_count, DamageState};

/// Identity of a bag within a cell; bags sharing a key are merged
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BagKey {
    pub schema: String,
    pub taxonomy: String,
    pub damage_state: DamageState,
}

/// Optional descriptive data carried along with a bag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BagMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dwellings: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_cost_per_building: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BagMetadata {
    pub fn is_empty(&self) -> bool {
        *self == BagMetadata::default()
    }

    /// Scale the per-building quantities (dwellings, population)
    fn scaled(&self, factor: f64) -> Self {
        Self {
            dwellings: self.dwellings.map(|d| d * factor),
            population: self.population.map(|p| p * factor),
            ..self.clone()
        }
    }

    /// Absorb another bag's metadata: counts add up, labels keep the first
    fn absorb(&mut self, other: &BagMetadata) {
        self.dwellings = add_optional(self.dwellings, other.dwellings);
        self.population = add_optional(self.population, other.population);
        if self.region.is_none() {
            self.region = other.region.clone();
        }
        if self.replacement_cost_per_building.is_none() {
            self.replacement_cost_per_building = other.replacement_cost_per_building;
        }
        if self.area_id.is_none() {
            self.area_id = other.area_id.clone();
        }
        if self.name.is_none() {
            self.name = other.name.clone();
        }
    }
}

fn add_optional(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, None) => a,
        (None, b) => b,
    }
}

/// A number of buildings of one taxonomy in one damage state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyDamageBag {
    pub schema: String,
    pub taxonomy: String,
    pub damage_state: DamageState,
    pub buildings: f64,
    #[serde(default, flatten)]
    pub metadata: BagMetadata,
}

impl TaxonomyDamageBag {
    /// Create a bag; a non-finite or negative count becomes 0
    pub fn new(
        schema: impl Into<String>,
        taxonomy: impl Into<String>,
        damage_state: DamageState,
        buildings: f64,
    ) -> Self {
        Self {
            schema: schema.into(),
            taxonomy: taxonomy.into(),
            damage_state,
            buildings: sanitize_count(buildings),
            metadata: BagMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: BagMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn key(&self) -> BagKey {
        BagKey {
            schema: self.schema.clone(),
            taxonomy: self.taxonomy.clone(),
            damage_state: self.damage_state,
        }
    }

    /// Derive a bag holding `buildings` of this one's population, relocated
    /// to another schema/taxonomy/state. Dwellings and population follow the
    /// share of buildings that moved.
    pub fn portion(
        &self,
        schema: &str,
        taxonomy: &str,
        damage_state: DamageState,
        buildings: f64,
    ) -> Self {
        let factor = if self.buildings > 0.0 {
            buildings / self.buildings
        } else {
            0.0
        };
        Self {
            schema: schema.to_string(),
            taxonomy: taxonomy.to_string(),
            damage_state,
            buildings: sanitize_count(buildings),
            metadata: self.metadata.scaled(factor),
        }
    }

    /// Same schema and taxonomy, different damage state
    pub fn moved_to(&self, damage_state: DamageState, buildings: f64) -> Self {
        self.portion(&self.schema, &self.taxonomy, damage_state, buildings)
    }

    /// Merge a bag with the same key into this one
    pub fn merge(&mut self, other: &TaxonomyDamageBag) {
        debug_assert_eq!(self.key(), other.key());
        self.buildings += other.buildings;
        self.metadata.absorb(&other.metadata);
    }
}
