//! Damage-state transition records produced by an update.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use super::cell::ExposureCell;
use super::geometry::CellGeometry;
use crate::core::types::DamageState;

/// Buildings of one taxonomy moving between two damage states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub schema: String,
    pub taxonomy: String,
    #[serde(rename = "from_damage_state")]
    pub from_state: DamageState,
    #[serde(rename = "to_damage_state")]
    pub to_state: DamageState,
    #[serde(rename = "n_buildings")]
    pub buildings: f64,
}

type TransitionKey = (String, String, DamageState, DamageState);

impl Transition {
    pub fn new(
        schema: impl Into<String>,
        taxonomy: impl Into<String>,
        from_state: DamageState,
        to_state: DamageState,
        buildings: f64,
    ) -> Self {
        Self {
            schema: schema.into(),
            taxonomy: taxonomy.into(),
            from_state,
            to_state,
            buildings,
        }
    }

    fn key(&self) -> TransitionKey {
        (
            self.schema.clone(),
            self.taxonomy.clone(),
            self.from_state,
            self.to_state,
        )
    }
}

/// All transitions of one exposure cell during one update cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionCell {
    gid: String,
    name: Option<String>,
    geometry: CellGeometry,
    transitions: Vec<Transition>,
}

impl TransitionCell {
    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn geometry(&self) -> &CellGeometry {
        &self.geometry
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn total_buildings(&self) -> f64 {
        self.transitions.iter().map(|t| t.buildings).sum()
    }
}

/// Accumulates transitions, merging duplicates by summing buildings
#[derive(Debug)]
pub struct TransitionCellBuilder {
    gid: String,
    name: Option<String>,
    geometry: CellGeometry,
    transitions: Vec<Transition>,
    index: AHashMap<TransitionKey, usize>,
}

impl TransitionCellBuilder {
    /// Start an empty transition cell mirroring the identity of `cell`
    pub fn for_cell(cell: &ExposureCell) -> Self {
        Self {
            gid: cell.gid().to_string(),
            name: cell.name().map(str::to_string),
            geometry: cell.geometry().clone(),
            transitions: Vec::new(),
            index: AHashMap::new(),
        }
    }

    pub fn add(&mut self, transition: Transition) {
        let key = transition.key();
        match self.index.get(&key) {
            Some(&i) => self.transitions[i].buildings += transition.buildings,
            None => {
                self.index.insert(key, self.transitions.len());
                self.transitions.push(transition);
            }
        }
    }

    pub fn build(self) -> TransitionCell {
        TransitionCell {
            gid: self.gid,
            name: self.name,
            geometry: self.geometry,
            transitions: self.transitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::TaxonomyDamageBag;

    #[test]
    fn test_duplicate_transitions_merge() {
        let cell = ExposureCell::new(
            "7",
            None,
            CellGeometry::point(1.0, 2.0),
            "S",
            vec![TaxonomyDamageBag::new("S", "MUR", 0, 10.0)],
        );
        let mut builder = TransitionCellBuilder::for_cell(&cell);
        builder.add(Transition::new("S", "MUR", 0, 2, 3.0));
        builder.add(Transition::new("S", "MUR", 0, 1, 1.0));
        builder.add(Transition::new("S", "MUR", 0, 2, 2.0));

        let transitions = builder.build();

        assert_eq!(transitions.gid(), "7");
        assert_eq!(transitions.transitions().len(), 2);
        assert_eq!(transitions.transitions()[0].buildings, 5.0);
        assert_eq!(transitions.total_buildings(), 6.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(Transition::new("S", "MUR", 0, 3, 1.5)).unwrap();
        assert_eq!(json["from_damage_state"], 0);
        assert_eq!(json["to_damage_state"], 3);
        assert_eq!(json["n_buildings"], 1.5);
    }
}
