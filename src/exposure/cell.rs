//! Exposure cells and their accumulate-then-freeze builder.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::Serialize;

use super::bag::{BagKey, TaxonomyDamageBag};
use super::geometry::CellGeometry;
use crate::core::types::Coordinate;

/// A geographic unit holding a building inventory.
///
/// Cells are immutable once built; every update or schema mapping produces
/// a fresh cell through [`ExposureCellBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureCell {
    gid: String,
    name: Option<String>,
    geometry: CellGeometry,
    schema: String,
    bags: Vec<TaxonomyDamageBag>,
}

impl ExposureCell {
    /// Build a cell from loose bags, merging duplicates
    pub fn new(
        gid: impl Into<String>,
        name: Option<String>,
        geometry: CellGeometry,
        schema: impl Into<String>,
        bags: impl IntoIterator<Item = TaxonomyDamageBag>,
    ) -> Self {
        let mut builder = ExposureCellBuilder::new(gid, name, geometry, schema);
        for bag in bags {
            builder.add(bag);
        }
        builder.build()
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn geometry(&self) -> &CellGeometry {
        &self.geometry
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn bags(&self) -> &[TaxonomyDamageBag] {
        &self.bags
    }

    pub fn centroid(&self) -> Option<Coordinate> {
        self.geometry.centroid()
    }

    /// Empty builder carrying this cell's identity and geometry
    pub fn derive(&self, schema: &str) -> ExposureCellBuilder {
        ExposureCellBuilder::new(
            self.gid.clone(),
            self.name.clone(),
            self.geometry.clone(),
            schema,
        )
    }

    pub fn total_buildings(&self) -> f64 {
        self.bags.iter().map(|b| b.buildings).sum()
    }

    pub fn buildings_by_taxonomy(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for bag in &self.bags {
            *totals.entry(bag.taxonomy.clone()).or_insert(0.0) += bag.buildings;
        }
        totals
    }

    /// Look up the bag for a taxonomy and damage state
    pub fn bag(&self, taxonomy: &str, damage_state: u32) -> Option<&TaxonomyDamageBag> {
        self.bags
            .iter()
            .find(|b| b.taxonomy == taxonomy && b.damage_state == damage_state)
    }
}

/// Accumulates bags for a new cell, merging on `(schema, taxonomy, state)`.
///
/// Bag order follows first insertion, so identical inputs give identical
/// cells.
#[derive(Debug)]
pub struct ExposureCellBuilder {
    gid: String,
    name: Option<String>,
    geometry: CellGeometry,
    schema: String,
    bags: Vec<TaxonomyDamageBag>,
    index: AHashMap<BagKey, usize>,
}

impl ExposureCellBuilder {
    pub fn new(
        gid: impl Into<String>,
        name: Option<String>,
        geometry: CellGeometry,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            gid: gid.into(),
            name,
            geometry,
            schema: schema.into(),
            bags: Vec::new(),
            index: AHashMap::new(),
        }
    }

    pub fn add(&mut self, bag: TaxonomyDamageBag) {
        let key = bag.key();
        match self.index.get(&key) {
            Some(&i) => self.bags[i].merge(&bag),
            None => {
                self.index.insert(key, self.bags.len());
                self.bags.push(bag);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    pub fn build(self) -> ExposureCell {
        ExposureCell {
            gid: self.gid,
            name: self.name,
            geometry: self.geometry,
            schema: self.schema,
            bags: self.bags,
        }
    }
}
