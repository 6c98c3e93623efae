//! Building-class and damage-state remapping between schemas.
//!
//! The two stages are independent capabilities; [`SchemaMapper`] composes
//! them into the cross product applied to whole cells.

use ahash::AHashMap;
use serde::Serialize;

use super::matrix::ConversionMatrix;
use crate::core::error::{ExposureError, Result};
use crate::core::types::{format_damage_state, parse_damage_state, DamageState};
use crate::exposure::ExposureCell;

type SchemaPair = (String, String);

fn schema_pair(source: &str, target: &str) -> SchemaPair {
    (source.to_string(), target.to_string())
}

/// Maps a taxonomy of one schema onto taxonomies of another
pub trait BuildingClassMapper: Send + Sync {
    /// `(target_taxonomy, n_buildings)` shares of `n_buildings`
    fn map_building_class(
        &self,
        taxonomy: &str,
        source_schema: &str,
        target_schema: &str,
        n_buildings: f64,
    ) -> Result<Vec<(String, f64)>>;
}

/// Maps a damage state of one schema onto damage states of another.
///
/// `source_taxonomy`/`target_taxonomy` identify the building class being
/// converted; flat mappers ignore them.
pub trait DamageStateMapper: Send + Sync {
    fn map_damage_state(
        &self,
        source_taxonomy: &str,
        target_taxonomy: &str,
        damage_state: DamageState,
        source_schema: &str,
        target_schema: &str,
        n_buildings: f64,
    ) -> Result<Vec<(DamageState, f64)>>;
}

/// Building-class mapping backed by one conversion matrix per schema pair
#[derive(Debug, Clone, Default)]
pub struct MatrixBuildingClassMapper {
    matrices: AHashMap<SchemaPair, ConversionMatrix>,
}

impl MatrixBuildingClassMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, matrix: ConversionMatrix) {
        let key = schema_pair(matrix.source_schema(), matrix.target_schema());
        self.matrices.insert(key, matrix);
    }

    pub fn with(mut self, matrix: ConversionMatrix) -> Self {
        self.add(matrix);
        self
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

impl BuildingClassMapper for MatrixBuildingClassMapper {
    fn map_building_class(
        &self,
        taxonomy: &str,
        source_schema: &str,
        target_schema: &str,
        n_buildings: f64,
    ) -> Result<Vec<(String, f64)>> {
        if source_schema == target_schema {
            return Ok(vec![(taxonomy.to_string(), n_buildings)]);
        }

        let row = self
            .matrices
            .get(&schema_pair(source_schema, target_schema))
            .and_then(|m| m.row(taxonomy))
            .ok_or_else(|| ExposureError::UnknownTaxonomy {
                schema: source_schema.to_string(),
                taxonomy: taxonomy.to_string(),
            })?;

        Ok(row
            .iter()
            .map(|(target, p)| (target.clone(), p * n_buildings))
            .collect())
    }
}

fn map_state_row(
    matrix: &ConversionMatrix,
    damage_state: DamageState,
    n_buildings: f64,
) -> Option<Result<Vec<(DamageState, f64)>>> {
    let row = matrix.row(&format_damage_state(damage_state))?;
    Some(
        row.iter()
            .map(|(target, p)| {
                parse_damage_state(target)
                    .map(|state| (state, p * n_buildings))
                    .ok_or_else(|| {
                        ExposureError::InvalidReference(format!(
                            "damage state conversion {} -> {} has bad target {:?}",
                            matrix.source_schema(),
                            matrix.target_schema(),
                            target
                        ))
                    })
            })
            .collect(),
    )
}

/// Damage-state mapping shared by all building classes
#[derive(Debug, Clone, Default)]
pub struct MatrixDamageStateMapper {
    matrices: AHashMap<SchemaPair, ConversionMatrix>,
}

impl MatrixDamageStateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, matrix: ConversionMatrix) {
        let key = schema_pair(matrix.source_schema(), matrix.target_schema());
        self.matrices.insert(key, matrix);
    }

    pub fn with(mut self, matrix: ConversionMatrix) -> Self {
        self.add(matrix);
        self
    }

    fn lookup(
        &self,
        damage_state: DamageState,
        source_schema: &str,
        target_schema: &str,
        n_buildings: f64,
    ) -> Option<Result<Vec<(DamageState, f64)>>> {
        let matrix = self
            .matrices
            .get(&schema_pair(source_schema, target_schema))?;
        map_state_row(matrix, damage_state, n_buildings)
    }
}

impl DamageStateMapper for MatrixDamageStateMapper {
    fn map_damage_state(
        &self,
        _source_taxonomy: &str,
        _target_taxonomy: &str,
        damage_state: DamageState,
        source_schema: &str,
        target_schema: &str,
        n_buildings: f64,
    ) -> Result<Vec<(DamageState, f64)>> {
        if source_schema == target_schema {
            return Ok(vec![(damage_state, n_buildings)]);
        }
        self.lookup(damage_state, source_schema, target_schema, n_buildings)
            .unwrap_or_else(|| {
                Err(ExposureError::UnknownDamageState {
                    schema: source_schema.to_string(),
                    damage_state,
                })
            })
    }
}

/// Damage-state mapping that differs per building class.
///
/// A matrix is registered either for a `(source, target)` taxonomy pair or
/// for a target taxonomy alone, always within one schema pair. Lookup tries
/// the pair, then the target class, then the optional flat fallback.
#[derive(Debug, Clone, Default)]
pub struct BuildingClassSpecificDamageStateMapper {
    pairs: AHashMap<(SchemaPair, SchemaPair), ConversionMatrix>,
    classes: AHashMap<(SchemaPair, String), ConversionMatrix>,
    fallback: Option<MatrixDamageStateMapper>,
}

impl BuildingClassSpecificDamageStateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source_taxonomy: &str, target_taxonomy: &str, matrix: ConversionMatrix) {
        let schemas = schema_pair(matrix.source_schema(), matrix.target_schema());
        let classes = schema_pair(source_taxonomy, target_taxonomy);
        self.pairs.insert((schemas, classes), matrix);
    }

    pub fn with(
        mut self,
        source_taxonomy: &str,
        target_taxonomy: &str,
        matrix: ConversionMatrix,
    ) -> Self {
        self.add(source_taxonomy, target_taxonomy, matrix);
        self
    }

    /// Register a matrix for every building class mapped onto `target_taxonomy`
    pub fn add_for_class(&mut self, target_taxonomy: &str, matrix: ConversionMatrix) {
        let schemas = schema_pair(matrix.source_schema(), matrix.target_schema());
        self.classes
            .insert((schemas, target_taxonomy.to_string()), matrix);
    }

    pub fn with_class(mut self, target_taxonomy: &str, matrix: ConversionMatrix) -> Self {
        self.add_for_class(target_taxonomy, matrix);
        self
    }

    pub fn with_fallback(mut self, fallback: MatrixDamageStateMapper) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Number of class-specific matrices
    pub fn len(&self) -> usize {
        self.pairs.len() + self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matrix_for(
        &self,
        source_taxonomy: &str,
        target_taxonomy: &str,
        source_schema: &str,
        target_schema: &str,
    ) -> Option<&ConversionMatrix> {
        let schemas = schema_pair(source_schema, target_schema);
        self.pairs
            .get(&(schemas.clone(), schema_pair(source_taxonomy, target_taxonomy)))
            .or_else(|| self.classes.get(&(schemas, target_taxonomy.to_string())))
    }
}

impl DamageStateMapper for BuildingClassSpecificDamageStateMapper {
    fn map_damage_state(
        &self,
        source_taxonomy: &str,
        target_taxonomy: &str,
        damage_state: DamageState,
        source_schema: &str,
        target_schema: &str,
        n_buildings: f64,
    ) -> Result<Vec<(DamageState, f64)>> {
        if source_schema == target_schema {
            return Ok(vec![(damage_state, n_buildings)]);
        }

        match self.matrix_for(source_taxonomy, target_taxonomy, source_schema, target_schema) {
            Some(matrix) => map_state_row(matrix, damage_state, n_buildings).unwrap_or_else(|| {
                Err(ExposureError::UnknownDamageState {
                    schema: source_schema.to_string(),
                    damage_state,
                })
            }),
            None => match &self.fallback {
                Some(fallback) => fallback.map_damage_state(
                    source_taxonomy,
                    target_taxonomy,
                    damage_state,
                    source_schema,
                    target_schema,
                    n_buildings,
                ),
                None => Err(ExposureError::UnknownTaxonomy {
                    schema: source_schema.to_string(),
                    taxonomy: source_taxonomy.to_string(),
                }),
            },
        }
    }
}

/// One target category of a schema mapping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaMapperResult {
    pub taxonomy: String,
    pub damage_state: DamageState,
    pub n_buildings: f64,
}

/// Composite of a building-class stage and a damage-state stage
pub struct SchemaMapper {
    building_classes: Box<dyn BuildingClassMapper>,
    damage_states: Box<dyn DamageStateMapper>,
}

impl SchemaMapper {
    pub fn new(
        building_classes: Box<dyn BuildingClassMapper>,
        damage_states: Box<dyn DamageStateMapper>,
    ) -> Self {
        Self {
            building_classes,
            damage_states,
        }
    }

    /// Cross product of both stages, scaled to `n_buildings`.
    ///
    /// Zero-share combinations are dropped. Mapping a schema onto itself
    /// returns the input unchanged.
    pub fn map_schema(
        &self,
        source_taxonomy: &str,
        source_damage_state: DamageState,
        source_schema: &str,
        target_schema: &str,
        n_buildings: f64,
    ) -> Result<Vec<SchemaMapperResult>> {
        if source_schema == target_schema {
            return Ok(vec![SchemaMapperResult {
                taxonomy: source_taxonomy.to_string(),
                damage_state: source_damage_state,
                n_buildings,
            }]);
        }

        // Shares per building, scaled once at the end
        let classes = self.building_classes.map_building_class(
            source_taxonomy,
            source_schema,
            target_schema,
            1.0,
        )?;

        let mut results = Vec::new();
        for (target_taxonomy, class_share) in classes {
            if class_share <= 0.0 {
                continue;
            }
            let states = self.damage_states.map_damage_state(
                source_taxonomy,
                &target_taxonomy,
                source_damage_state,
                source_schema,
                target_schema,
                1.0,
            )?;
            for (damage_state, state_share) in states {
                let share = class_share * state_share;
                if share <= 0.0 {
                    continue;
                }
                results.push(SchemaMapperResult {
                    taxonomy: target_taxonomy.clone(),
                    damage_state,
                    n_buildings: share * n_buildings,
                });
            }
        }
        Ok(results)
    }

    /// Map every bag of a cell into `target_schema`, merging the results
    pub fn map_cell(&self, cell: &ExposureCell, target_schema: &str) -> Result<ExposureCell> {
        let mut builder = cell.derive(target_schema);
        for bag in cell.bags() {
            let mapped = self.map_schema(
                &bag.taxonomy,
                bag.damage_state,
                &bag.schema,
                target_schema,
                bag.buildings,
            )?;
            for result in mapped {
                builder.add(bag.portion(
                    target_schema,
                    &result.taxonomy,
                    result.damage_state,
                    result.n_buildings,
                ));
            }
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::{CellGeometry, TaxonomyDamageBag};
    use std::collections::BTreeMap;

    fn matrix(source: &str, target: &str, rows: &[(&str, &[(&str, f64)])]) -> ConversionMatrix {
        let rows: BTreeMap<String, BTreeMap<String, f64>> = rows
            .iter()
            .map(|(key, row)| {
                (
                    key.to_string(),
                    row.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
                )
            })
            .collect();
        ConversionMatrix::new(source, target, rows, 1e-3).unwrap()
    }

    fn mapper() -> SchemaMapper {
        let classes = MatrixBuildingClassMapper::new().with(matrix(
            "A",
            "B",
            &[("MUR", &[("URM", 0.6), ("RM", 0.4)]), ("W", &[("WOOD", 1.0)])],
        ));
        let states = MatrixDamageStateMapper::new().with(matrix(
            "A",
            "B",
            &[
                ("D0", &[("D0", 1.0)]),
                ("D1", &[("D1", 0.5), ("D2", 0.5)]),
                ("D2", &[("D3", 1.0), ("D2", 0.0)]),
            ],
        ));
        SchemaMapper::new(Box::new(classes), Box::new(states))
    }

    #[test]
    fn test_identity_mapping() {
        let result = mapper().map_schema("ANY", 3, "A", "A", 12.5).unwrap();
        assert_eq!(
            result,
            vec![SchemaMapperResult {
                taxonomy: "ANY".into(),
                damage_state: 3,
                n_buildings: 12.5
            }]
        );
    }

    #[test]
    fn test_cross_product() {
        let result = mapper().map_schema("MUR", 1, "A", "B", 100.0).unwrap();

        let total: f64 = result.iter().map(|r| r.n_buildings).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(result.len(), 4);
        let urm_d2 = result
            .iter()
            .find(|r| r.taxonomy == "URM" && r.damage_state == 2)
            .unwrap();
        assert!((urm_d2.n_buildings - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_share_omitted() {
        let result = mapper().map_schema("W", 2, "A", "B", 10.0).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].damage_state, 3);
        assert_eq!(result[0].n_buildings, 10.0);
    }

    #[test]
    fn test_unknown_taxonomy() {
        let result = mapper().map_schema("CR", 0, "A", "B", 1.0);
        assert!(matches!(result, Err(ExposureError::UnknownTaxonomy { .. })));
    }

    #[test]
    fn test_unknown_schema_pair() {
        let result = mapper().map_schema("MUR", 0, "A", "C", 1.0);
        assert!(matches!(result, Err(ExposureError::UnknownTaxonomy { .. })));
    }

    #[test]
    fn test_unknown_damage_state() {
        let result = mapper().map_schema("MUR", 4, "A", "B", 1.0);
        assert!(matches!(result, Err(ExposureError::UnknownDamageState { .. })));
    }

    #[test]
    fn test_class_specific_damage_states() {
        let classes = MatrixBuildingClassMapper::new().with(matrix(
            "A",
            "B",
            &[("MUR", &[("URM", 0.5), ("RM", 0.5)])],
        ));
        let states = BuildingClassSpecificDamageStateMapper::new()
            .with("MUR", "URM", matrix("A", "B", &[("D1", &[("D2", 1.0)])]))
            .with_fallback(MatrixDamageStateMapper::new().with(matrix(
                "A",
                "B",
                &[("D1", &[("D1", 1.0)])],
            )));
        let mapper = SchemaMapper::new(Box::new(classes), Box::new(states));

        let result = mapper.map_schema("MUR", 1, "A", "B", 10.0).unwrap();

        let urm = result.iter().find(|r| r.taxonomy == "URM").unwrap();
        let rm = result.iter().find(|r| r.taxonomy == "RM").unwrap();
        assert_eq!(urm.damage_state, 2);
        assert_eq!(rm.damage_state, 1);
        assert_eq!(urm.n_buildings + rm.n_buildings, 10.0);
    }

    #[test]
    fn test_class_specific_without_fallback() {
        let classes = MatrixBuildingClassMapper::new().with(matrix(
            "A",
            "B",
            &[("MUR", &[("RM", 1.0)])],
        ));
        let states = BuildingClassSpecificDamageStateMapper::new()
            .with("MUR", "URM", matrix("A", "B", &[("D0", &[("D0", 1.0)])]));
        let mapper = SchemaMapper::new(Box::new(classes), Box::new(states));

        let result = mapper.map_schema("MUR", 0, "A", "B", 1.0);
        assert!(matches!(result, Err(ExposureError::UnknownTaxonomy { .. })));
    }

    #[test]
    fn test_target_class_matrix_below_pair_matrix() {
        let classes = MatrixBuildingClassMapper::new().with(matrix(
            "A",
            "B",
            &[("MUR", &[("URM", 0.5), ("RM", 0.5)]), ("W", &[("URM", 1.0)])],
        ));
        let states = BuildingClassSpecificDamageStateMapper::new()
            .with("MUR", "URM", matrix("A", "B", &[("D1", &[("D2", 1.0)])]))
            .with_class("URM", matrix("A", "B", &[("D1", &[("D3", 1.0)])]))
            .with_class("RM", matrix("A", "B", &[("D1", &[("D1", 1.0)])]));
        assert_eq!(states.len(), 3);
        let mapper = SchemaMapper::new(Box::new(classes), Box::new(states));

        let mur = mapper.map_schema("MUR", 1, "A", "B", 10.0).unwrap();
        let urm = mur.iter().find(|r| r.taxonomy == "URM").unwrap();
        let rm = mur.iter().find(|r| r.taxonomy == "RM").unwrap();
        assert_eq!(urm.damage_state, 2);
        assert_eq!(rm.damage_state, 1);

        let wood = mapper.map_schema("W", 1, "A", "B", 4.0).unwrap();
        assert_eq!(
            wood,
            vec![SchemaMapperResult {
                taxonomy: "URM".into(),
                damage_state: 3,
                n_buildings: 4.0
            }]
        );
    }

    #[test]
    fn test_map_cell_merges_and_conserves() {
        let cell = ExposureCell::new(
            "1",
            None,
            CellGeometry::point(0.0, 0.0),
            "A",
            vec![
                TaxonomyDamageBag::new("A", "MUR", 0, 50.0),
                TaxonomyDamageBag::new("A", "MUR", 1, 20.0),
                TaxonomyDamageBag::new("A", "W", 0, 30.0),
            ],
        );

        let mapped = mapper().map_cell(&cell, "B").unwrap();

        assert_eq!(mapped.schema(), "B");
        assert!(mapped.bags().iter().all(|b| b.schema == "B"));
        assert!((mapped.total_buildings() - 100.0).abs() < 1e-9);
        assert!((mapped.bag("URM", 0).unwrap().buildings - 30.0).abs() < 1e-9);
        assert!((mapped.bag("WOOD", 0).unwrap().buildings - 30.0).abs() < 1e-9);
        assert!((mapped.bag("RM", 2).unwrap().buildings - 4.0).abs() < 1e-9);
    }
}
