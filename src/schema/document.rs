//! Load schema conversion documents.
//!
//! ```json
//! { "source_schema": "SARA_v1.0", "target_schema": "SUPPASRI2013_v2.0",
//!   "conv_matrix": { "MUR-ADO": { "MUR": 1.0 } } }
//! ```
//!
//! A document whose rows are keyed by damage states (`D0`, `D1`, ...) is a
//! damage-state conversion; if it also names `source_taxonomy` and
//! `target_taxonomy` it only applies to that pair of building classes.
//! Anything else is a building-class conversion. An explicit `kind`
//! (`"building_class"` or `"damage_state"`) overrides the detection.
//!
//! A damage-state document may also nest one matrix per target taxonomy:
//!
//! ```json
//! { "source_schema": "A", "target_schema": "B",
//!   "conv_matrix": { "URM": { "D0": { "D0": 1.0 }, "D1": { "D3": 1.0 } } } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::mapper::{
    BuildingClassSpecificDamageStateMapper, MatrixBuildingClassMapper, MatrixDamageStateMapper,
    SchemaMapper,
};
use super::matrix::ConversionMatrix;
use crate::core::error::{ExposureError, Result};
use crate::core::types::parse_damage_state;

type Rows = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Deserialize)]
struct ConversionDocument {
    source_schema: String,
    target_schema: String,
    #[serde(default)]
    kind: Option<ConversionKind>,
    #[serde(default)]
    source_taxonomy: Option<String>,
    #[serde(default)]
    target_taxonomy: Option<String>,
    conv_matrix: MatrixBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatrixBody {
    Flat(Rows),
    PerClass(BTreeMap<String, Rows>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ConversionKind {
    BuildingClass,
    DamageState,
}

impl ConversionDocument {
    fn kind(&self) -> ConversionKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        let all_states = match &self.conv_matrix {
            MatrixBody::Flat(rows) => !rows.is_empty() && rows_are_states(rows),
            MatrixBody::PerClass(_) => true,
        };
        if all_states {
            ConversionKind::DamageState
        } else {
            ConversionKind::BuildingClass
        }
    }
}

fn rows_are_states(rows: &Rows) -> bool {
    rows.iter().all(|(key, row)| {
        parse_damage_state(key).is_some()
            && row.keys().all(|target| parse_damage_state(target).is_some())
    })
}

/// Collects conversion matrices and assembles a [`SchemaMapper`]
#[derive(Debug, Clone)]
pub struct ConversionLibrary {
    tolerance: f64,
    building_classes: MatrixBuildingClassMapper,
    damage_states: MatrixDamageStateMapper,
    class_damage_states: BuildingClassSpecificDamageStateMapper,
}

impl ConversionLibrary {
    /// `tolerance` bounds how far a row sum may stray from 1.0
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            building_classes: MatrixBuildingClassMapper::new(),
            damage_states: MatrixDamageStateMapper::new(),
            class_damage_states: BuildingClassSpecificDamageStateMapper::new(),
        }
    }

    /// Add one conversion document
    pub fn add_document(&mut self, json: &str) -> Result<()> {
        let doc: ConversionDocument = serde_json::from_str(json)?;
        let kind = doc.kind();
        let class_pair = doc.source_taxonomy.clone().zip(doc.target_taxonomy.clone());

        let rows = match doc.conv_matrix {
            MatrixBody::Flat(rows) => rows,
            MatrixBody::PerClass(classes) => {
                if kind == ConversionKind::BuildingClass || class_pair.is_some() {
                    return Err(ExposureError::InvalidReference(format!(
                        "per-class conversion {} -> {} must be a damage state conversion \
                         without source_taxonomy/target_taxonomy",
                        doc.source_schema, doc.target_schema
                    )));
                }
                return self.add_per_class(&doc.source_schema, &doc.target_schema, classes);
            }
        };

        let matrix =
            ConversionMatrix::new(doc.source_schema, doc.target_schema, rows, self.tolerance)?;

        tracing::debug!(
            "Loaded {:?} conversion {} -> {} with {} rows",
            kind,
            matrix.source_schema(),
            matrix.target_schema(),
            matrix.len()
        );

        match (kind, class_pair) {
            (ConversionKind::BuildingClass, _) => self.building_classes.add(matrix),
            (ConversionKind::DamageState, Some((source, target))) => {
                check_state_keys(&matrix)?;
                self.class_damage_states.add(&source, &target, matrix);
            }
            (ConversionKind::DamageState, None) => {
                check_state_keys(&matrix)?;
                self.damage_states.add(matrix);
            }
        }
        Ok(())
    }

    fn add_per_class(
        &mut self,
        source_schema: &str,
        target_schema: &str,
        classes: BTreeMap<String, Rows>,
    ) -> Result<()> {
        let mut matrices = Vec::with_capacity(classes.len());
        for (taxonomy, rows) in classes {
            let matrix = ConversionMatrix::new(source_schema, target_schema, rows, self.tolerance)?;
            check_state_keys(&matrix)?;
            matrices.push((taxonomy, matrix));
        }

        tracing::debug!(
            "Loaded per-class damage state conversion {} -> {} for {} classes",
            source_schema,
            target_schema,
            matrices.len()
        );

        for (taxonomy, matrix) in matrices {
            self.class_damage_states.add_for_class(&taxonomy, matrix);
        }
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.add_document(&content)
            .map_err(|e| ExposureError::InvalidReference(format!("{}: {}", path.display(), e)))
    }

    /// Assemble the mapper; class-specific damage-state matrices take
    /// precedence over the flat ones when any are present
    pub fn into_mapper(self) -> SchemaMapper {
        if self.class_damage_states.is_empty() {
            return SchemaMapper::new(
                Box::new(self.building_classes),
                Box::new(self.damage_states),
            );
        }

        let specific = self.class_damage_states.with_fallback(self.damage_states);
        SchemaMapper::new(Box::new(self.building_classes), Box::new(specific))
    }
}

fn check_state_keys(matrix: &ConversionMatrix) -> Result<()> {
    match matrix.keys().find(|key| parse_damage_state(key).is_none()) {
        Some(key) => Err(ExposureError::InvalidReference(format!(
            "damage state conversion {} -> {} has bad source state {:?}",
            matrix.source_schema(),
            matrix.target_schema(),
            key
        ))),
        None => Ok(()),
    }
}
