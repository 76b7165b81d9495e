//! Read-mostly schema collaborator.
//!
//! Only the queries the statistics engine needs are modelled here: feature lookup by
//! path, domain resolution, and the categorical / multivalent classifications. Loading a
//! schema from its text format is left to callers; the types are `serde` so a JSON copy
//! can be deserialised directly.

use crate::error::{Result, StatsError};
use crate::types::FeaturePath;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaType {
    Bytes,
    Int,
    Float,
    Struct,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    Int {
        min: Option<i64>,
        max: Option<i64>,
        is_categorical: bool,
    },
    Float {
        min: Option<f64>,
        max: Option<f64>,
    },
    String {
        name: Option<String>,
        values: Vec<String>,
    },
    Bool,
    /// Reference to a schema-level [`StringDomain`] by name.
    Global(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StringDomain {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub min: u64,
    pub max: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub feature_type: SchemaType,
    #[serde(default)]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub value_count: Option<ValueCount>,
    /// Fixed shape dimensions, when the feature is a dense tensor.
    #[serde(default)]
    pub shape: Option<Vec<i64>>,
    #[serde(default)]
    pub struct_features: Vec<Feature>,
}

impl Feature {
    pub fn new(name: impl Into<String>, feature_type: SchemaType) -> Self {
        Self {
            name: name.into(),
            feature_type,
            domain: None,
            value_count: None,
            shape: None,
            struct_features: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_value_count(mut self, min: u64, max: u64) -> Self {
        self.value_count = Some(ValueCount { min, max });
        self
    }

    #[must_use]
    pub fn with_shape(mut self, dims: Vec<i64>) -> Self {
        self.shape = Some(dims);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Feature>) -> Self {
        self.struct_features = children;
        self
    }

    fn is_univalent(&self) -> bool {
        let one_dim_of_one = matches!(self.shape.as_deref(), Some([1]));
        let max_one = self.value_count.is_some_and(|vc| vc.max == 1);
        one_dim_of_one || max_one
    }
}

/// Checks if the feature is categorical: any BYTES feature, or an INT feature with a
/// categorical int domain or a bool domain.
#[must_use]
pub fn is_categorical_feature(feature: &Feature) -> bool {
    match feature.feature_type {
        SchemaType::Bytes => true,
        SchemaType::Int => matches!(
            feature.domain,
            Some(Domain::Int { is_categorical: true, .. }) | Some(Domain::Bool)
        ),
        SchemaType::Float | SchemaType::Struct => false,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub features: Vec<Feature>,
    #[serde(default)]
    pub string_domains: Vec<StringDomain>,
}

impl Schema {
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            string_domains: Vec::new(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Look up a feature, descending through STRUCT features for multi-step paths.
    ///
    /// # Errors
    /// [`StatsError::FeatureNotFound`] if any step is missing, [`StatsError::NotAStruct`]
    /// if an intermediate step is not a STRUCT.
    pub fn get_feature(&self, path: &FeaturePath) -> Result<&Feature> {
        let (last, parents) = path
            .steps()
            .split_last()
            .ok_or_else(|| StatsError::FeatureNotFound(path.clone()))?;
        let mut container = &self.features;
        for step in parents {
            let f = look_up(container, step).ok_or_else(|| StatsError::FeatureNotFound(path.clone()))?;
            if f.feature_type != SchemaType::Struct {
                return Err(StatsError::NotAStruct {
                    step: step.clone(),
                    path: path.clone(),
                });
            }
            container = &f.struct_features;
        }
        look_up(container, last).ok_or_else(|| StatsError::FeatureNotFound(path.clone()))
    }

    fn get_feature_mut(&mut self, path: &FeaturePath) -> Result<&mut Feature> {
        let (last, parents) = path
            .steps()
            .split_last()
            .ok_or_else(|| StatsError::FeatureNotFound(path.clone()))?;
        let mut container = &mut self.features;
        for step in parents {
            let f = container
                .iter_mut()
                .find(|f| &f.name == step)
                .ok_or_else(|| StatsError::FeatureNotFound(path.clone()))?;
            if f.feature_type != SchemaType::Struct {
                return Err(StatsError::NotAStruct {
                    step: step.clone(),
                    path: path.clone(),
                });
            }
            container = &mut f.struct_features;
        }
        container
            .iter_mut()
            .find(|f| &f.name == last)
            .ok_or_else(|| StatsError::FeatureNotFound(path.clone()))
    }

    /// The domain of a feature, with references to global string domains resolved.
    pub fn get_domain(&self, path: &FeaturePath) -> Result<Domain> {
        let feature = self.get_feature(path)?;
        match &feature.domain {
            None => Err(StatsError::NoDomain(path.clone())),
            Some(Domain::Global(name)) => self
                .string_domains
                .iter()
                .find(|d| &d.name == name)
                .map(|d| Domain::String {
                    name: Some(d.name.clone()),
                    values: d.values.clone(),
                })
                .ok_or_else(|| StatsError::InvalidDomain {
                    path: path.clone(),
                    reason: format!("unknown global string domain \"{name}\""),
                }),
            Some(d) => Ok(d.clone()),
        }
    }

    /// Replace the domain of a non-STRUCT feature.
    pub fn set_domain(&mut self, path: &FeaturePath, domain: Domain) -> Result<()> {
        if let Domain::Global(name) = &domain
            && !self.string_domains.iter().any(|d| &d.name == name)
        {
            return Err(StatsError::InvalidDomain {
                path: path.clone(),
                reason: format!("invalid global string domain \"{name}\""),
            });
        }
        let feature = self.get_feature_mut(path)?;
        if feature.feature_type == SchemaType::Struct {
            return Err(StatsError::InvalidDomain {
                path: path.clone(),
                reason: "could not set the domain of a STRUCT feature".into(),
            });
        }
        if feature.domain.is_some() {
            warn!("Replacing existing domain of feature \"{path}\".");
        }
        feature.domain = Some(domain);
        Ok(())
    }

    /// All non-STRUCT features with their full paths, depth first.
    #[must_use]
    pub fn leaf_features(&self) -> Vec<(FeaturePath, &Feature)> {
        fn walk<'a>(parent: &FeaturePath, container: &'a [Feature], out: &mut Vec<(FeaturePath, &'a Feature)>) {
            for f in container {
                let path = parent.child(f.name.clone());
                if f.feature_type == SchemaType::Struct {
                    walk(&path, &f.struct_features, out);
                } else {
                    out.push((path, f));
                }
            }
        }
        let mut out = Vec::new();
        walk(&FeaturePath::default(), &self.features, &mut out);
        out
    }

    /// INT features that should be treated as categorical.
    #[must_use]
    pub fn categorical_numeric_features(&self) -> HashSet<FeaturePath> {
        self.leaf_features()
            .into_iter()
            .filter(|(_, f)| f.feature_type == SchemaType::Int && is_categorical_feature(f))
            .map(|(p, _)| p)
            .collect()
    }

    #[must_use]
    pub fn categorical_features(&self) -> HashSet<FeaturePath> {
        self.leaf_features()
            .into_iter()
            .filter(|(_, f)| is_categorical_feature(f))
            .map(|(p, _)| p)
            .collect()
    }

    #[must_use]
    pub fn multivalent_features(&self) -> HashSet<FeaturePath> {
        self.leaf_features()
            .into_iter()
            .filter(|(_, f)| !f.is_univalent())
            .map(|(p, _)| p)
            .collect()
    }
}

fn look_up<'a>(container: &'a [Feature], name: &str) -> Option<&'a Feature> {
    container.iter().find(|f| f.name == name)
}
