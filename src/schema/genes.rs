//! Parameter vector types: the named numeric genes a tuning run searches over.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::ConfigError;

/// Numeric domain of a gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GeneKind {
    /// Whole numbers. Values are rounded after every operator.
    #[default]
    Int,
    /// Real numbers.
    Float,
}

/// A single tunable parameter with its default value and bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSpec {
    /// Parameter name (e.g. "MaxInlineLevel").
    pub name: String,
    /// Integer or real valued.
    #[serde(default)]
    pub kind: GeneKind,
    /// Value used by seed chromosomes.
    pub default: f64,
    /// Lower bound (inclusive).
    pub min: f64,
    /// Upper bound (inclusive).
    pub max: f64,
}

impl GeneSpec {
    /// Integer gene.
    pub fn int(name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            kind: GeneKind::Int,
            default: default as f64,
            min: min as f64,
            max: max as f64,
        }
    }

    /// Real-valued gene.
    pub fn float(name: impl Into<String>, default: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: GeneKind::Float,
            default,
            min,
            max,
        }
    }

    /// Bring a raw operator output back into this gene's domain.
    ///
    /// Integer genes are rounded, every value is clamped into `[min, max]`,
    /// and a NaN falls back to the default. Bounds that do not validate
    /// never panic: `min` wins over `max` and NaN bounds are ignored.
    pub fn normalize(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default;
        }
        let value = match self.kind {
            GeneKind::Int => value.round(),
            GeneKind::Float => value,
        };
        value.min(self.max).max(self.min)
    }

    /// Render a value the way it is passed to the measured program.
    pub fn format_value(&self, value: f64) -> String {
        match self.kind {
            GeneKind::Int => format!("{}", value as i64),
            GeneKind::Float => format!("{value}"),
        }
    }
}

fn default_arg_template() -> String {
    "{name}={value}".to_string()
}

/// The ordered gene layout shared by every vector of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSet {
    /// Genes in evaluation order.
    pub genes: Vec<GeneSpec>,
    /// Template used to render one gene as a command-line argument.
    /// `{name}` and `{value}` are substituted.
    #[serde(default = "default_arg_template")]
    pub arg_template: String,
}

impl Default for GeneSet {
    fn default() -> Self {
        Self::hotspot_inlining()
    }
}

impl GeneSet {
    /// Create a gene set with the plain `name=value` argument template.
    pub fn new(genes: Vec<GeneSpec>) -> Self {
        Self {
            genes,
            arg_template: default_arg_template(),
        }
    }

    /// Set the argument template.
    pub fn with_arg_template(mut self, template: impl Into<String>) -> Self {
        self.arg_template = template.into();
        self
    }

    /// HotSpot inlining flags with the JVM's stock defaults.
    pub fn hotspot_inlining() -> Self {
        Self::new(vec![
            GeneSpec::int("FreqInlineSize", 325, 1, 10_000),
            GeneSpec::int("InlineSmallCode", 1000, 1, 50_000),
            GeneSpec::int("MaxInlineLevel", 9, 0, 100),
            GeneSpec::int("MaxInlineSize", 35, 1, 10_000),
            GeneSpec::int("MaxRecursiveInlineLevel", 1, 0, 100),
            GeneSpec::int("MinInliningThreshold", 250, 0, 100_000),
        ])
        .with_arg_template("-XX:{name}={value}")
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Position of a gene by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.genes.iter().position(|g| g.name == name)
    }

    /// The seed vector built from every gene's default.
    pub fn defaults(self: &Arc<Self>) -> ParameterVector {
        let values = self.genes.iter().map(|g| g.default).collect();
        ParameterVector::from_raw(Arc::clone(self), values)
    }

    /// Build a vector from explicit values (normalized into each gene's domain).
    pub fn vector(self: &Arc<Self>, values: Vec<f64>) -> Result<ParameterVector, ConfigError> {
        if values.len() != self.genes.len() {
            return Err(ConfigError::GeneArity {
                expected: self.genes.len(),
                actual: values.len(),
            });
        }
        Ok(ParameterVector::from_raw(Arc::clone(self), values))
    }

    /// Validate names and bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.genes.is_empty() {
            return Err(ConfigError::NoGenes);
        }

        let mut seen = HashSet::new();
        for gene in &self.genes {
            if gene.name.trim().is_empty() {
                return Err(ConfigError::EmptyGeneName);
            }
            if !seen.insert(gene.name.as_str()) {
                return Err(ConfigError::DuplicateGene(gene.name.clone()));
            }
            if !(gene.min.is_finite() && gene.max.is_finite() && gene.default.is_finite()) {
                return Err(ConfigError::InvalidBounds(format!(
                    "{} has non-finite bounds or default",
                    gene.name
                )));
            }
            if gene.min > gene.max {
                return Err(ConfigError::InvalidBounds(format!(
                    "{} min ({}) > max ({})",
                    gene.name, gene.min, gene.max
                )));
            }
            if gene.default < gene.min || gene.default > gene.max {
                return Err(ConfigError::InvalidBounds(format!(
                    "{} default ({}) outside [{}, {}]",
                    gene.name, gene.default, gene.min, gene.max
                )));
            }
        }

        if !self.arg_template.contains("{value}") {
            return Err(ConfigError::InvalidArgTemplate(self.arg_template.clone()));
        }

        Ok(())
    }

    fn render_arg(&self, gene: &GeneSpec, value: f64) -> String {
        self.arg_template
            .replace("{name}", &gene.name)
            .replace("{value}", &gene.format_value(value))
    }
}

/// An ordered set of gene values.
///
/// Vectors are never modified after construction; crossover and mutation
/// always build a new one. All vectors of a run share one [`GeneSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterVector {
    genes: Arc<GeneSet>,
    values: Vec<f64>,
}

impl ParameterVector {
    /// Normalize and wrap raw values. Callers guarantee the arity.
    pub(crate) fn from_raw(genes: Arc<GeneSet>, values: Vec<f64>) -> Self {
        debug_assert_eq!(genes.len(), values.len());
        let values = genes
            .genes
            .iter()
            .zip(values)
            .map(|(spec, v)| spec.normalize(v))
            .collect();
        Self { genes, values }
    }

    /// Shared gene layout.
    pub fn gene_set(&self) -> &Arc<GeneSet> {
        &self.genes
    }

    /// Raw values in gene order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a gene by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.genes.index_of(name).map(|i| self.values[i])
    }

    /// `(spec, value)` pairs in gene order.
    pub fn iter(&self) -> impl Iterator<Item = (&GeneSpec, f64)> {
        self.genes.genes.iter().zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether both vectors use the same gene layout.
    pub fn same_layout(&self, other: &ParameterVector) -> bool {
        Arc::ptr_eq(&self.genes, &other.genes) || self.genes == other.genes
    }

    /// Render as command-line arguments using the gene set's template.
    pub fn to_args(&self) -> Vec<String> {
        self.iter()
            .map(|(spec, value)| self.genes.render_arg(spec, value))
            .collect()
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_args().join(" "))
    }
}

impl Serialize for ParameterVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (spec, value) in self.iter() {
            map.serialize_entry(&spec.name, &value)?;
        }
        map.end()
    }
}
