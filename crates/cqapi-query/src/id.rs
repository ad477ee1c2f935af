//! Dotted hierarchical identifiers.
//!
//! Every entity in a Conquery catalog is addressed by a dotted identifier such
//! as `dataset1.icd.kh_diagnose_icd_code.fallzahl`. The first segment is
//! optionally a dataset name; whether it is one is decided by a
//! [`DatasetRules`] value at parse time.
//!
//! | Segments (with dataset) | Role |
//! |-------------------------|------|
//! | `ds` | Dataset |
//! | `ds.concept` | Root concept |
//! | `ds.concept.x` | Child concept or connector |
//! | `ds.concept.x.y...` | Select, filter, date column or deep child |

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{QueryError, QueryResult};

/// Default dataset-name prefixes.
pub const DEFAULT_DATASET_PREFIXES: [&str; 3] = ["adb_", "fdb_", "dataset"];

// =============================================================================
// Dataset rules
// =============================================================================

/// Immutable rule set deciding which leading segments name a dataset.
///
/// A segment is a dataset if it starts with one of the configured prefixes or
/// is listed as a known dataset.
///
/// # Example
///
/// ```rust
/// use cqapi_query::DatasetRules;
///
/// let rules = DatasetRules::builder()
///     .with_known_dataset("demo")
///     .build();
///
/// assert!(rules.is_dataset("demo"));
/// assert!(rules.is_dataset("adb_bosch"));
/// assert!(!rules.is_dataset("icd"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRules {
    prefixes: Vec<String>,
    known: BTreeSet<String>,
}

impl Default for DatasetRules {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_DATASET_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            known: BTreeSet::new(),
        }
    }
}

impl DatasetRules {
    /// Creates a builder seeded with the default prefixes.
    pub fn builder() -> DatasetRulesBuilder {
        DatasetRulesBuilder::default()
    }

    /// Returns true if `segment` names a dataset under these rules.
    pub fn is_dataset(&self, segment: &str) -> bool {
        !segment.is_empty()
            && (self.known.contains(segment)
                || self.prefixes.iter().any(|p| segment.starts_with(p.as_str())))
    }

    /// Configured prefixes.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

/// Builder for [`DatasetRules`].
#[derive(Debug, Clone)]
pub struct DatasetRulesBuilder {
    prefixes: Vec<String>,
    known: BTreeSet<String>,
}

impl Default for DatasetRulesBuilder {
    fn default() -> Self {
        let rules = DatasetRules::default();
        Self {
            prefixes: rules.prefixes,
            known: rules.known,
        }
    }
}

impl DatasetRulesBuilder {
    /// Adds a dataset-name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Drops the default prefixes, keeping only those added afterwards.
    pub fn without_default_prefixes(mut self) -> Self {
        self.prefixes.clear();
        self
    }

    /// Registers an exact dataset name.
    pub fn with_known_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.known.insert(dataset.into());
        self
    }

    /// Registers several exact dataset names.
    pub fn with_known_datasets<I, S>(mut self, datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.extend(datasets.into_iter().map(Into::into));
        self
    }

    /// Builds the rule set.
    pub fn build(self) -> DatasetRules {
        DatasetRules {
            prefixes: self.prefixes,
            known: self.known,
        }
    }
}

// =============================================================================
// Identifier
// =============================================================================

/// Role of an identifier, derived from its depth below the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdRole {
    /// Only a dataset segment.
    Dataset,
    /// A root concept.
    Concept,
    /// A first-level child concept or a connector (table).
    ChildOrConnector,
    /// A select, filter, date column, or deeper child concept.
    Leaf,
}

/// A dotted hierarchical identifier.
///
/// Identifiers are plain values: changing the dataset returns a new
/// identifier and never touches the original.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConqueryId {
    segments: Vec<String>,
    has_dataset: bool,
}

impl ConqueryId {
    /// Parses a dotted identifier using [`DatasetRules::default`].
    pub fn parse(id: &str) -> QueryResult<Self> {
        Self::parse_with(id, &DatasetRules::default())
    }

    /// Parses a dotted identifier using the given dataset rules.
    ///
    /// Fails on an empty string or an empty segment (`"a..b"`).
    pub fn parse_with(id: &str, rules: &DatasetRules) -> QueryResult<Self> {
        if id.is_empty() {
            return Err(QueryError::InvalidIdentifier(id.to_string()));
        }
        let segments: Vec<String> = id.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(QueryError::InvalidIdentifier(id.to_string()));
        }
        let has_dataset = rules.is_dataset(&segments[0]);
        Ok(Self {
            segments,
            has_dataset,
        })
    }

    /// All segments, including the dataset segment if present.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments, including the dataset segment if present.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if the first segment is a dataset.
    pub fn has_dataset_prefix(&self) -> bool {
        self.has_dataset
    }

    /// The dataset segment, if present.
    pub fn dataset(&self) -> Option<&str> {
        if self.has_dataset {
            self.segments.first().map(String::as_str)
        } else {
            None
        }
    }

    /// Segments below the dataset.
    pub fn path(&self) -> &[String] {
        if self.has_dataset {
            &self.segments[1..]
        } else {
            &self.segments
        }
    }

    /// The last segment.
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Role of this identifier derived from its depth below the dataset.
    pub fn role(&self) -> IdRole {
        match self.path().len() {
            0 => IdRole::Dataset,
            1 => IdRole::Concept,
            2 => IdRole::ChildOrConnector,
            _ => IdRole::Leaf,
        }
    }

    /// Returns a copy with `new_dataset` substituted for (or prepended as) the
    /// dataset segment.
    pub fn with_dataset(&self, new_dataset: &str, rules: &DatasetRules) -> QueryResult<Self> {
        if new_dataset.contains('.') || !rules.is_dataset(new_dataset) {
            return Err(QueryError::InvalidDataset(new_dataset.to_string()));
        }
        let mut segments = Vec::with_capacity(self.path().len() + 1);
        segments.push(new_dataset.to_string());
        segments.extend(self.path().iter().cloned());
        Ok(Self {
            segments,
            has_dataset: true,
        })
    }

    /// Returns a copy without the dataset segment.
    pub fn without_dataset(&self) -> Self {
        Self {
            segments: self.path().to_vec(),
            has_dataset: false,
        }
    }

    /// The root concept: the dataset segment (if present) plus the next one.
    pub fn root_concept_id(&self) -> QueryResult<Self> {
        self.prefix_below_dataset(1)
    }

    /// The connector: the dataset segment (if present) plus the next two.
    pub fn connector_id(&self) -> QueryResult<Self> {
        self.prefix_below_dataset(2)
    }

    /// The identifier one level up, or `None` for a single segment.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            has_dataset: self.has_dataset,
        })
    }

    /// Depth-tolerant equality.
    ///
    /// With `allow_depth_diff`, both identifiers are compared below their
    /// dataset segment, so a dataset-stripped id equals its prefixed form and
    /// ids from two datasets compare equal. Without it, segments must match
    /// exactly.
    pub fn same_id(&self, other: &ConqueryId, allow_depth_diff: bool) -> bool {
        if !allow_depth_diff {
            return self.segments == other.segments;
        }
        let (a, b) = (self.path(), other.path());
        a.len() == b.len() && a.iter().rev().zip(b.iter().rev()).all(|(x, y)| x == y)
    }

    /// Returns true if any id in `ids` is the [`same_id`](Self::same_id).
    pub fn in_id_list<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a ConqueryId>,
    {
        ids.into_iter().any(|other| self.same_id(other, true))
    }

    fn prefix_below_dataset(&self, levels: usize) -> QueryResult<Self> {
        if self.path().len() < levels {
            return Err(QueryError::MissingRootConcept(self.to_string()));
        }
        let offset = usize::from(self.has_dataset);
        Ok(Self {
            segments: self.segments[..offset + levels].to_vec(),
            has_dataset: self.has_dataset,
        })
    }
}

impl fmt::Display for ConqueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for ConqueryId {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ConqueryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConqueryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ConqueryId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
