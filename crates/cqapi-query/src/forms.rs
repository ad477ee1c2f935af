//! Export-form query descriptions.
//!
//! Forms describe a tabular report over a stored cohort (`queryGroup`)
//! rather than a cohort itself. They are root-shaped and never nested.

use serde::{Deserialize, Serialize};

use crate::ast::{ConceptElement, DateRange, QueryNode, QueryType};
use crate::error::{QueryError, QueryResult};
use crate::id::ConqueryId;

/// Granularity of the report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// One row for the whole range.
    Complete,
    /// Per year.
    Years,
    /// Per quarter.
    Quarters,
    /// Per day.
    Days,
}

/// Unit of the relative time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    /// Quarters.
    Quarters,
    /// Days.
    Days,
}

/// Which event of the cohort becomes the index date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexSelector {
    /// First event.
    Earliest,
    /// Last event.
    Latest,
    /// Any event.
    Random,
}

/// Where the index period is placed relative to the windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexPlacement {
    /// In the before window.
    Before,
    /// In neither window.
    Neutral,
    /// In the after window.
    After,
}

macro_rules! wire_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// The wire name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }
    };
}

wire_names!(Resolution { Complete => "COMPLETE", Years => "YEARS", Quarters => "QUARTERS", Days => "DAYS" });
wire_names!(TimeUnit { Quarters => "QUARTERS", Days => "DAYS" });
wire_names!(IndexSelector { Earliest => "EARLIEST", Latest => "LATEST", Random => "RANDOM" });
wire_names!(IndexPlacement { Before => "BEFORE", Neutral => "NEUTRAL", After => "AFTER" });

/// The `timeMode` block of an export form.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeMode {
    /// Fixed calendar window.
    Absolute {
        /// Report window.
        date_range: DateRange,
    },
    /// Window aligned on each entity's own dates.
    EntityDate {
        /// Report window.
        date_range: DateRange,
        /// Passed through as given, e.g. `LOGICAL`.
        date_aggregation_mode: String,
        /// Passed through as given, e.g. `YEAR`.
        alignment_hint: String,
    },
    /// Windows before and after an index event.
    Relative {
        /// Window unit.
        time_unit: TimeUnit,
        /// Units before the index.
        time_count_before: u32,
        /// Units after the index.
        time_count_after: u32,
        /// Index event choice.
        index_selector: IndexSelector,
        /// Index period placement.
        index_placement: IndexPlacement,
    },
}

impl TimeMode {
    /// The `timeMode.value` tag.
    pub fn value(&self) -> &'static str {
        match self {
            TimeMode::Absolute { .. } => "ABSOLUTE",
            TimeMode::EntityDate { .. } => "ENTITY_DATE",
            TimeMode::Relative { .. } => "RELATIVE",
        }
    }
}

/// Unwraps `CONCEPT_QUERY`/`SECONDARY_ID_QUERY` features to their root and
/// rejects any other root-shaped feature.
pub(crate) fn prepare_features(features: Vec<QueryNode>) -> QueryResult<Vec<QueryNode>> {
    features
        .into_iter()
        .map(|feature| match feature.query_type() {
            QueryType::ConceptQuery | QueryType::SecondaryIdQuery => Ok(feature.unwrap_root()),
            other if other.is_query_description() => Err(QueryError::InvalidFeature(other.as_str())),
            _ => Ok(feature),
        })
        .collect()
}

/// `EXPORT_FORM`
#[derive(Debug, Clone, PartialEq)]
pub struct ExportForm {
    query_group: ConqueryId,
    resolution: Vec<Resolution>,
    /// `alsoCreateCoarserSubdivisions`
    pub also_create_coarser_subdivisions: bool,
    time_mode: TimeMode,
    features: Vec<QueryNode>,
    outcomes: Vec<QueryNode>,
}

impl ExportForm {
    /// Creates a form with resolution `COMPLETE`.
    pub fn new(
        query_group: ConqueryId,
        time_mode: TimeMode,
        features: Vec<QueryNode>,
        outcomes: Vec<QueryNode>,
    ) -> QueryResult<Self> {
        Ok(Self {
            query_group,
            resolution: vec![Resolution::Complete],
            also_create_coarser_subdivisions: true,
            time_mode,
            features: prepare_features(features)?,
            outcomes: prepare_features(outcomes)?,
        })
    }

    /// An `ABSOLUTE` form.
    pub fn absolute(
        query_group: ConqueryId,
        features: Vec<QueryNode>,
        date_range: DateRange,
    ) -> QueryResult<Self> {
        Self::new(query_group, TimeMode::Absolute { date_range }, features, Vec::new())
    }

    /// An `ENTITY_DATE` form.
    pub fn entity_date(
        query_group: ConqueryId,
        features: Vec<QueryNode>,
        date_range: DateRange,
        date_aggregation_mode: impl Into<String>,
        alignment_hint: impl Into<String>,
    ) -> QueryResult<Self> {
        let time_mode = TimeMode::EntityDate {
            date_range,
            date_aggregation_mode: date_aggregation_mode.into(),
            alignment_hint: alignment_hint.into(),
        };
        Self::new(query_group, time_mode, features, Vec::new())
    }

    /// A `RELATIVE` form; needs at least one feature or outcome.
    pub fn relative(
        query_group: ConqueryId,
        features: Vec<QueryNode>,
        outcomes: Vec<QueryNode>,
        time_mode: TimeMode,
    ) -> QueryResult<Self> {
        if !matches!(time_mode, TimeMode::Relative { .. }) {
            return Err(QueryError::invalid_field(
                "timeMode",
                format!("expected RELATIVE, found {}", time_mode.value()),
            ));
        }
        if features.is_empty() && outcomes.is_empty() {
            return Err(QueryError::EmptyCollection("features"));
        }
        Self::new(query_group, time_mode, features, outcomes)
    }

    /// Replaces the resolution list.
    pub fn with_resolution(mut self, resolution: Vec<Resolution>) -> Self {
        self.resolution = resolution;
        self
    }

    /// The stored cohort the report runs over.
    pub fn query_group(&self) -> &ConqueryId {
        &self.query_group
    }

    /// Report resolutions.
    pub fn resolution(&self) -> &[Resolution] {
        &self.resolution
    }

    /// Time windowing.
    pub fn time_mode(&self) -> &TimeMode {
        &self.time_mode
    }

    /// Feature nodes (the before-index window for relative forms).
    pub fn features(&self) -> &[QueryNode] {
        &self.features
    }

    /// Outcome nodes (the after-index window for relative forms).
    pub fn outcomes(&self) -> &[QueryNode] {
        &self.outcomes
    }
}

/// `FULL_EXPORT_FORM`
#[derive(Debug, Clone, PartialEq)]
pub struct FullExportForm {
    query_group: ConqueryId,
    /// Export window.
    pub date_range: DateRange,
    tables: Vec<ConceptElement>,
}

impl FullExportForm {
    /// Creates a full export of the given concept tables.
    pub fn new(
        query_group: ConqueryId,
        tables: Vec<ConceptElement>,
        date_range: DateRange,
    ) -> QueryResult<Self> {
        if tables.is_empty() {
            return Err(QueryError::EmptyCollection("tables"));
        }
        Ok(Self {
            query_group,
            date_range,
            tables,
        })
    }

    /// The stored cohort being exported.
    pub fn query_group(&self) -> &ConqueryId {
        &self.query_group
    }

    /// Exported concepts.
    pub fn tables(&self) -> &[ConceptElement] {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ConceptQuery, ConceptTable};

    fn id(s: &str) -> ConqueryId {
        ConqueryId::parse(s).unwrap()
    }

    fn element(concept: &str) -> ConceptElement {
        ConceptElement::new(
            vec![id(concept)],
            vec![ConceptTable::new(id(&format!("{concept}.main")))],
        )
        .unwrap()
    }

    #[test]
    fn test_features_are_unwrapped() {
        let wrapped = QueryNode::ConceptQuery(ConceptQuery::new(element("dataset1.concept2").into()).unwrap());
        let form = ExportForm::absolute(
            id("dataset1.query_id"),
            vec![element("dataset1.concept1").into(), wrapped],
            DateRange::default(),
        )
        .unwrap();
        assert!(form
            .features()
            .iter()
            .all(|f| f.query_type() == QueryType::Concept));
        assert_eq!(form.resolution(), &[Resolution::Complete]);
        assert!(form.also_create_coarser_subdivisions);
    }

    #[test]
    fn test_nested_form_feature_rejected() {
        let inner = ExportForm::absolute(
            id("dataset1.query_id"),
            vec![element("dataset1.concept1").into()],
            DateRange::default(),
        )
        .unwrap();
        let err = ExportForm::absolute(
            id("dataset1.query_id"),
            vec![QueryNode::ExportForm(inner)],
            DateRange::default(),
        )
        .unwrap_err();
        assert_eq!(err, QueryError::InvalidFeature("EXPORT_FORM"));
    }

    #[test]
    fn test_relative_needs_queries() {
        let time_mode = TimeMode::Relative {
            time_unit: TimeUnit::Quarters,
            time_count_before: 1,
            time_count_after: 2,
            index_selector: IndexSelector::Earliest,
            index_placement: IndexPlacement::Before,
        };
        let err = ExportForm::relative(id("dataset1.q"), vec![], vec![], time_mode.clone());
        assert_eq!(err, Err(QueryError::EmptyCollection("features")));

        let form = ExportForm::relative(
            id("dataset1.q"),
            vec![],
            vec![element("dataset1.concept1").into()],
            time_mode,
        )
        .unwrap();
        assert_eq!(form.time_mode().value(), "RELATIVE");
        assert_eq!(form.outcomes().len(), 1);
    }

    #[test]
    fn test_relative_rejects_other_time_mode() {
        let err = ExportForm::relative(
            id("dataset1.q"),
            vec![element("dataset1.concept1").into()],
            vec![],
            TimeMode::Absolute {
                date_range: DateRange::default(),
            },
        );
        assert!(matches!(err, Err(QueryError::InvalidField { field: "timeMode", .. })));
    }

    #[test]
    fn test_full_export_form_collects_ids() {
        let form = FullExportForm::new(
            id("dataset1.query_id"),
            vec![element("dataset1.alter")],
            DateRange::parse(Some("2020-01-01"), Some("2020-12-31")).unwrap(),
        )
        .unwrap();
        let node = QueryNode::FullExportForm(form);
        assert_eq!(node.concept_ids(), vec![id("dataset1.alter")]);
        assert!(node.is_query_description());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Resolution::Quarters.as_str(), "QUARTERS");
        assert_eq!(IndexPlacement::Neutral.as_str(), "NEUTRAL");
    }
}
