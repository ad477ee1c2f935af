//! JSON wire codec for query trees.
//!
//! Encoding omits absent values and empty lists so that a decoded map
//! encodes back to itself. Decoding dispatches on the `"type"` key through a
//! table covering every [`QueryType`].

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ast::{
    format_date, ConceptElement, ConceptQuery, ConceptTable, DateAggregationMode, DateRange,
    DateRestriction, External, FilterClause, Junction, Negation, QueryNode, QueryType, SavedQuery,
    SecondaryIdQuery,
};
use crate::error::{QueryError, QueryResult};
use crate::forms::{
    ExportForm, FullExportForm, IndexPlacement, IndexSelector, Resolution, TimeMode, TimeUnit,
};
use crate::id::{ConqueryId, DatasetRules};

// =============================================================================
// Keys
// =============================================================================

mod keys {
    pub const TYPE: &str = "type";
    pub const LABEL: &str = "label";
    pub const ROW_PREFIX: &str = "row_prefix";
    pub const ID: &str = "id";
    pub const IDS: &str = "ids";
    pub const SELECTS: &str = "selects";
    pub const TABLES: &str = "tables";
    pub const FILTER: &str = "filter";
    pub const FILTERS: &str = "filters";
    pub const DATE_COLUMN: &str = "dateColumn";
    pub const VALUE: &str = "value";
    pub const EXCLUDE_FROM_SECONDARY_ID_QUERY: &str = "excludeFromSecondaryIdQuery";
    pub const EXCLUDE_FROM_SECONDARY_ID: &str = "excludeFromSecondaryId";
    pub const EXCLUDE_FROM_TIME_AGGREGATION: &str = "excludeFromTimeAggregation";
    pub const CHILD: &str = "child";
    pub const CHILDREN: &str = "children";
    pub const ROOT: &str = "root";
    pub const DATE_RANGE: &str = "dateRange";
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";
    pub const CREATE_EXISTS: &str = "createExists";
    pub const CREATE_EXIST_LEGACY: &str = "createExist";
    pub const DATE_ACTION: &str = "dateAction";
    pub const DATE_AGGREGATION_MODE: &str = "dateAggregationMode";
    pub const SECONDARY_ID: &str = "secondaryId";
    pub const QUERY: &str = "query";
    pub const FORMAT: &str = "format";
    pub const VALUES: &str = "values";
    pub const QUERY_GROUP: &str = "queryGroup";
    pub const RESOLUTION: &str = "resolution";
    pub const ALSO_CREATE_COARSER_SUBDIVISIONS: &str = "alsoCreateCoarserSubdivisions";
    pub const TIME_MODE: &str = "timeMode";
    pub const FEATURES: &str = "features";
    pub const OUTCOMES: &str = "outcomes";
    pub const ALIGNMENT_HINT: &str = "alignmentHint";
    pub const TIME_UNIT: &str = "timeUnit";
    pub const TIME_COUNT_BEFORE: &str = "timeCountBefore";
    pub const TIME_COUNT_AFTER: &str = "timeCountAfter";
    pub const INDEX_SELECTOR: &str = "indexSelector";
    pub const INDEX_PLACEMENT: &str = "indexPlacement";
}

// =============================================================================
// Reader
// =============================================================================

/// Typed access to one wire map, reporting errors against its query type.
struct WireReader<'a> {
    query_type: QueryType,
    map: &'a Map<String, Value>,
    rules: &'a DatasetRules,
}

impl<'a> WireReader<'a> {
    fn expect(value: &'a Value, expected: QueryType, rules: &'a DatasetRules) -> QueryResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| QueryError::invalid_field(keys::TYPE, "query must be a JSON object"))?;
        let found = map.get(keys::TYPE).and_then(Value::as_str).unwrap_or_default();
        if found != expected.as_str() {
            return Err(QueryError::QueryTypeMismatch {
                expected: expected.as_str(),
                found: found.to_string(),
            });
        }
        Ok(Self {
            query_type: expected,
            map,
            rules,
        })
    }

    fn nested(&self, key: &'static str) -> QueryResult<Option<WireReader<'a>>> {
        match self.field(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(WireReader {
                query_type: self.query_type,
                map,
                rules: self.rules,
            })),
            Some(other) => Err(unexpected(key, "object", other)),
        }
    }

    fn field(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn missing(&self, field: &'static str) -> QueryError {
        QueryError::MissingField {
            query_type: self.query_type.as_str(),
            field,
        }
    }

    fn string(&self, key: &'static str) -> QueryResult<Option<String>> {
        match self.field(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(unexpected(key, "string", other)),
        }
    }

    fn required_string(&self, key: &'static str) -> QueryResult<String> {
        self.string(key)?.ok_or_else(|| self.missing(key))
    }

    fn bool(&self, key: &'static str) -> QueryResult<Option<bool>> {
        match self.field(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(unexpected(key, "boolean", other)),
        }
    }

    fn count(&self, key: &'static str) -> QueryResult<u32> {
        let value = self.field(key).ok_or_else(|| self.missing(key))?;
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| unexpected(key, "non-negative integer", value))
    }

    fn id(&self, key: &'static str) -> QueryResult<Option<ConqueryId>> {
        self.string(key)?
            .map(|raw| ConqueryId::parse_with(&raw, self.rules))
            .transpose()
    }

    fn required_id(&self, key: &'static str) -> QueryResult<ConqueryId> {
        self.id(key)?.ok_or_else(|| self.missing(key))
    }

    fn array(&self, key: &'static str) -> QueryResult<&'a [Value]> {
        match self.field(key) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(unexpected(key, "array", other)),
        }
    }

    fn id_list(&self, key: &'static str) -> QueryResult<Vec<ConqueryId>> {
        self.array(key)?
            .iter()
            .map(|item| match item {
                Value::String(raw) => ConqueryId::parse_with(raw, self.rules),
                other => Err(unexpected(key, "identifier string", other)),
            })
            .collect()
    }

    fn string_list(&self, key: &'static str) -> QueryResult<Vec<String>> {
        self.array(key)?
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| unexpected(key, "string", item))
            })
            .collect()
    }

    fn node(&self, key: &'static str) -> QueryResult<QueryNode> {
        let value = self.field(key).ok_or_else(|| self.missing(key))?;
        QueryNode::from_wire_with(value, self.rules)
    }

    fn nodes(&self, key: &'static str) -> QueryResult<Vec<QueryNode>> {
        self.array(key)?
            .iter()
            .map(|item| QueryNode::from_wire_with(item, self.rules))
            .collect()
    }

    fn enum_value<T: DeserializeOwned>(&self, key: &'static str) -> QueryResult<Option<T>> {
        self.field(key)
            .map(|value| {
                T::deserialize(value).map_err(|e| QueryError::invalid_field(key, e.to_string()))
            })
            .transpose()
    }

    fn required_enum<T: DeserializeOwned>(&self, key: &'static str) -> QueryResult<T> {
        self.enum_value(key)?.ok_or_else(|| self.missing(key))
    }

    fn date_range(&self, key: &'static str) -> QueryResult<DateRange> {
        match self.nested(key)? {
            None => Ok(DateRange::default()),
            Some(range) => DateRange::parse(
                range.string(keys::MIN)?.as_deref(),
                range.string(keys::MAX)?.as_deref(),
            ),
        }
    }
}

fn unexpected(field: &'static str, expected: &str, found: &Value) -> QueryError {
    QueryError::invalid_field(field, format!("expected {expected}, found {found}"))
}

// =============================================================================
// Writer
// =============================================================================

/// Builds a wire map, skipping absent values and empty lists.
#[derive(Default)]
struct WireWriter {
    map: Map<String, Value>,
}

impl WireWriter {
    fn tagged(query_type: QueryType) -> Self {
        Self::default().value(keys::TYPE, query_type.as_str())
    }

    fn value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.map.insert(key.to_string(), value.into());
        self
    }

    fn opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.value(key, value),
            None => self,
        }
    }

    fn id(self, key: &str, id: &ConqueryId) -> Self {
        self.value(key, id.to_string())
    }

    fn list(self, key: &str, items: Vec<Value>) -> Self {
        if items.is_empty() {
            self
        } else {
            self.value(key, Value::Array(items))
        }
    }

    fn ids(self, key: &str, ids: &[ConqueryId]) -> Self {
        self.list(key, ids.iter().map(|id| Value::from(id.to_string())).collect())
    }

    fn nodes(self, key: &str, nodes: &[QueryNode]) -> Self {
        self.list(key, nodes.iter().map(QueryNode::to_wire).collect())
    }

    fn date_range(self, key: &str, range: &DateRange) -> Self {
        if range.is_empty() {
            return self;
        }
        let inner = WireWriter::default()
            .opt(keys::MIN, range.min.as_ref().map(format_date))
            .opt(keys::MAX, range.max.as_ref().map(format_date));
        self.value(key, inner.finish())
    }

    fn common(self, label: &Option<String>, row_prefix: &Option<String>) -> Self {
        self.opt(keys::LABEL, label.clone())
            .opt(keys::ROW_PREFIX, row_prefix.clone())
    }

    fn finish(self) -> Value {
        Value::Object(self.map)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

type Decoder = fn(&Value, &DatasetRules) -> QueryResult<QueryNode>;

const DECODERS: [(QueryType, Decoder); 11] = [
    (QueryType::Concept, |v, r| ConceptElement::from_wire(v, r).map(QueryNode::Concept)),
    (QueryType::DateRestriction, |v, r| {
        DateRestriction::from_wire(v, r).map(QueryNode::DateRestriction)
    }),
    (QueryType::Negation, |v, r| Negation::from_wire(v, r).map(QueryNode::Negation)),
    (QueryType::And, |v, r| Junction::from_wire(v, QueryType::And, r).map(QueryNode::And)),
    (QueryType::Or, |v, r| Junction::from_wire(v, QueryType::Or, r).map(QueryNode::Or)),
    (QueryType::ConceptQuery, |v, r| {
        ConceptQuery::from_wire(v, r).map(QueryNode::ConceptQuery)
    }),
    (QueryType::SecondaryIdQuery, |v, r| {
        SecondaryIdQuery::from_wire(v, r).map(QueryNode::SecondaryIdQuery)
    }),
    (QueryType::SavedQuery, |v, r| SavedQuery::from_wire(v, r).map(QueryNode::SavedQuery)),
    (QueryType::External, |v, r| External::from_wire(v, r).map(QueryNode::External)),
    (QueryType::ExportForm, |v, r| ExportForm::from_wire(v, r).map(QueryNode::ExportForm)),
    (QueryType::FullExportForm, |v, r| {
        FullExportForm::from_wire(v, r).map(QueryNode::FullExportForm)
    }),
];

impl QueryNode {
    /// Decodes a wire map with the default dataset rules.
    pub fn from_wire(value: &Value) -> QueryResult<Self> {
        Self::from_wire_with(value, &DatasetRules::default())
    }

    /// Decodes a wire map, dispatching on its `"type"` key.
    pub fn from_wire_with(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let tag = value
            .get(keys::TYPE)
            .and_then(Value::as_str)
            .ok_or(QueryError::MissingField {
                query_type: "QUERY",
                field: keys::TYPE,
            })?;
        let query_type = QueryType::from_tag(tag)?;
        let decode = DECODERS
            .iter()
            .find(|(t, _)| *t == query_type)
            .map(|(_, decode)| *decode)
            .ok_or_else(|| QueryError::UnknownQueryType(tag.to_string()))?;
        decode(value, rules)
    }

    /// Encodes the tree into its wire map.
    pub fn to_wire(&self) -> Value {
        match self {
            QueryNode::Concept(n) => n.to_wire(),
            QueryNode::DateRestriction(n) => n.to_wire(),
            QueryNode::Negation(n) => n.to_wire(),
            QueryNode::And(n) => n.to_wire(QueryType::And),
            QueryNode::Or(n) => n.to_wire(QueryType::Or),
            QueryNode::ConceptQuery(n) => n.to_wire(),
            QueryNode::SecondaryIdQuery(n) => n.to_wire(),
            QueryNode::SavedQuery(n) => n.to_wire(),
            QueryNode::External(n) => n.to_wire(),
            QueryNode::ExportForm(n) => n.to_wire(),
            QueryNode::FullExportForm(n) => n.to_wire(),
        }
    }
}

impl Serialize for QueryNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QueryNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        QueryNode::from_wire(&value).map_err(D::Error::custom)
    }
}

// =============================================================================
// Variants
// =============================================================================

impl ConceptTable {
    fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| unexpected(keys::TABLES, "object", value))?;
        let table = WireReader {
            query_type: QueryType::Concept,
            map,
            rules,
        };
        let date_column_id = match table.nested(keys::DATE_COLUMN)? {
            Some(column) => column.id(keys::VALUE)?,
            None => None,
        };
        let filters = table
            .array(keys::FILTERS)?
            .iter()
            .map(|clause| FilterClause::from_wire(clause, rules))
            .collect::<QueryResult<_>>()?;
        Ok(Self {
            connector_id: table.required_id(keys::ID)?,
            date_column_id,
            selects: table.id_list(keys::SELECTS)?,
            filters,
        })
    }

    fn to_wire(&self) -> Value {
        let date_column = self
            .date_column_id
            .as_ref()
            .map(|id| WireWriter::default().id(keys::VALUE, id).finish());
        WireWriter::default()
            .id(keys::ID, &self.connector_id)
            .opt(keys::DATE_COLUMN, date_column)
            .ids(keys::SELECTS, &self.selects)
            .list(keys::FILTERS, self.filters.iter().map(FilterClause::to_wire).collect())
            .finish()
    }
}

impl FilterClause {
    fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let mut payload = value
            .as_object()
            .cloned()
            .ok_or_else(|| unexpected(keys::FILTERS, "object", value))?;
        let filter = match payload.remove(keys::FILTER) {
            Some(Value::String(raw)) => ConqueryId::parse_with(&raw, rules)?,
            Some(other) => return Err(unexpected(keys::FILTER, "identifier string", &other)),
            None => {
                return Err(QueryError::MissingField {
                    query_type: QueryType::Concept.as_str(),
                    field: keys::FILTER,
                })
            }
        };
        Ok(Self { filter, payload })
    }

    fn to_wire(&self) -> Value {
        let mut map = self.payload.clone();
        map.insert(keys::FILTER.to_string(), Value::from(self.filter.to_string()));
        Value::Object(map)
    }
}

impl ConceptElement {
    /// Decodes a `CONCEPT` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::Concept, rules)?;
        let tables = r
            .array(keys::TABLES)?
            .iter()
            .map(|table| ConceptTable::from_wire(table, rules))
            .collect::<QueryResult<_>>()?;
        let mut element = ConceptElement::new(r.id_list(keys::IDS)?, tables)?
            .with_concept_selects(r.id_list(keys::SELECTS)?);
        element.exclude_from_secondary_id = r.bool(keys::EXCLUDE_FROM_SECONDARY_ID_QUERY)?;
        element.exclude_from_time_aggregation = r.bool(keys::EXCLUDE_FROM_TIME_AGGREGATION)?;
        element.label = r.string(keys::LABEL)?;
        element.row_prefix = r.string(keys::ROW_PREFIX)?;
        Ok(element)
    }

    /// Encodes into a `CONCEPT` map.
    pub fn to_wire(&self) -> Value {
        WireWriter::tagged(QueryType::Concept)
            .common(&self.label, &self.row_prefix)
            .ids(keys::IDS, self.ids())
            .ids(keys::SELECTS, self.concept_selects())
            .list(keys::TABLES, self.tables().iter().map(ConceptTable::to_wire).collect())
            .opt(keys::EXCLUDE_FROM_SECONDARY_ID_QUERY, self.exclude_from_secondary_id)
            .opt(keys::EXCLUDE_FROM_TIME_AGGREGATION, self.exclude_from_time_aggregation)
            .finish()
    }
}

impl DateRestriction {
    /// Decodes a `DATE_RESTRICTION` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::DateRestriction, rules)?;
        let mut node = DateRestriction::new(r.node(keys::CHILD)?, r.date_range(keys::DATE_RANGE)?)?;
        node.label = r.string(keys::LABEL)?;
        node.row_prefix = r.string(keys::ROW_PREFIX)?;
        Ok(node)
    }

    /// Encodes into a `DATE_RESTRICTION` map.
    pub fn to_wire(&self) -> Value {
        WireWriter::tagged(QueryType::DateRestriction)
            .common(&self.label, &self.row_prefix)
            .date_range(keys::DATE_RANGE, &self.date_range)
            .value(keys::CHILD, self.child().to_wire())
            .finish()
    }
}

impl Negation {
    /// Decodes a `NEGATION` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::Negation, rules)?;
        let mut node = Negation::new(r.node(keys::CHILD)?)?;
        node.label = r.string(keys::LABEL)?;
        node.row_prefix = r.string(keys::ROW_PREFIX)?;
        Ok(node)
    }

    /// Encodes into a `NEGATION` map.
    pub fn to_wire(&self) -> Value {
        WireWriter::tagged(QueryType::Negation)
            .common(&self.label, &self.row_prefix)
            .value(keys::CHILD, self.child().to_wire())
            .finish()
    }
}

impl Junction {
    /// Decodes an `AND` or `OR` map.
    pub fn from_wire(value: &Value, kind: QueryType, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, kind, rules)?;
        let mut node = Junction::build(r.nodes(keys::CHILDREN)?, kind)?;
        node.create_exists = match r.bool(keys::CREATE_EXISTS)? {
            Some(flag) => Some(flag),
            None => r.bool(keys::CREATE_EXIST_LEGACY)?,
        };
        node.date_action = r.enum_value::<DateAggregationMode>(keys::DATE_ACTION)?;
        node.label = r.string(keys::LABEL)?;
        node.row_prefix = r.string(keys::ROW_PREFIX)?;
        Ok(node)
    }

    /// Encodes into an `AND` or `OR` map.
    pub fn to_wire(&self, kind: QueryType) -> Value {
        WireWriter::tagged(kind)
            .common(&self.label, &self.row_prefix)
            .opt(keys::CREATE_EXISTS, self.create_exists)
            .opt(keys::DATE_ACTION, self.date_action.map(|m| m.as_str()))
            .nodes(keys::CHILDREN, self.children())
            .finish()
    }
}

impl ConceptQuery {
    /// Decodes a `CONCEPT_QUERY` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::ConceptQuery, rules)?;
        let mut query = ConceptQuery::new(r.node(keys::ROOT)?)?;
        query.date_aggregation_mode = r.enum_value(keys::DATE_AGGREGATION_MODE)?;
        Ok(query)
    }

    /// Encodes into a `CONCEPT_QUERY` map.
    pub fn to_wire(&self) -> Value {
        WireWriter::tagged(QueryType::ConceptQuery)
            .value(keys::ROOT, self.root().to_wire())
            .opt(
                keys::DATE_AGGREGATION_MODE,
                self.date_aggregation_mode.map(|m| m.as_str()),
            )
            .finish()
    }
}

impl SecondaryIdQuery {
    /// Decodes a `SECONDARY_ID_QUERY` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::SecondaryIdQuery, rules)?;
        let mut query = SecondaryIdQuery::new(r.node(keys::ROOT)?, r.required_id(keys::SECONDARY_ID)?)?;
        query.date_aggregation_mode = r.enum_value(keys::DATE_AGGREGATION_MODE)?;
        Ok(query)
    }

    /// Encodes into a `SECONDARY_ID_QUERY` map.
    pub fn to_wire(&self) -> Value {
        WireWriter::tagged(QueryType::SecondaryIdQuery)
            .value(keys::ROOT, self.root().to_wire())
            .id(keys::SECONDARY_ID, &self.secondary_id)
            .opt(
                keys::DATE_AGGREGATION_MODE,
                self.date_aggregation_mode.map(|m| m.as_str()),
            )
            .finish()
    }
}

impl SavedQuery {
    /// Decodes a `SAVED_QUERY` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::SavedQuery, rules)?;
        let mut query = SavedQuery::new(r.required_id(keys::QUERY)?);
        query.exclude_from_secondary_id = match r.bool(keys::EXCLUDE_FROM_SECONDARY_ID)? {
            Some(flag) => Some(flag),
            None => r.bool(keys::EXCLUDE_FROM_SECONDARY_ID_QUERY)?,
        };
        query.label = r.string(keys::LABEL)?;
        query.row_prefix = r.string(keys::ROW_PREFIX)?;
        Ok(query)
    }

    /// Encodes into a `SAVED_QUERY` map.
    pub fn to_wire(&self) -> Value {
        WireWriter::tagged(QueryType::SavedQuery)
            .common(&self.label, &self.row_prefix)
            .id(keys::QUERY, &self.query_id)
            .opt(keys::EXCLUDE_FROM_SECONDARY_ID, self.exclude_from_secondary_id)
            .finish()
    }
}

impl External {
    /// Decodes an `EXTERNAL` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::External, rules)?;
        let values = r
            .array(keys::VALUES)?
            .iter()
            .map(|row| {
                row.as_array()
                    .ok_or_else(|| unexpected(keys::VALUES, "array", row))?
                    .iter()
                    .map(|cell| match cell {
                        Value::String(s) => Ok(s.clone()),
                        Value::Number(n) => Ok(n.to_string()),
                        other => Err(unexpected(keys::VALUES, "string", other)),
                    })
                    .collect::<QueryResult<Vec<_>>>()
            })
            .collect::<QueryResult<Vec<_>>>()?;
        let mut external = External::new(r.string_list(keys::FORMAT)?, values);
        external.label = r.string(keys::LABEL)?;
        external.row_prefix = r.string(keys::ROW_PREFIX)?;
        Ok(external)
    }

    /// Encodes into an `EXTERNAL` map.
    pub fn to_wire(&self) -> Value {
        let values = self
            .values
            .iter()
            .map(|row| Value::from(row.clone()))
            .collect();
        WireWriter::tagged(QueryType::External)
            .common(&self.label, &self.row_prefix)
            .list(
                keys::FORMAT,
                self.format.iter().map(|f| Value::from(f.as_str())).collect(),
            )
            .list(keys::VALUES, values)
            .finish()
    }
}

impl TimeMode {
    fn from_wire(r: &WireReader<'_>) -> QueryResult<Self> {
        let mode = r.required_string(keys::VALUE)?;
        match mode.as_str() {
            "ABSOLUTE" => Ok(TimeMode::Absolute {
                date_range: r.date_range(keys::DATE_RANGE)?,
            }),
            "ENTITY_DATE" => Ok(TimeMode::EntityDate {
                date_range: r.date_range(keys::DATE_RANGE)?,
                date_aggregation_mode: r.required_string(keys::DATE_AGGREGATION_MODE)?,
                alignment_hint: r.required_string(keys::ALIGNMENT_HINT)?,
            }),
            "RELATIVE" => Ok(TimeMode::Relative {
                time_unit: r.required_enum::<TimeUnit>(keys::TIME_UNIT)?,
                time_count_before: r.count(keys::TIME_COUNT_BEFORE)?,
                time_count_after: r.count(keys::TIME_COUNT_AFTER)?,
                index_selector: r.required_enum::<IndexSelector>(keys::INDEX_SELECTOR)?,
                index_placement: r.required_enum::<IndexPlacement>(keys::INDEX_PLACEMENT)?,
            }),
            other => Err(QueryError::invalid_field(
                keys::TIME_MODE,
                format!("unknown time mode {other}"),
            )),
        }
    }

    fn to_wire(&self) -> Value {
        let writer = WireWriter::default().value(keys::VALUE, self.value());
        let writer = match self {
            TimeMode::Absolute { date_range } => writer.date_range(keys::DATE_RANGE, date_range),
            TimeMode::EntityDate {
                date_range,
                date_aggregation_mode,
                alignment_hint,
            } => writer
                .date_range(keys::DATE_RANGE, date_range)
                .value(keys::DATE_AGGREGATION_MODE, date_aggregation_mode.as_str())
                .value(keys::ALIGNMENT_HINT, alignment_hint.as_str()),
            TimeMode::Relative {
                time_unit,
                time_count_before,
                time_count_after,
                index_selector,
                index_placement,
            } => writer
                .value(keys::TIME_UNIT, time_unit.as_str())
                .value(keys::TIME_COUNT_BEFORE, *time_count_before)
                .value(keys::TIME_COUNT_AFTER, *time_count_after)
                .value(keys::INDEX_SELECTOR, index_selector.as_str())
                .value(keys::INDEX_PLACEMENT, index_placement.as_str()),
        };
        writer.finish()
    }
}

impl ExportForm {
    /// Decodes an `EXPORT_FORM` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::ExportForm, rules)?;
        let time_mode = r
            .nested(keys::TIME_MODE)?
            .ok_or_else(|| r.missing(keys::TIME_MODE))?;
        let resolution = r
            .array(keys::RESOLUTION)?
            .iter()
            .map(|item| {
                Resolution::deserialize(item)
                    .map_err(|e| QueryError::invalid_field(keys::RESOLUTION, e.to_string()))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        let mut form = ExportForm::new(
            r.required_id(keys::QUERY_GROUP)?,
            TimeMode::from_wire(&time_mode)?,
            r.nodes(keys::FEATURES)?,
            r.nodes(keys::OUTCOMES)?,
        )?
        .with_resolution(resolution);
        form.also_create_coarser_subdivisions =
            r.bool(keys::ALSO_CREATE_COARSER_SUBDIVISIONS)?.unwrap_or(true);
        Ok(form)
    }

    /// Encodes into an `EXPORT_FORM` map.
    pub fn to_wire(&self) -> Value {
        let resolution = self
            .resolution()
            .iter()
            .map(|r| Value::from(r.as_str()))
            .collect();
        WireWriter::tagged(QueryType::ExportForm)
            .id(keys::QUERY_GROUP, self.query_group())
            .list(keys::RESOLUTION, resolution)
            .value(
                keys::ALSO_CREATE_COARSER_SUBDIVISIONS,
                self.also_create_coarser_subdivisions,
            )
            .value(keys::TIME_MODE, self.time_mode().to_wire())
            .nodes(keys::FEATURES, self.features())
            .nodes(keys::OUTCOMES, self.outcomes())
            .finish()
    }
}

impl FullExportForm {
    /// Decodes a `FULL_EXPORT_FORM` map.
    pub fn from_wire(value: &Value, rules: &DatasetRules) -> QueryResult<Self> {
        let r = WireReader::expect(value, QueryType::FullExportForm, rules)?;
        let tables = r
            .array(keys::TABLES)?
            .iter()
            .map(|table| ConceptElement::from_wire(table, rules))
            .collect::<QueryResult<_>>()?;
        FullExportForm::new(
            r.required_id(keys::QUERY_GROUP)?,
            tables,
            r.date_range(keys::DATE_RANGE)?,
        )
    }

    /// Encodes into a `FULL_EXPORT_FORM` map.
    pub fn to_wire(&self) -> Value {
        WireWriter::tagged(QueryType::FullExportForm)
            .id(keys::QUERY_GROUP, self.query_group())
            .date_range(keys::DATE_RANGE, &self.date_range)
            .list(keys::TABLES, self.tables().iter().map(ConceptElement::to_wire).collect())
            .finish()
    }
}
