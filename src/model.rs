//! The structured output of one parse: query units and everything extracted
//! from them. All entities are created once during a parse pass and read-only
//! afterwards; the graph assembler never mutates them.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Naming-convention classification of a physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TableClass {
    Fact,
    Dimension,
}

/// One tag from the fixed field-transformation taxonomy. Detection is
/// ordered: earlier categories pre-empt later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Transformation {
    Aggregate,
    Window,
    Explode,
    StringConcat,
    Conditional,
    TypeConversion,
    NullHandling,
    StringFunction,
    DateFunction,
    SelectAll,
    Arithmetic,
    RawField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum JoinType {
    #[strum(to_string = "INNER JOIN", serialize = "JOIN")]
    #[serde(rename = "INNER JOIN")]
    Inner,
    #[strum(to_string = "LEFT JOIN", serialize = "LEFT OUTER JOIN")]
    #[serde(rename = "LEFT JOIN")]
    Left,
    #[strum(to_string = "RIGHT JOIN", serialize = "RIGHT OUTER JOIN")]
    #[serde(rename = "RIGHT JOIN")]
    Right,
    #[strum(to_string = "FULL JOIN", serialize = "FULL OUTER JOIN")]
    #[serde(rename = "FULL JOIN")]
    Full,
    #[strum(to_string = "CROSS JOIN")]
    #[serde(rename = "CROSS JOIN")]
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum UnionOperator {
    #[strum(to_string = "UNION")]
    #[serde(rename = "UNION")]
    Union,
    #[strum(to_string = "UNION ALL")]
    #[serde(rename = "UNION ALL")]
    UnionAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterClause {
    Where,
    Having,
}

/// A table (or known query unit) referenced in a FROM/JOIN clause.
///
/// `classification` is computed only when the reference does not resolve to
/// a known CTE/subquery/temp table in the current scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    /// Possibly schema-qualified name, as written (or a resolved unit id).
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Unqualified table name.
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<TableClass>,
}

impl TableRef {
    pub fn new(name: &str, alias: Option<String>, classification: Option<TableClass>) -> Self {
        let (schema, table_name) = match name.rsplit_once('.') {
            Some((schema, table)) => (Some(schema.to_owned()), table.to_owned()),
            None => (None, name.to_owned()),
        };
        Self {
            name: name.to_owned(),
            schema,
            table_name,
            alias,
            classification,
        }
    }
}

/// One projected column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    /// Raw SQL text of the expression, aliasing stripped.
    pub expression: String,
    pub alias: String,
    /// The expression before aliasing was applied.
    pub original_name: String,
    /// Human label: the alias when present, otherwise the expression.
    pub display_text: String,
    pub transformation: Transformation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinInfo {
    pub join_type: JoinType,
    pub table: TableRef,
    /// Raw ON-clause text. Empty when the join had no ON clause.
    pub condition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterInfo {
    pub clause: FilterClause,
    pub condition: String,
}

/// Set-operation structure of a unit. `sources` holds, in branch order,
/// either a resolved query-unit id or a literal physical-table name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionInfo {
    pub operator: UnionOperator,
    pub sources: Vec<String>,
}

/// The central unit: one named query (CTE, temp table, nested subquery,
/// promoted union branch, or the main query).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuery {
    /// Unique within one parse, stable for its lifetime.
    pub id: String,
    /// Display label.
    pub name: String,
    pub is_cte: bool,
    pub is_sub_query: bool,
    pub is_temp_table: bool,
    pub tables: Vec<TableRef>,
    pub fields: Vec<FieldInfo>,
    pub joins: Vec<JoinInfo>,
    pub filters: Vec<FilterInfo>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    /// Ids (or physical-table names) this unit reads from, deduplicated,
    /// never containing the unit's own id.
    pub depends_on: IndexSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub union_info: Option<UnionInfo>,
}

impl SubQuery {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            is_cte: false,
            is_sub_query: false,
            is_temp_table: false,
            tables: vec![],
            fields: vec![],
            joins: vec![],
            filters: vec![],
            group_by: vec![],
            order_by: vec![],
            depends_on: IndexSet::new(),
            union_info: None,
        }
    }

    /// Adds a dependency, skipping self-references.
    pub fn add_dependency(&mut self, dep: &str) {
        if dep != self.id {
            self.depends_on.insert(dep.to_owned());
        }
    }
}

/// The full parse result for one script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSql {
    /// Temp tables then CTEs, in declaration order.
    pub ctes: Vec<SubQuery>,
    pub main_query: SubQuery,
    /// Nested and union-branch units, in creation order.
    pub sub_queries: Vec<SubQuery>,
}

impl ParsedSql {
    /// All units in resolution order: `ctes`, then the main query, then
    /// `sub_queries`. The graph assembler iterates in this order, so
    /// producers come before the consumers that reference them.
    pub fn all_queries(&self) -> impl Iterator<Item = &SubQuery> {
        self.ctes
            .iter()
            .chain(std::iter::once(&self.main_query))
            .chain(self.sub_queries.iter())
    }

    /// Looks up any unit by id.
    pub fn query_by_id(&self, id: &str) -> Option<&SubQuery> {
        self.all_queries().find(|q| q.id == id)
    }
}
