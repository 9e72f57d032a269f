//! Best-effort structural extraction of query units from a SQL script.
//!
//! The pipeline is strictly ordered: comment stripping, statement split,
//! `CREATE TABLE ... AS` capture, `WITH` clause capture, then per unit a
//! recursive subquery-placeholder pass followed by a flat parse of the
//! placeholder-substituted text. Every step is tolerant: whatever cannot be
//! extracted is left out of the result instead of failing the parse.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::classify::{classify_table, detect_transformation, match_key};
use crate::graph::OUTPUT_NODE_ID;
use crate::lex::{
    find_matching_paren, find_top_level_keyword, normalize_whitespace, split_by_union,
    split_statements, split_top_level, strip_comments,
};
use crate::model::{
    FieldInfo, FilterClause, FilterInfo, JoinInfo, JoinType, ParsedSql, SubQuery, TableRef,
    UnionInfo,
};

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^create\s+(?:temporary\s+|temp\s+)?table\s+(?:if\s+not\s+exists\s+)?([\w.${}]+)\s+(?:as\s+)?((?:select|with)\b.*)$",
    )
    .unwrap()
});

static CTE_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*([\w.${}]+)\s+as\s*\(").unwrap());

static SUBQUERY_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(from|join)\s*\(").unwrap());

static SUBQUERY_ALIAS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:as\s+)?([A-Za-z_]\w*)").unwrap());

/// A table reference optionally followed by `[AS] alias`.
static TABLE_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*([\w.${}]+)(?:\s+(?:as\s+)?([A-Za-z_]\w*))?").unwrap());

/// A union branch with its own structure forces promotion of every branch.
static COMPLEX_BRANCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bgroup\s+by\b|\bjoin\b|\bwhere\b|\bhaving\b|\(\s*select\b").unwrap()
});

static SELECT_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bselect\b").unwrap());

static SIMPLE_IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

static DOTTED_IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.${}]+$").unwrap());

/// A plain `table.column` reference.
static QUALIFIED_COLUMN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w${}]+\.\w+$").unwrap());

static OPERATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+\-*/%]|\|\|").unwrap());

/// Function keywords whose presence makes a trailing bare identifier an
/// implicit alias.
static FUNC_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(case|over|sum|count|avg|max|min|concat|coalesce|nvl|row_number|rank|collect_list|cast)\b",
    )
    .unwrap()
});

/// Keywords that can trail a table reference and must never be read as its
/// alias.
const FALSE_ALIASES: &[&str] = &[
    "where", "group", "having", "order", "limit", "union", "inner", "left", "right", "full",
    "cross", "join", "on", "lateral", "view", "explode", "unnest", "as", "by", "select",
    "distinct", "outer", "using",
];

fn is_false_alias(token: &str) -> bool {
    FALSE_ALIASES.contains(&token.to_lowercase().as_str())
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.len() >= keyword.len()
        && text[..keyword.len()].eq_ignore_ascii_case(keyword)
        && text[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
}

/// Identifiers visible for resolution at the current point of the parse.
/// First match wins: a duplicate declaration never shadows an earlier one.
#[derive(Debug, Clone, Default)]
struct Scope {
    known: Vec<(String, String)>, // (match key, unit id)
}

impl Scope {
    fn resolve(&self, name: &str) -> Option<&str> {
        let key = match_key(name);
        self.known
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, id)| id.as_str())
    }

    fn add(&mut self, name: &str, id: &str) {
        let key = match_key(name);
        if !self.known.iter().any(|(k, _)| *k == key) {
            self.known.push((key, id.to_owned()));
        }
    }
}

/// Mutable parse state threaded through the recursion: the subquery id
/// counter, the dedup cache keyed by normalized body text, and the
/// accumulator of promoted units. Local to one `parse_sql` call, so
/// concurrent parses never interfere.
#[derive(Debug, Default)]
struct ParseContext {
    next_subquery: u64,
    sub_queries: Vec<SubQuery>,
    dedup: IndexMap<String, String>,
    /// Match keys of every assigned or reserved unit id. All ids, declared
    /// and generated, share this one namespace.
    used_ids: IndexSet<String>,
}

impl ParseContext {
    fn reserve_id(&mut self, id: &str) {
        self.used_ids.insert(match_key(id));
    }

    /// Assigns a unit id from a declared name. A name that collides with a
    /// reserved or already-assigned id gets a numeric suffix; the declared
    /// name stays as the display label and in scope resolution.
    fn claim_id(&mut self, wanted: &str) -> String {
        if self.used_ids.insert(match_key(wanted)) {
            return wanted.to_owned();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", wanted, n);
            if self.used_ids.insert(match_key(&candidate)) {
                log::debug!("id `{}` already taken, unit gets `{}`", wanted, candidate);
                return candidate;
            }
            n += 1;
        }
    }

    fn next_subquery_id(&mut self) -> String {
        loop {
            self.next_subquery += 1;
            let id = format!("subquery_{}", self.next_subquery);
            if self.used_ids.insert(match_key(&id)) {
                return id;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    TempTable,
    Cte,
    Main,
    Nested,
}

/// Parses one SQL script into its structured lineage document.
///
/// Total over arbitrary input: malformed SQL degrades to a sparse but
/// structurally valid result. It never panics and never errors.
pub fn parse_sql(sql: &str) -> ParsedSql {
    let script = strip_comments(sql);
    let statements = split_statements(&script);
    log::debug!("script split into {} statement(s)", statements.len());

    let mut ctx = ParseContext::default();
    ctx.reserve_id("main");
    ctx.reserve_id(OUTPUT_NODE_ID);
    let mut scope = Scope::default();
    let mut ctes: Vec<SubQuery> = vec![];
    let mut residual: Vec<String> = vec![];
    let mut last_temp: Option<String> = None;

    for stmt in &statements {
        let stmt = normalize_whitespace(stmt);
        if let Some(caps) = CREATE_TABLE_RE.captures(&stmt) {
            let name = caps.get(1).unwrap().as_str().to_owned();
            let body = caps.get(2).unwrap().as_str().to_owned();
            log::debug!("temp table `{}` captured", name);
            let unit_id = ctx.claim_id(&name);
            let unit = process_unit(&unit_id, &name, &body, UnitKind::TempTable, &scope, &mut ctx);
            scope.add(&name, &unit.id);
            ctes.push(unit);
            last_temp = Some(name);
        } else {
            residual.push(stmt);
        }
    }

    let residual = residual.join(" ; ");
    let main_text = extract_ctes(&residual, &mut scope, &mut ctx, &mut ctes);

    // Pure-DDL scripts still get a terminal query so the graph has an end.
    let main_text = if SELECT_KEYWORD_RE.is_match(&main_text) {
        main_text
    } else {
        let source = last_temp.as_deref().unwrap_or("dual");
        log::debug!(
            "no residual select, synthesizing terminal query over `{}`",
            source
        );
        format!("SELECT * FROM {}", source)
    };

    let main_query = process_unit("main", "main", &main_text, UnitKind::Main, &scope, &mut ctx);

    ParsedSql {
        ctes,
        main_query,
        sub_queries: ctx.sub_queries,
    }
}

/// Captures leading `WITH <name> AS (<body>)` groups from the residual
/// script and returns the remaining main query text.
fn extract_ctes(
    residual: &str,
    scope: &mut Scope,
    ctx: &mut ParseContext,
    ctes: &mut Vec<SubQuery>,
) -> String {
    let text = normalize_whitespace(residual);
    if !starts_with_keyword(&text, "WITH") {
        return text;
    }
    let mut pos = "WITH".len();
    loop {
        let Some(caps) = CTE_HEAD_RE.captures(&text[pos..]) else {
            break;
        };
        let name = caps.get(1).unwrap().as_str().to_owned();
        let open = pos + caps.get(0).unwrap().end() - 1;
        let Some(close) = find_matching_paren(&text, open) else {
            log::warn!(
                "unbalanced parenthesis in CTE `{}`, remainder left unparsed",
                name
            );
            return text[pos..].trim().to_owned();
        };
        let body = text[open + 1..close].to_owned();
        log::debug!("cte `{}` captured", name);
        let unit_id = ctx.claim_id(&name);
        let unit = process_unit(&unit_id, &name, &body, UnitKind::Cte, scope, ctx);
        scope.add(&name, &unit.id);
        ctes.push(unit);
        pos = close + 1;

        // Another CTE group follows only after a top-level comma.
        let rest = text[pos..].trim_start();
        if let Some(stripped) = rest.strip_prefix(',') {
            pos = text.len() - stripped.len();
        } else {
            break;
        }
    }
    text[pos..].trim().to_owned()
}

/// Parses one unit body: complex-union promotion, then subquery placeholder
/// substitution, then the flat parse, then placeholder reattachment.
fn process_unit(
    id: &str,
    name: &str,
    body: &str,
    kind: UnitKind,
    scope: &Scope,
    ctx: &mut ParseContext,
) -> SubQuery {
    let text = normalize_whitespace(body);
    let mut unit = SubQuery::new(id, name);
    match kind {
        UnitKind::TempTable => unit.is_temp_table = true,
        UnitKind::Cte => unit.is_cte = true,
        UnitKind::Nested => unit.is_sub_query = true,
        UnitKind::Main => {}
    }

    // Complex unions are dismantled before any other extraction so each
    // branch keeps its own joins, filters and grouping.
    let (branches, operator) = split_by_union(&text);
    if branches.len() > 1 {
        if let Some(operator) = operator {
            if branches.iter().any(|b| COMPLEX_BRANCH_RE.is_match(b)) {
                log::debug!(
                    "unit `{}`: complex {} with {} branches, promoting each",
                    id,
                    operator,
                    branches.len()
                );
                let mut sources = vec![];
                for (i, branch) in branches.iter().enumerate() {
                    let hint = format!("{} branch {}", name, i + 1);
                    let branch_id = register_subquery(branch, Some(&hint), scope, ctx);
                    unit.add_dependency(&branch_id);
                    sources.push(branch_id);
                }
                unit.union_info = Some(UnionInfo { operator, sources });
                return unit;
            }
        }
    }

    let mut local_scope = scope.clone();
    let (replaced, placeholders) = extract_subqueries(&text, &mut local_scope, ctx);
    flat_parse(&replaced, &local_scope, &mut unit);
    resolve_placeholders(&mut unit, &placeholders);
    unit.depends_on.shift_remove(id);
    unit
}

/// Parses a subquery body at most once: textually identical bodies (after
/// whitespace normalization) collapse to one unit referenced from every
/// call site.
fn register_subquery(
    body: &str,
    name_hint: Option<&str>,
    scope: &Scope,
    ctx: &mut ParseContext,
) -> String {
    let norm = normalize_whitespace(body);
    if let Some(existing) = ctx.dedup.get(&norm) {
        log::debug!("subquery body already parsed as `{}`, reusing", existing);
        return existing.clone();
    }
    let id = ctx.next_subquery_id();
    ctx.dedup.insert(norm.clone(), id.clone());
    let name = name_hint.map(str::to_owned).unwrap_or_else(|| id.clone());
    let unit = process_unit(&id, &name, &norm, UnitKind::Nested, scope, ctx);
    ctx.sub_queries.push(unit);
    id
}

fn placeholder_token(id: &str) -> String {
    let n = id.rsplit('_').next().unwrap_or("0");
    format!("__sq_{}__", n)
}

/// Replaces every `FROM (...)` / `JOIN (...)` derived table with a
/// placeholder token, recursively parsing each distinct body. The token is
/// added to `scope` under the subquery's id so the flat parse resolves it
/// like any known unit.
fn extract_subqueries(
    text: &str,
    scope: &mut Scope,
    ctx: &mut ParseContext,
) -> (String, IndexMap<String, String>) {
    let mut out = text.to_owned();
    let mut placeholders: IndexMap<String, String> = IndexMap::new();
    let mut search_from = 0;
    while let Some(m) = SUBQUERY_OPEN_RE.find_at(&out, search_from) {
        let open = m.end() - 1;
        let Some(close) = find_matching_paren(&out, open) else {
            log::warn!("unbalanced subquery parenthesis, text left unchanged");
            break;
        };
        let body = out[open + 1..close].to_owned();
        if !(starts_with_keyword(body.trim_start(), "SELECT")
            || starts_with_keyword(body.trim_start(), "WITH"))
        {
            // An expression group, not a derived table.
            search_from = m.end();
            continue;
        }
        let alias = SUBQUERY_ALIAS_RE
            .captures(&out[close + 1..])
            .map(|c| c.get(1).unwrap().as_str().to_owned())
            .filter(|a| !is_false_alias(a));
        let id = register_subquery(&body, alias.as_deref(), scope, ctx);
        let token = placeholder_token(&id);
        scope.add(&token, &id);
        out.replace_range(open..=close, &token);
        search_from = open + token.len();
        placeholders.insert(token, id);
    }
    (out, placeholders)
}

/// Rewrites placeholder tokens in tables and joins back to the resolved
/// subquery ids, preserving aliases and join context.
fn resolve_placeholders(unit: &mut SubQuery, placeholders: &IndexMap<String, String>) {
    if placeholders.is_empty() {
        return;
    }
    for table in &mut unit.tables {
        if let Some(id) = placeholders.get(&table.name) {
            let alias = table.alias.take();
            *table = TableRef::new(id, alias, None);
        }
    }
    for join in &mut unit.joins {
        if let Some(id) = placeholders.get(&join.table.name) {
            let alias = join.table.alias.take();
            join.table = TableRef::new(id, alias, None);
        }
    }
}

/// Flat-parses subquery-free text. A surviving top-level union here is a
/// simple one: per-branch table scans merged into a source list.
fn flat_parse(text: &str, scope: &Scope, unit: &mut SubQuery) {
    let (branches, operator) = split_by_union(text);
    if branches.len() > 1 {
        if let Some(operator) = operator {
            let mut sources = vec![];
            for branch in &branches {
                let Some(table) = first_from_table(branch) else {
                    continue;
                };
                match scope.resolve(&table) {
                    Some(id) => {
                        let id = id.to_owned();
                        unit.add_dependency(&id);
                        sources.push(id);
                    }
                    None => sources.push(table),
                }
            }
            unit.union_info = Some(UnionInfo { operator, sources });
            parse_fields(&branches[0], unit);
            return;
        }
    }
    parse_select(text, scope, unit);
}

fn first_from_table(text: &str) -> Option<String> {
    let from = find_top_level_keyword(text, "FROM", 0)?;
    TABLE_HEAD_RE
        .captures(&text[from + "FROM".len()..])
        .map(|c| c.get(1).unwrap().as_str().to_owned())
}

/// Byte span of the SELECT list, with `DISTINCT` skipped.
fn select_list_span(text: &str) -> Option<(usize, usize)> {
    let sel = find_top_level_keyword(text, "SELECT", 0)?;
    let mut start = sel + "SELECT".len();
    let after = text[start..].trim_start();
    if starts_with_keyword(after, "DISTINCT") {
        start = text.len() - after.len() + "DISTINCT".len();
    }
    let end = find_top_level_keyword(text, "FROM", start)
        .or_else(|| first_clause_boundary(text, start))
        .unwrap_or(text.len());
    Some((start, end))
}

fn first_clause_boundary(text: &str, from: usize) -> Option<usize> {
    ["WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT"]
        .iter()
        .filter_map(|kw| find_top_level_keyword(text, kw, from))
        .min()
}

fn parse_fields(text: &str, unit: &mut SubQuery) {
    let Some((start, end)) = select_list_span(text) else {
        return;
    };
    for part in split_top_level(&text[start..end], ',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        unit.fields.push(parse_field(part));
    }
}

struct JoinSpan {
    /// Start of the join clause, qualifier included.
    start: usize,
    /// Offset just past the JOIN keyword.
    after: usize,
    join_type: JoinType,
}

fn join_qualifier(before: &str) -> (JoinType, usize) {
    const QUALIFIERS: &[(&str, JoinType)] = &[
        ("left outer", JoinType::Left),
        ("right outer", JoinType::Right),
        ("full outer", JoinType::Full),
        ("inner", JoinType::Inner),
        ("left", JoinType::Left),
        ("right", JoinType::Right),
        ("full", JoinType::Full),
        ("cross", JoinType::Cross),
    ];
    let lower = before.to_lowercase();
    for (qualifier, join_type) in QUALIFIERS {
        if lower.ends_with(qualifier) {
            let at = before.len() - qualifier.len();
            let boundary = at == 0
                || !before[..at]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_');
            if boundary {
                return (*join_type, qualifier.len());
            }
        }
    }
    (JoinType::Inner, 0)
}

fn join_spans(text: &str) -> Vec<JoinSpan> {
    let mut spans = vec![];
    let mut from = 0;
    while let Some(j) = find_top_level_keyword(text, "JOIN", from) {
        let before = text[..j].trim_end();
        let (join_type, qualifier_len) = join_qualifier(before);
        let start = if qualifier_len > 0 {
            before.len() - qualifier_len
        } else {
            j
        };
        spans.push(JoinSpan {
            start,
            after: j + "JOIN".len(),
            join_type,
        });
        from = j + "JOIN".len();
    }
    spans
}

/// Extracts FROM table, joins, filters and grouping from one subquery-free,
/// union-free SELECT. Each extraction is independent and tolerant of
/// absence.
fn parse_select(text: &str, scope: &Scope, unit: &mut SubQuery) {
    parse_fields(text, unit);

    let joins = join_spans(text);
    let where_pos = find_top_level_keyword(text, "WHERE", 0);
    let group_pos = find_top_level_keyword(text, "GROUP BY", 0);
    let having_pos = find_top_level_keyword(text, "HAVING", 0);
    let order_pos = find_top_level_keyword(text, "ORDER BY", 0);
    let limit_pos = find_top_level_keyword(text, "LIMIT", 0);
    let clause_starts = [where_pos, group_pos, having_pos, order_pos, limit_pos];

    // FROM table: first reference only, further sources arrive via joins.
    if let Some(from_pos) = find_top_level_keyword(text, "FROM", 0) {
        let from_start = from_pos + "FROM".len();
        let from_end = joins
            .first()
            .map(|j| j.start)
            .into_iter()
            .chain(clause_starts.into_iter().flatten())
            .filter(|&p| p > from_start)
            .min()
            .unwrap_or(text.len());
        if let Some(caps) = TABLE_HEAD_RE.captures(&text[from_start..from_end]) {
            let name = caps.get(1).unwrap().as_str().to_owned();
            let alias = caps
                .get(2)
                .map(|m| m.as_str().to_owned())
                .filter(|a| !is_false_alias(a));
            let table = resolve_ref(&name, alias, scope, &mut unit.depends_on);
            unit.tables.push(table);
        }
    }

    for (i, span) in joins.iter().enumerate() {
        let seg_end = joins
            .get(i + 1)
            .map(|next| next.start)
            .into_iter()
            .chain(clause_starts.into_iter().flatten())
            .filter(|&p| p > span.after)
            .min()
            .unwrap_or(text.len());
        let seg = &text[span.after..seg_end];
        let Some(caps) = TABLE_HEAD_RE.captures(seg) else {
            continue;
        };
        let name = caps.get(1).unwrap().as_str().to_owned();
        let alias = caps
            .get(2)
            .map(|m| m.as_str().to_owned())
            .filter(|a| !is_false_alias(a));
        let condition = find_top_level_keyword(seg, "ON", 0)
            .map(|on| seg[on + "ON".len()..].trim().to_owned())
            .unwrap_or_default();
        let table = resolve_ref(&name, alias, scope, &mut unit.depends_on);
        unit.joins.push(JoinInfo {
            join_type: span.join_type,
            table,
            condition,
        });
    }

    if let Some(at) = where_pos {
        let end = [group_pos, having_pos, order_pos, limit_pos]
            .into_iter()
            .flatten()
            .filter(|&p| p > at)
            .min()
            .unwrap_or(text.len());
        let condition = text[at + "WHERE".len()..end].trim();
        if !condition.is_empty() {
            unit.filters.push(FilterInfo {
                clause: FilterClause::Where,
                condition: condition.to_owned(),
            });
        }
    }

    if let Some(at) = having_pos {
        let end = [order_pos, limit_pos]
            .into_iter()
            .flatten()
            .filter(|&p| p > at)
            .min()
            .unwrap_or(text.len());
        let condition = text[at + "HAVING".len()..end].trim();
        if !condition.is_empty() {
            unit.filters.push(FilterInfo {
                clause: FilterClause::Having,
                condition: condition.to_owned(),
            });
        }
    }

    if let Some(at) = group_pos {
        let end = [having_pos, order_pos, limit_pos]
            .into_iter()
            .flatten()
            .filter(|&p| p > at)
            .min()
            .unwrap_or(text.len());
        unit.group_by = term_list(&text[at + "GROUP BY".len()..end]);
    }

    if let Some(at) = order_pos {
        let end = limit_pos.filter(|&p| p > at).unwrap_or(text.len());
        unit.order_by = term_list(&text[at + "ORDER BY".len()..end]);
    }
}

fn term_list(text: &str) -> Vec<String> {
    split_top_level(text, ',')
        .into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Resolves a table reference against the known names. Known units gain a
/// dependency entry and stay unclassified; anything else is a physical
/// table and gets a fact/dimension tag.
fn resolve_ref(
    name: &str,
    alias: Option<String>,
    scope: &Scope,
    depends_on: &mut IndexSet<String>,
) -> TableRef {
    match scope.resolve(name) {
        Some(id) => {
            let id = id.to_owned();
            depends_on.insert(id);
            TableRef::new(name, alias, None)
        }
        None => TableRef::new(name, alias, Some(classify_table(name))),
    }
}

fn ends_with_operator(expr: &str) -> bool {
    expr.trim_end()
        .chars()
        .next_back()
        .is_some_and(|c| "+-*/%|,".contains(c))
}

fn implies_alias(expr: &str) -> bool {
    if expr.is_empty() || ends_with_operator(expr) {
        return false;
    }
    expr.ends_with(')')
        || OPERATOR_RE.is_match(expr)
        || FUNC_KEYWORD_RE.is_match(expr)
        || QUALIFIED_COLUMN_RE.is_match(expr)
}

/// Splits one SELECT-list entry into `(expression, alias)`.
fn split_alias(text: &str) -> (String, String) {
    // Explicit `expr AS alias`: the last top-level AS wins, so aliases
    // after CAST(x AS t) parse correctly.
    let mut last_as = None;
    let mut from = 0;
    while let Some(p) = find_top_level_keyword(text, "AS", from) {
        last_as = Some(p);
        from = p + "AS".len();
    }
    if let Some(p) = last_as {
        let alias = text[p + "AS".len()..].trim();
        if SIMPLE_IDENT_RE.is_match(alias) {
            return (text[..p].trim().to_owned(), alias.to_owned());
        }
    }

    // Implicit alias: a trailing bare identifier after an expression that
    // looks like a computation or a qualified column.
    if let Some(space) = text.rfind(' ') {
        let head = text[..space].trim();
        let tail = text[space..].trim();
        if SIMPLE_IDENT_RE.is_match(tail) && !is_false_alias(tail) && implies_alias(head) {
            return (head.to_owned(), tail.to_owned());
        }
    }

    // No alias marker: last dot segment for qualified references, the
    // identifier itself for bare ones, otherwise no alias.
    let expr = text.trim().to_owned();
    let alias = if SIMPLE_IDENT_RE.is_match(&expr) {
        expr.clone()
    } else if expr.contains('.') && DOTTED_IDENT_RE.is_match(&expr) {
        expr.rsplit('.').next().unwrap_or_default().to_owned()
    } else {
        String::new()
    };
    (expr, alias)
}

fn parse_field(text: &str) -> FieldInfo {
    let (expression, alias) = split_alias(text);
    let display_text = if alias.is_empty() {
        expression.clone()
    } else {
        alias.clone()
    };
    FieldInfo {
        original_name: expression.clone(),
        transformation: detect_transformation(&expression),
        expression,
        alias,
        display_text,
    }
}
