use indexmap::IndexSet;
use sqlineage::model::{
    FilterClause, JoinType, ParsedSql, TableClass, Transformation, UnionOperator,
};
use sqlineage::parser::parse_sql;
use sqlineage::test_utils::{PARSING_TESTS_FILE, TestParsingData};

/// Structural invariants that must hold for every parse, malformed input
/// included: unique ids, deduplicated dependencies, no self-references.
fn assert_structurally_valid(parsed: &ParsedSql) {
    let mut ids: IndexSet<&str> = IndexSet::new();
    for unit in parsed.all_queries() {
        assert!(ids.insert(&unit.id), "duplicate unit id `{}`", unit.id);
        assert!(
            !unit.depends_on.contains(&unit.id),
            "unit `{}` depends on itself",
            unit.id
        );
    }
}

#[test]
fn test_corpus_never_fails() {
    let parsing_test_file =
        std::fs::read_to_string(PARSING_TESTS_FILE).expect("Cannot open parsing test cases");
    let test_parsing_data: TestParsingData =
        toml::from_str(&parsing_test_file).expect("Cannot parse test cases defined in toml");

    for test in test_parsing_data.tests {
        let sql = &test.sql;
        println!("Testing parsing for SQL: {}", sql);
        assert_structurally_valid(&parse_sql(sql));
        assert_structurally_valid(&parse_sql(&sql.to_uppercase()));
        assert_structurally_valid(&parse_sql(&sql.to_lowercase()));
    }
}

#[test]
fn test_simple_select() {
    let parsed = parse_sql("SELECT a, b FROM t1");
    assert!(parsed.ctes.is_empty());
    assert!(parsed.sub_queries.is_empty());

    let main = &parsed.main_query;
    assert_eq!(main.tables.len(), 1);
    assert_eq!(main.tables[0].table_name, "t1");
    assert_eq!(
        main.fields.iter().map(|f| f.alias.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert!(main.joins.is_empty());
    assert!(main.filters.is_empty());
}

#[test]
fn test_cte_extraction_and_dependency() {
    let parsed = parse_sql("WITH c AS (SELECT x FROM t1) SELECT x FROM c");
    assert_eq!(parsed.ctes.len(), 1);

    let cte = &parsed.ctes[0];
    assert_eq!(cte.name, "c");
    assert!(cte.is_cte);
    assert_eq!(cte.tables.len(), 1);
    assert_eq!(cte.tables[0].table_name, "t1");

    let main = &parsed.main_query;
    assert!(main.depends_on.contains("c"));
    // The CTE reference resolves to a known unit, so it stays unclassified.
    assert!(main.tables[0].classification.is_none());
}

#[test]
fn test_cte_chain_scoping() {
    let parsed = parse_sql(
        "WITH a AS (SELECT x FROM t1), b AS (SELECT x FROM a) SELECT * FROM b",
    );
    assert_eq!(parsed.ctes.len(), 2);
    assert!(parsed.ctes[1].depends_on.contains("a"));
    assert!(parsed.main_query.depends_on.contains("b"));
}

#[test]
fn test_temp_table_extraction_and_scoping() {
    let sql = r#"
        CREATE TABLE tmp_a AS SELECT * FROM dwd_src;
        CREATE TABLE tmp_b AS SELECT * FROM tmp_a;
        SELECT * FROM tmp_b
    "#;
    let parsed = parse_sql(sql);
    assert_eq!(parsed.ctes.len(), 2);
    assert!(parsed.ctes[0].is_temp_table);
    assert_eq!(parsed.ctes[0].name, "tmp_a");
    assert_eq!(
        parsed.ctes[0].tables[0].classification,
        Some(TableClass::Fact)
    );
    // tmp_a is in scope when tmp_b parses, so it resolves as a dependency.
    assert!(parsed.ctes[1].depends_on.contains("tmp_a"));
    assert!(parsed.main_query.depends_on.contains("tmp_b"));
}

#[test]
fn test_pure_ddl_synthesizes_main_query() {
    let parsed = parse_sql("CREATE TABLE tmp_only AS SELECT * FROM src_a;");
    assert_eq!(parsed.ctes.len(), 1);
    assert!(parsed.main_query.depends_on.contains("tmp_only"));
}

#[test]
fn test_empty_script_falls_back_to_dual() {
    let parsed = parse_sql("");
    assert_eq!(parsed.main_query.tables.len(), 1);
    assert_eq!(parsed.main_query.tables[0].table_name, "dual");
}

#[test]
fn test_join_parsing() {
    let parsed = parse_sql("SELECT * FROM a LEFT JOIN b ON a.id = b.id WHERE a.x > 0");
    let main = &parsed.main_query;
    assert_eq!(main.joins.len(), 1);
    assert_eq!(main.joins[0].join_type, JoinType::Left);
    assert_eq!(main.joins[0].table.table_name, "b");
    assert_eq!(main.joins[0].condition, "a.id = b.id");
    assert_eq!(main.filters.len(), 1);
    assert_eq!(main.filters[0].clause, FilterClause::Where);
    assert_eq!(main.filters[0].condition, "a.x > 0");
}

#[test]
fn test_unspecified_join_defaults_to_inner() {
    let parsed = parse_sql("SELECT * FROM a JOIN b ON a.id = b.id");
    assert_eq!(parsed.main_query.joins[0].join_type, JoinType::Inner);
}

#[test]
fn test_group_by_order_by_and_implicit_alias() {
    let parsed =
        parse_sql("SELECT dept, count(*) cnt FROM emp GROUP BY dept ORDER BY cnt DESC LIMIT 10");
    let main = &parsed.main_query;
    assert_eq!(main.group_by, vec!["dept"]);
    assert_eq!(main.order_by, vec!["cnt DESC"]);
    assert_eq!(main.fields[1].alias, "cnt");
    assert_eq!(main.fields[1].expression, "count(*)");
    assert_eq!(main.fields[1].transformation, Transformation::Aggregate);
}

#[test]
fn test_simple_union() {
    let parsed = parse_sql("SELECT * FROM t1 UNION ALL SELECT * FROM t2");
    let union = parsed.main_query.union_info.as_ref().expect("union info");
    assert_eq!(union.operator, UnionOperator::UnionAll);
    assert_eq!(union.sources, vec!["t1", "t2"]);
    // No branch promotion for a simple union.
    assert!(parsed.sub_queries.is_empty());
}

#[test]
fn test_complex_union_promotes_branches() {
    let sql = "SELECT id FROM dwd_a WHERE dt = '2024-01-01' \
               UNION SELECT id FROM dwd_b GROUP BY id";
    let parsed = parse_sql(sql);
    assert_eq!(parsed.sub_queries.len(), 2);

    let main = &parsed.main_query;
    let union = main.union_info.as_ref().expect("union info");
    assert_eq!(union.operator, UnionOperator::Union);
    // Pass-through node: branches are its only dependencies, no own content.
    assert_eq!(union.sources.len(), 2);
    assert!(main.tables.is_empty());
    assert!(main.fields.is_empty());
    for source in &union.sources {
        assert!(main.depends_on.contains(source));
        let branch = parsed.query_by_id(source).expect("promoted branch");
        assert!(branch.is_sub_query);
        assert!(!branch.tables.is_empty());
    }
}

#[test]
fn test_nested_subqueries_resolve_inside_out() {
    let sql = "SELECT outer_q.id FROM ( \
                   SELECT inner_q.id FROM (SELECT id FROM dwd_deep) inner_q \
               ) outer_q";
    let parsed = parse_sql(sql);
    assert_eq!(parsed.sub_queries.len(), 2);

    let outer_id = parsed.main_query.depends_on.first().expect("outer dep");
    let outer = parsed.query_by_id(outer_id).expect("outer unit");
    let inner_id = outer.depends_on.first().expect("inner dep");
    let inner = parsed.query_by_id(inner_id).expect("inner unit");
    assert_eq!(inner.tables[0].table_name, "dwd_deep");
    // The producer precedes its consumer in sub_queries.
    let pos = |id: &str| parsed.sub_queries.iter().position(|q| q.id == id).unwrap();
    assert!(pos(inner_id) < pos(outer_id));
}

#[test]
fn test_identical_subqueries_deduplicate() {
    let sql = "SELECT a.x, b.y FROM (SELECT x, y FROM dwd_t) a \
               JOIN (SELECT x, y FROM dwd_t) b ON a.x = b.x";
    let parsed = parse_sql(sql);
    assert_eq!(parsed.sub_queries.len(), 1);

    let sub_id = parsed.sub_queries[0].id.clone();
    assert!(parsed.main_query.depends_on.contains(&sub_id));
    assert_eq!(parsed.main_query.joins[0].table.name, sub_id);
}

#[test]
fn test_cte_named_main_keeps_lineage() {
    let parsed = parse_sql("WITH main AS (SELECT x FROM t1) SELECT * FROM main");
    assert_structurally_valid(&parsed);

    let cte = &parsed.ctes[0];
    assert_eq!(cte.name, "main");
    assert_ne!(cte.id, "main");
    assert_eq!(cte.tables[0].table_name, "t1");
    // The reserved id is suffixed away, so the dependency survives the
    // self-reference filter.
    assert!(parsed.main_query.depends_on.contains(&cte.id));
}

#[test]
fn test_generated_subquery_ids_skip_declared_names() {
    let sql = "WITH subquery_1 AS (SELECT x FROM t1) \
               SELECT * FROM (SELECT y FROM t2) q";
    let parsed = parse_sql(sql);
    assert_structurally_valid(&parsed);

    assert_eq!(parsed.ctes[0].id, "subquery_1");
    assert_eq!(parsed.sub_queries.len(), 1);
    assert_eq!(parsed.sub_queries[0].id, "subquery_2");
    assert!(parsed.main_query.depends_on.contains("subquery_2"));
}

#[test]
fn test_duplicate_cte_names_get_distinct_ids() {
    let parsed =
        parse_sql("WITH c AS (SELECT x FROM t1), c AS (SELECT y FROM t2) SELECT * FROM c");
    assert_structurally_valid(&parsed);

    assert_eq!(parsed.ctes.len(), 2);
    assert_ne!(parsed.ctes[0].id, parsed.ctes[1].id);
    // The first declaration wins resolution.
    assert!(parsed.main_query.depends_on.contains(&parsed.ctes[0].id));
}

#[test]
fn test_templated_reference_matches_literal() {
    let parsed =
        parse_sql("WITH base_table AS (SELECT id FROM dwd_x) SELECT * FROM ${base_table}");
    assert!(parsed.main_query.depends_on.contains("base_table"));
    assert!(parsed.main_query.tables[0].classification.is_none());
}

#[test]
fn test_schema_qualified_table() {
    let parsed = parse_sql("SELECT * FROM warehouse.dwd_orders o");
    let table = &parsed.main_query.tables[0];
    assert_eq!(table.schema.as_deref(), Some("warehouse"));
    assert_eq!(table.table_name, "dwd_orders");
    assert_eq!(table.alias.as_deref(), Some("o"));
    assert_eq!(table.classification, Some(TableClass::Fact));
}

#[test]
fn test_keyword_is_not_an_alias() {
    let parsed = parse_sql("SELECT * FROM t1 WHERE x = 1");
    assert_eq!(parsed.main_query.tables[0].alias, None);
}

#[test]
fn test_malformed_inputs_degrade() {
    let parsed = parse_sql("select a from (select b from t");
    assert!(parsed.main_query.tables.is_empty());
    assert_eq!(parsed.main_query.fields.len(), 1);

    let parsed = parse_sql("select * from a join");
    assert_eq!(parsed.main_query.tables[0].table_name, "a");
    assert!(parsed.main_query.joins.is_empty());
}

#[test]
fn test_semicolon_in_string_does_not_split() {
    let parsed = parse_sql("select ';' as semi from t");
    assert_eq!(parsed.main_query.tables.len(), 1);
    assert_eq!(parsed.main_query.fields[0].alias, "semi");
}
