//! # sqlineage
//!
//! A library for turning a raw SQL script into a table-level lineage graph:
//! physical source tables flowing through temp tables, CTEs and nested
//! subqueries into a final output.
//!
//! # Features
//!
//! - Best-effort structural parsing: regex and state-machine based, no full
//!   SQL grammar. Malformed input degrades to a sparse result instead of an
//!   error.
//! - Temp table (`CREATE TABLE ... AS SELECT`) and `WITH` clause CTE
//!   extraction with declaration-order scoping.
//! - Recursive subquery extraction with deduplication of textually
//!   identical bodies.
//! - Simple/complex UNION classification, with complex branches promoted to
//!   their own query units.
//! - Fact/dimension table tagging and per-field transformation labels.
//! - A directed node/edge graph with join diamonds, union edges and a
//!   terminal output node, ready for an external layout engine.
//!
//! # Example
//!
//! ```rust
//! use sqlineage::{graph::assemble, parser::parse_sql};
//!
//! let sql = r#"
//!     with recent_orders as (
//!         select order_id, amount from dwd_orders where dt >= '2024-01-01'
//!     )
//!     select c.name, sum(o.amount) as total
//!     from recent_orders o
//!     join dim_customer c on o.customer_id = c.id
//!     group by c.name
//! "#;
//!
//! let parsed = parse_sql(sql);
//! assert_eq!(parsed.ctes[0].name, "recent_orders");
//! assert!(parsed.main_query.depends_on.contains("recent_orders"));
//!
//! let graph = assemble(&parsed);
//! assert!(graph.node("output").is_some());
//! ```

pub mod classify;
pub mod graph;
pub mod lex;
pub mod model;
pub mod parser;
pub mod test_utils;
