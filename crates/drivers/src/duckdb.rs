use std::ops::ControlFlow;

use async_trait::async_trait;
use serde::Deserialize;
use sluice_common::RequestContext;
use sqlparser::ast::{Expr, FunctionArg, FunctionArgExpr, TableFactor, Visit, Visitor};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::spec::{DriverSpec, PropertySchema, PropertyType};
use crate::{decode_props, Driver, DriverError, Properties};

const DRIVER: &str = "duckdb";

/// Object URI schemes that map to another connector when they appear in a
/// DuckDB source query.
const SCHEME_CONNECTORS: &[(&str, &str)] = &[
    ("s3://", "s3"),
    ("gs://", "gcs"),
    ("gcs://", "gcs"),
    ("az://", "azure"),
    ("azure://", "azure"),
    ("abfss://", "azure"),
    ("https://", "https"),
    ("http://", "https"),
];

#[derive(Debug, Default, Deserialize)]
struct SourceProperties {
    #[serde(default)]
    sql: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbDriver;

#[async_trait]
impl Driver for DuckDbDriver {
    fn spec(&self) -> DriverSpec {
        DriverSpec {
            display_name: "DuckDB".to_string(),
            description: "DuckDB SQL connector.".to_string(),
            source_properties: vec![
                PropertySchema::new("sql", "SQL", PropertyType::String)
                    .description("DuckDB SQL query.")
                    .placeholder("select * from read_csv('data/file.csv', header=true);")
                    .required(),
            ],
            implements_olap: true,
            ..Default::default()
        }
    }

    async fn has_anonymous_source_access(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn tertiary_source_connectors(
        &self,
        _ctx: &RequestContext,
        props: &Properties,
    ) -> Result<Vec<String>, DriverError> {
        let source: SourceProperties = decode_props(DRIVER, props)?;
        let connectors = referenced_connectors(&source.sql)?;
        debug!(?connectors, "discovered connectors in duckdb source query");
        Ok(connectors)
    }
}

/// Returns the connectors implied by object URIs that `sql` reads from, in
/// first-occurrence order.
///
/// Only table sources are considered: positional string arguments of table
/// functions such as `read_parquet('s3://...')`, and quoted table names such as
/// `"gs://bucket/file.csv"`. Literals elsewhere in the query are ignored.
pub fn referenced_connectors(sql: &str) -> Result<Vec<String>, DriverError> {
    let statements = Parser::parse_sql(&DuckDbDialect {}, sql)
        .map_err(|e| DriverError::invalid_properties(DRIVER, format!("cannot parse sql: {e}")))?;
    let mut sources = TableSources::default();
    let _ = statements.visit(&mut sources);
    Ok(sources.connectors)
}

#[derive(Default)]
struct TableSources {
    connectors: Vec<String>,
}

impl TableSources {
    fn add_literals(&mut self, expr: &Expr) {
        match expr {
            Expr::Value(value) => self.add_path(&value.to_string()),
            Expr::Array(array) => {
                for elem in &array.elem {
                    self.add_literals(elem);
                }
            }
            _ => {}
        }
    }

    fn add_path(&mut self, quoted: &str) {
        let path = quoted.trim().trim_matches(|c| c == '\'' || c == '"').to_ascii_lowercase();
        let connector = SCHEME_CONNECTORS
            .iter()
            .find(|(scheme, _)| path.starts_with(scheme))
            .map(|(_, connector)| *connector);
        if let Some(connector) = connector {
            if !self.connectors.iter().any(|c| c == connector) {
                self.connectors.push(connector.to_string());
            }
        }
    }
}

impl Visitor for TableSources {
    type Break = ();

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        if let TableFactor::Table { name, args, .. } = table_factor {
            match args {
                Some(args) => {
                    for arg in &args.args {
                        if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) = arg {
                            self.add_literals(expr);
                        }
                    }
                }
                // Unquoted names cannot contain "://", so only quoted paths match.
                None => self.add_path(&name.to_string()),
            }
        }
        ControlFlow::Continue(())
    }
}
