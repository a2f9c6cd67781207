//! Destination table description, its construction, DDL generation and provisioning.

mod builder;
mod manager;
pub mod sql;

use std::collections::HashSet;

use crate::bail;
use crate::columns::ColumnWriter;
use crate::error::{ErrorKind, SinkResult};

pub use builder::SchemaBuilder;
pub use manager::SchemaManager;

/// Engine clause used when no custom engine is configured.
pub const DEFAULT_ENGINE_CLAUSE: &str =
    "ENGINE = MergeTree\nPARTITION BY toYYYYMM(timestamp)\nORDER BY (timestamp)";

/// Storage engine of the destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TableEngine {
    /// Monthly partitioned `MergeTree` ordered by `timestamp`.
    #[default]
    Default,
    /// Raw engine clause (including `ORDER BY`, `PARTITION BY`, `TTL`), written verbatim.
    Custom(String),
}

impl TableEngine {
    pub fn clause(&self) -> &str {
        match self {
            TableEngine::Default => DEFAULT_ENGINE_CLAUSE,
            TableEngine::Custom(clause) => clause,
        }
    }
}

/// Immutable description of the destination table.
///
/// Column order is the physical order used both in DDL and in every inserted row.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub database: Option<String>,
    pub table_name: String,
    pub columns: Vec<ColumnWriter>,
    pub engine: TableEngine,
    pub comment: Option<String>,
}

impl TableSchema {
    /// `database.table` when a database is set, `table` otherwise. Unescaped.
    pub fn full_table_name(&self) -> String {
        match self.database.as_deref() {
            Some(database) => format!("{database}.{}", self.table_name),
            None => self.table_name.clone(),
        }
    }

    /// Checks the structural rules: a non-blank table name, a non-blank database when one is
    /// set, at least one column, non-blank column names and no two names equal ignoring case.
    pub fn validate(&self) -> SinkResult<()> {
        if self.table_name.trim().is_empty() {
            bail!(ErrorKind::ValidationError, "Table name must not be blank");
        }

        if self
            .database
            .as_deref()
            .is_some_and(|database| database.trim().is_empty())
        {
            bail!(
                ErrorKind::ValidationError,
                "Database name must not be blank",
                format!("table `{}` has a blank database name", self.table_name)
            );
        }

        if self.columns.is_empty() {
            bail!(
                ErrorKind::ValidationError,
                "Table schema must contain at least one column",
                format!("table `{}` has no columns", self.table_name)
            );
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for (position, column) in self.columns.iter().enumerate() {
            if column.name().trim().is_empty() {
                bail!(
                    ErrorKind::ValidationError,
                    "Column name must not be blank",
                    format!("column at position {position} has a blank name")
                );
            }

            if !seen.insert(column.name().to_lowercase()) {
                bail!(
                    ErrorKind::ValidationError,
                    "Duplicate column name",
                    format!(
                        "column `{}` appears more than once (names are compared case-insensitively)",
                        column.name()
                    )
                );
            }
        }

        Ok(())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(ColumnWriter::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::PropertyWriteMethod;

    fn schema(columns: Vec<ColumnWriter>) -> TableSchema {
        TableSchema {
            database: None,
            table_name: "logs".to_string(),
            columns,
            engine: TableEngine::Default,
            comment: None,
        }
    }

    #[test]
    fn full_table_name_includes_database() {
        let mut schema = schema(vec![ColumnWriter::timestamp(true)]);
        assert_eq!(schema.full_table_name(), "logs");

        schema.database = Some("observability".to_string());
        assert_eq!(schema.full_table_name(), "observability.logs");
    }

    #[test]
    fn duplicate_names_differing_in_case_are_rejected() {
        let schema = schema(vec![
            ColumnWriter::level(true),
            ColumnWriter::single_property("Level", PropertyWriteMethod::Raw),
        ]);

        let err = schema.validate().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.description(), "Duplicate column name");
    }

    #[test]
    fn empty_and_blank_names_are_rejected() {
        assert!(schema(vec![]).validate().is_err());
        assert!(
            schema(vec![ColumnWriter::rendered_message().with_name(" ")])
                .validate()
                .is_err()
        );

        let mut blank_table = schema(vec![ColumnWriter::timestamp(true)]);
        blank_table.table_name = "\t".to_string();
        assert!(blank_table.validate().is_err());
    }

    #[test]
    fn blank_database_is_rejected() {
        let mut schema = schema(vec![ColumnWriter::timestamp(true)]);
        schema.database = Some("  ".to_string());

        let err = schema.validate().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.description(), "Database name must not be blank");
    }

    #[test]
    fn default_engine_clause() {
        assert_eq!(
            TableEngine::Default.clause(),
            "ENGINE = MergeTree\nPARTITION BY toYYYYMM(timestamp)\nORDER BY (timestamp)"
        );
        assert_eq!(
            TableEngine::Custom("ENGINE = Memory".to_string()).clause(),
            "ENGINE = Memory"
        );
    }
}
