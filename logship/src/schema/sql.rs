//! DDL generation and escaping for ClickHouse.

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::schema::TableSchema;

fn is_plain_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escapes an identifier. Plain identifiers (`[A-Za-z_][A-Za-z0-9_]*`) are returned as-is,
/// anything else is wrapped in backticks with inner backticks doubled.
pub fn escape_identifier(identifier: &str) -> SinkResult<String> {
    if identifier.is_empty() {
        bail!(
            ErrorKind::SqlGenerationError,
            "Identifier must not be empty"
        );
    }

    if is_plain_identifier(identifier) {
        return Ok(identifier.to_string());
    }

    Ok(format!("`{}`", identifier.replace('`', "``")))
}

/// Escapes `database.table`, splitting on the first `.`. Names without a dot are escaped
/// as a single identifier.
pub fn escape_qualified_name(name: &str) -> SinkResult<String> {
    match name.split_once('.') {
        Some((database, table)) => Ok(format!(
            "{}.{}",
            escape_identifier(database)?,
            escape_identifier(table)?
        )),
        None => escape_identifier(name),
    }
}

/// Escapes the contents of a single-quoted string literal. Backslashes are doubled before
/// quotes are escaped.
pub fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds `CREATE TABLE IF NOT EXISTS` for `schema`.
///
/// Every column needs a declared type; otherwise generation fails naming all untyped columns.
pub fn create_table_sql(schema: &TableSchema) -> SinkResult<String> {
    schema.validate()?;

    let untyped: Vec<&str> = schema
        .columns
        .iter()
        .filter(|column| column.column_type().is_none())
        .map(|column| column.name())
        .collect();
    if !untyped.is_empty() {
        bail!(
            ErrorKind::SqlGenerationError,
            "Cannot generate CREATE TABLE for columns without a type",
            format!(
                "columns without a type: {}. Set a column type or manage the table externally",
                untyped.join(", ")
            )
        );
    }

    let mut column_definitions = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        // Checked above.
        let column_type = column.column_type().unwrap_or_default();
        column_definitions.push(format!(
            "    {} {}",
            escape_identifier(column.name())?,
            column_type
        ));
    }

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)\n{}",
        escape_qualified_name(&schema.full_table_name())?,
        column_definitions.join(",\n"),
        schema.engine.clause()
    );

    if let Some(comment) = schema.comment.as_deref() {
        sql.push_str(&format!("\nCOMMENT '{}'", escape_string(comment)));
    }

    Ok(sql)
}

pub fn drop_table_sql(schema: &TableSchema) -> SinkResult<String> {
    schema.validate()?;

    Ok(format!(
        "DROP TABLE IF EXISTS {}",
        escape_qualified_name(&schema.full_table_name())?
    ))
}

/// `EXISTS <table>`, answered by the server with a single `UInt8`.
pub fn exists_table_sql(schema: &TableSchema) -> SinkResult<String> {
    schema.validate()?;

    Ok(format!(
        "EXISTS {}",
        escape_qualified_name(&schema.full_table_name())?
    ))
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::columns::{ColumnWriter, PropertyWriteMethod};
    use crate::schema::SchemaBuilder;

    #[test]
    fn plain_identifiers_are_unchanged() {
        for identifier in ["timestamp", "_hidden", "Level2", "a_b_c"] {
            assert_eq!(escape_identifier(identifier).unwrap(), identifier);
        }
    }

    #[test]
    fn other_identifiers_are_backticked() {
        assert_eq!(escape_identifier("col`a").unwrap(), "`col``a`");
        assert_eq!(escape_identifier("2fast").unwrap(), "`2fast`");
        assert_eq!(escape_identifier("user id").unwrap(), "`user id`");
        assert_eq!(
            escape_identifier("").unwrap_err().kind(),
            ErrorKind::SqlGenerationError
        );
    }

    #[test]
    fn qualified_names_split_on_first_dot() {
        assert_eq!(
            escape_qualified_name("my-db.my-logs").unwrap(),
            "`my-db`.`my-logs`"
        );
        assert_eq!(escape_qualified_name("db.logs").unwrap(), "db.logs");
        assert_eq!(escape_qualified_name("a.b.c").unwrap(), "a.`b.c`");
        assert!(escape_qualified_name(".logs").is_err());
    }

    #[test]
    fn string_escaping_handles_backslash_before_quote() {
        assert_eq!(escape_string("it's"), r"it\'s");
        assert_eq!(escape_string(r"C:\logs"), r"C:\\logs");
        assert_eq!(escape_string(r"\'"), r"\\\'");
    }

    #[test]
    fn create_table_with_defaults() {
        let schema = SchemaBuilder::new("logs")
            .with_default_columns()
            .build()
            .unwrap();

        assert_snapshot!(create_table_sql(&schema).unwrap(), @r"
        CREATE TABLE IF NOT EXISTS logs (
            timestamp DateTime64(3),
            level LowCardinality(String),
            message String,
            message_template String,
            exception Nullable(String),
            properties JSON
        )
        ENGINE = MergeTree
        PARTITION BY toYYYYMM(timestamp)
        ORDER BY (timestamp)
        ");
    }

    #[test]
    fn create_table_with_database_custom_engine_and_comment() {
        let schema = SchemaBuilder::new("app-logs")
            .with_database("observability")
            .add_timestamp_column(true)
            .add_property_column("user id", Some("Nullable(Int64)"), PropertyWriteMethod::Raw)
            .with_custom_engine("ENGINE = MergeTree\nORDER BY timestamp\nTTL timestamp + INTERVAL 7 DAY")
            .with_comment("owner's table")
            .build()
            .unwrap();

        assert_snapshot!(create_table_sql(&schema).unwrap(), @r"
        CREATE TABLE IF NOT EXISTS observability.`app-logs` (
            timestamp DateTime64(3),
            `user id` Nullable(Int64)
        )
        ENGINE = MergeTree
        ORDER BY timestamp
        TTL timestamp + INTERVAL 7 DAY
        COMMENT 'owner\'s table'
        ");
    }

    #[test]
    fn create_table_names_every_untyped_column() {
        let schema = SchemaBuilder::new("logs")
            .add_timestamp_column(true)
            .add_property_column("RequestId", None, PropertyWriteMethod::ToString)
            .add_column(ColumnWriter::rendered_message().with_type(""))
            .add_column(ColumnWriter::message_template().without_type())
            .build()
            .unwrap();

        let err = create_table_sql(&schema).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SqlGenerationError);
        let detail = err.detail().unwrap();
        assert!(detail.contains("RequestId"));
        assert!(detail.contains("message, message_template"));
        assert!(!detail.contains("timestamp"));
    }

    #[test]
    fn drop_and_exists_statements() {
        let schema = SchemaBuilder::new("logs")
            .with_database("my db")
            .add_rendered_message_column()
            .build()
            .unwrap();

        assert_eq!(
            drop_table_sql(&schema).unwrap(),
            "DROP TABLE IF EXISTS `my db`.logs"
        );
        assert_eq!(exists_table_sql(&schema).unwrap(), "EXISTS `my db`.logs");
    }
}
