use std::collections::HashSet;

use crate::domain::{
    content_tables,
    persistence::Persistence,
    tables::{CheckConstraint, Column, Index, Table},
};

pub trait MigrationStep {
    fn ctx(&self) -> &'static str;
    fn ddls(self) -> Vec<String>;
}

pub struct CreateTableStep {
    ddls: Vec<String>,
}

impl CreateTableStep {
    fn new(database_schema: &str, table: &Table) -> Self {
        let ddls = create_table_ddl(database_schema, table);
        Self { ddls }
    }
}

impl MigrationStep for CreateTableStep {
    fn ctx(&self) -> &'static str {
        "CREATE TABLE"
    }

    fn ddls(self) -> Vec<String> {
        self.ddls
    }
}

/// Brings the database schema in line with the tables the service needs
pub struct Migration<P: Persistence> {
    persistence: P,
}

impl<P: Persistence> Migration<P> {
    pub fn new(persistence: P) -> Self {
        Self { persistence }
    }

    pub async fn migrate(&self) -> Result<usize, anyhow::Error> {
        let actual_schema = self.persistence.load().await?;
        let steps = migration_steps(
            self.persistence.database_schema(),
            content_tables(),
            &actual_schema,
        );
        let count = steps.len();
        self.persistence.apply_migration_steps(steps).await?;
        Ok(count)
    }
}

/// Only missing tables are created, existing ones are left untouched
pub fn migration_steps(
    database_schema: &str,
    needed_schema: Vec<Table>,
    actual_schema: &HashSet<String>,
) -> Vec<CreateTableStep> {
    needed_schema
        .iter()
        .filter(|table| !actual_schema.contains(&table.name))
        .map(|table| CreateTableStep::new(database_schema, table))
        .collect()
}

fn create_table_ddl(schema: &str, table: &Table) -> Vec<String> {
    let mut columns = Vec::new();
    let mut pk_columns = Vec::new();

    for column in table.columns.iter() {
        columns.push(column_ddl(column));
        if column.primary_key {
            pk_columns.push(&column.name as &str);
        }
    }

    for check in table.checks.iter() {
        columns.push(check_ddl(check));
    }

    let columns_sql = columns.join(",\n    ");
    let pk_columns_sql = pk_columns.join(",");

    let table_ddl = format!(
        "CREATE TABLE \"{}\".\"{}\" (\n    {},\n    PRIMARY KEY({})\n)",
        schema, table.name, columns_sql, pk_columns_sql
    );

    let mut ddls = vec![table_ddl];

    for index in table.indexes.iter() {
        ddls.push(create_index_ddl(schema, index));
    }

    ddls
}

fn column_ddl(column: &Column) -> String {
    let mut sql = format!("\"{}\" {}", column.name, column.column_type);
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default_value) = &column.default_value {
        sql.push_str(format!(" DEFAULT {}", default_value).as_str());
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    sql
}

fn check_ddl(check: &CheckConstraint) -> String {
    format!("CONSTRAINT \"{}\" CHECK ({})", check.name, check.expression)
}

fn create_index_ddl(schema: &str, index: &Index) -> String {
    let columns_sql = index
        .columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE {}INDEX \"{}_{}_idx\" ON \"{}\".\"{}\" ({})",
        if index.unique { "UNIQUE " } else { "" },
        index.table_name,
        index.columns.join("_"),
        schema,
        index.table_name,
        columns_sql
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ddls_for_empty_schema() -> Vec<String> {
        migration_steps("public", content_tables(), &HashSet::new())
            .into_iter()
            .flat_map(MigrationStep::ddls)
            .collect()
    }

    #[test]
    fn test_content_table_ddl() {
        let ddls = ddls_for_empty_schema();

        let table = &ddls[0];
        assert!(table.starts_with("CREATE TABLE \"public\".\"content_records\""));
        assert!(table.contains("\"status\" VARCHAR(16) NOT NULL DEFAULT 'draft'"));
        assert!(table.contains("\"scheduled_at\" TIMESTAMPTZ"));
        assert!(table.contains("\"version\" BIGINT NOT NULL DEFAULT 1"));
        assert!(table.contains(
            "CHECK ((status = 'scheduled') = (scheduled_at IS NOT NULL))"
        ));
        assert!(table.contains("PRIMARY KEY(id)"));
    }

    #[test]
    fn test_due_index_ddl() {
        let ddls = ddls_for_empty_schema();

        assert_eq!(
            ddls[1],
            "CREATE INDEX \"content_records_status_scheduled_at_idx\" ON \"public\".\"content_records\" (\"status\", \"scheduled_at\")"
        );
    }

    #[test]
    fn test_existing_table_is_skipped() {
        let existing = HashSet::from(["content_records".to_string()]);
        let steps = migration_steps("public", content_tables(), &existing);
        assert!(steps.is_empty());
    }
}
