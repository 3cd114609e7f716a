use std::fmt::{Display, Formatter};

/// Represents table in a database, used for ddl generation
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub checks: Vec<CheckConstraint>,
    pub indexes: Vec<Index>,
}

/// Represents one column in the database table
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Varchar(u16),
    BigInt,
    TimestampTZ,
}

/// Named CHECK constraint, `expression` is raw SQL
pub struct CheckConstraint {
    pub name: String,
    pub expression: String,
}

/// Represents an index in the database table
pub struct Index {
    pub table_name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl Table {
    pub fn new(
        name: String,
        columns: Vec<Column>,
        checks: Vec<CheckConstraint>,
        indexes: Vec<Index>,
    ) -> Self {
        Self {
            name,
            columns,
            checks,
            indexes,
        }
    }
}

impl Column {
    pub fn new<T: Into<String>>(
        name: T,
        column_type: ColumnType,
        not_null: bool,
        unique: bool,
        default_value: Option<T>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null,
            unique,
            primary_key: false,
            default_value: default_value.map(T::into),
        }
    }

    pub fn primary_key<T: Into<String>>(name: T, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
            unique: false,
            primary_key: true,
            default_value: None,
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Uuid => f.write_str("UUID"),
            ColumnType::Text => f.write_str("TEXT"),
            ColumnType::Varchar(size) => write!(f, "VARCHAR({size})"),
            ColumnType::BigInt => f.write_str("BIGINT"),
            ColumnType::TimestampTZ => f.write_str("TIMESTAMPTZ"),
        }
    }
}

impl CheckConstraint {
    pub fn new<T: Into<String>>(name: T, expression: T) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }
}

impl Index {
    pub fn new<T: Into<String>>(table_name: T, columns: Vec<T>, unique: bool) -> Self {
        Self {
            table_name: table_name.into(),
            columns: columns.into_iter().map(T::into).collect(),
            unique,
        }
    }
}
