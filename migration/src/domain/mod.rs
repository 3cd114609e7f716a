use inkwell_common::{
    BODY_FIELD_NAME, CONTENT_TABLE_NAME, CREATED_FIELD_NAME, DELIVERY_INTENT_FIELD_NAME,
    EXCERPT_FIELD_NAME, ID_FIELD_NAME, KIND_FIELD_NAME, PUBLISHED_FIELD_NAME,
    SCHEDULED_FIELD_NAME, STATUS_FIELD_NAME, TITLE_FIELD_NAME, UPDATED_FIELD_NAME,
    VERSION_FIELD_NAME, VISIBILITY_FIELD_NAME,
    content::{ContentStatus, DeliveryIntent, Visibility},
};

use crate::domain::tables::{CheckConstraint, Column, ColumnType, Index, Table};

pub mod migration;
pub mod persistence;
pub mod tables;

/// All tables the publishing service expects, in creation order
pub fn content_tables() -> Vec<Table> {
    vec![ContentTableBuilder::new(CONTENT_TABLE_NAME).build()]
}

struct ContentTableBuilder {
    table_name: String,
    columns: Vec<Column>,
}

impl ContentTableBuilder {
    fn new(table_name: &str) -> Self {
        let columns = vec![Column::primary_key(ID_FIELD_NAME, ColumnType::Uuid)];
        Self {
            table_name: table_name.to_owned(),
            columns,
        }
    }

    fn push(&mut self, column: Column) {
        self.columns.push(column);
    }

    fn build(mut self) -> Table {
        let draft = quoted(ContentStatus::Draft.as_str());
        let public = quoted(Visibility::Public.as_str());
        let publish_only = quoted(DeliveryIntent::PublishOnly.as_str());

        self.push(Column::new(KIND_FIELD_NAME, ColumnType::Varchar(16), true, false, None));
        self.push(Column::new(TITLE_FIELD_NAME, ColumnType::Varchar(255), true, false, None));
        self.push(Column::new(BODY_FIELD_NAME, ColumnType::Text, true, false, Some("''")));
        self.push(Column::new(EXCERPT_FIELD_NAME, ColumnType::Text, false, false, None));
        self.push(Column::new(
            STATUS_FIELD_NAME,
            ColumnType::Varchar(16),
            true,
            false,
            Some(draft.as_str()),
        ));
        self.push(Column::new(
            VISIBILITY_FIELD_NAME,
            ColumnType::Varchar(32),
            true,
            false,
            Some(public.as_str()),
        ));
        self.push(Column::new(
            DELIVERY_INTENT_FIELD_NAME,
            ColumnType::Varchar(32),
            true,
            false,
            Some(publish_only.as_str()),
        ));
        self.push(Column::new(SCHEDULED_FIELD_NAME, ColumnType::TimestampTZ, false, false, None));
        self.push(Column::new(PUBLISHED_FIELD_NAME, ColumnType::TimestampTZ, false, false, None));
        self.push(Column::new(
            CREATED_FIELD_NAME,
            ColumnType::TimestampTZ,
            true,
            false,
            Some("now()"),
        ));
        self.push(Column::new(
            UPDATED_FIELD_NAME,
            ColumnType::TimestampTZ,
            true,
            false,
            Some("now()"),
        ));
        self.push(Column::new(VERSION_FIELD_NAME, ColumnType::BigInt, true, false, Some("1")));

        // scheduled_at is present exactly while the record is scheduled
        let scheduled = quoted(ContentStatus::Scheduled.as_str());
        let schedule_check = CheckConstraint::new(
            format!("{}_{}_check", self.table_name, SCHEDULED_FIELD_NAME),
            format!(
                "({STATUS_FIELD_NAME} = {scheduled}) = ({SCHEDULED_FIELD_NAME} IS NOT NULL)"
            ),
        );

        let due_index = Index::new(
            self.table_name.as_str(),
            vec![STATUS_FIELD_NAME, SCHEDULED_FIELD_NAME],
            false,
        );

        Table::new(self.table_name, self.columns, vec![schedule_check], vec![due_index])
    }
}

fn quoted(value: &str) -> String {
    format!("'{}'", value)
}
