use super::{SqlError, require};

/// `SELECT <fields> FROM <table> [WHERE <predicate>]`
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    table: String,
    fields: String,
    filter: Option<String>,
}

impl SelectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn with_filter(mut self, predicate: impl Into<String>) -> Self {
        self.filter = Some(predicate.into());
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        let fields = require(&self.fields, "select fields")?;
        let table = require(&self.table, "source table")?;
        let mut sql = format!("SELECT {} FROM {}", fields, table);
        if let Some(predicate) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(require(predicate, "filter predicate")?);
        }
        Ok(sql)
    }
}

/// Tumbling-window row count grouped by an entity and an attribute key.
#[derive(Debug, Clone, Default)]
pub struct TumbleCountBuilder {
    table: String,
    entities: Vec<String>,
    attributes: Vec<String>,
    timestamp_field: String,
    minutes: i64,
}

impl TumbleCountBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_entities(mut self, fields: Vec<String>) -> Self {
        self.entities = fields;
        self
    }

    pub fn with_attributes(mut self, fields: Vec<String>) -> Self {
        self.attributes = fields;
        self
    }

    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = field.into();
        self
    }

    pub fn with_minute_interval(mut self, minutes: i64) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        let table = require(&self.table, "source table")?;
        let ts = require(&self.timestamp_field, "window timestamp field")?;
        if self.minutes < 1 {
            return Err(SqlError::InvalidWindow(self.minutes));
        }
        let entities = project(&self.entities, "entities")?;
        let attributes = project(&self.attributes, "attributes")?;
        let group_by = self
            .entities
            .iter()
            .chain(self.attributes.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");

        Ok(format!(
            "SELECT window_start,window_end,COUNT(*) AS cnt,{entities},{attributes} \
             FROM TABLE(TUMBLE(TABLE {table}, DESCRIPTOR({ts}), INTERVAL '{minutes}' MINUTES)) \
             GROUP BY window_start,window_end,{group_by}",
            minutes = self.minutes,
        ))
    }
}

// A single field is projected as-is; several are joined into one key.
fn project(fields: &[String], alias: &'static str) -> Result<String, SqlError> {
    match fields {
        [] => Err(SqlError::EmptyFieldGroup(alias)),
        [single] => Ok(format!("{} AS {}", single, alias)),
        many => Ok(format!("concat_ws('_',{}) AS {}", many.join(","), alias)),
    }
}
