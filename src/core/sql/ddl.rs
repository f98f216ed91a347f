use std::collections::BTreeMap;

use super::{SqlError, quote_literal, require};

/// `CREATE TABLE <name>(<schema>) [WITH (<connector>)]`
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    name: String,
    schema: String,
    connector: Option<String>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_connector(mut self, connector: impl Into<String>) -> Self {
        self.connector = Some(connector.into());
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        let name = require(&self.name, "table name")?;
        if self.schema.trim().is_empty() {
            return Err(SqlError::MissingSchema(self.name));
        }
        let mut stmt = format!("CREATE TABLE {}({})", name, self.schema);
        if let Some(connector) = self.connector.as_deref().filter(|c| !c.is_empty()) {
            stmt.push_str(&format!(" WITH ({})", connector));
        }
        Ok(stmt)
    }
}

#[derive(Debug, Clone)]
enum Column {
    Physical { name: String, data_type: String },
    Computed { name: String, source: String },
}

/// Ordered column list of a table, optionally ending with a watermark on a
/// derived event-time column.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
    watermark: Option<String>,
    rejected_watermark: Option<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push(Column::Physical {
            name: name.into(),
            data_type: data_type.into(),
        });
        self
    }

    pub fn with_columns<I, K, V>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        columns
            .into_iter()
            .fold(self, |schema, (name, data_type)| schema.with_column(name, data_type))
    }

    /// Adds `<target> AS CAST(<raw> as TIMESTAMP(3))` and a one minute
    /// watermark on `target`. Only one watermark is allowed per schema.
    pub fn with_timestamp_field(mut self, raw: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        if self.watermark.is_some() {
            self.rejected_watermark.get_or_insert(target);
            return self;
        }
        self.columns.push(Column::Computed {
            name: target.clone(),
            source: raw.into(),
        });
        self.watermark = Some(target);
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        if let (Some(existing), Some(requested)) = (&self.watermark, self.rejected_watermark) {
            return Err(SqlError::DuplicateWatermark {
                existing: existing.clone(),
                requested,
            });
        }
        if self.columns.is_empty() {
            return Err(SqlError::EmptySchema);
        }

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|col| match col {
                Column::Physical { name, data_type } => format!("{} {}", name, data_type),
                Column::Computed { name, source } => {
                    format!("{} AS CAST({} as TIMESTAMP(3))", name, source)
                }
            })
            .collect();
        if let Some(ts) = &self.watermark {
            parts.push(format!("WATERMARK FOR {ts} AS {ts} - INTERVAL '1' minute"));
        }
        Ok(parts.join(","))
    }
}

/// The `'key' = 'value'` option list of a `WITH (...)` clause. Options render
/// in key order so equal inputs always produce identical text.
#[derive(Debug, Clone, Default)]
pub struct ConnectorBuilder {
    options: BTreeMap<String, String>,
}

impl ConnectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        if self.options.is_empty() {
            return Err(SqlError::NoConnectorOptions);
        }
        Ok(self
            .options
            .iter()
            .map(|(key, value)| format!("{} = {}", quote_literal(key), quote_literal(value)))
            .collect::<Vec<_>>()
            .join(","))
    }
}

/// `CREATE VIEW <name> AS <expression>`
#[derive(Debug, Clone, Default)]
pub struct ViewBuilder {
    name: String,
    expression: String,
}

impl ViewBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: String::new(),
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        let name = require(&self.name, "view name")?;
        let expression = require(&self.expression, "view expression")?;
        Ok(format!("CREATE VIEW {} AS {}", name, expression))
    }
}
