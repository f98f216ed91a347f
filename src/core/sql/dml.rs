use super::{SqlError, quote_literal, require};

/// `INSERT INTO <destination> <select-expression>`
#[derive(Debug, Clone, Default)]
pub struct InsertBuilder {
    destination: String,
    expression: String,
}

impl InsertBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination_table(mut self, table: impl Into<String>) -> Self {
        self.destination = table.into();
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        let destination = require(&self.destination, "insert destination")?;
        let expression = require(&self.expression, "insert expression")?;
        Ok(format!("INSERT INTO {} {}", destination, expression))
    }
}

/// Bundles inserts into one `EXECUTE STATEMENT SET`, which the engine runs as
/// a single job.
#[derive(Debug, Clone, Default)]
pub struct StatementSetBuilder {
    statements: Vec<String>,
}

impl StatementSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insert_statement(mut self, statement: impl Into<String>) -> Self {
        self.statements.push(statement.into());
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        if self.statements.is_empty() {
            return Err(SqlError::EmptyStatementSet);
        }
        let mut sql = String::from("EXECUTE STATEMENT SET BEGIN");
        for stmt in &self.statements {
            sql.push(' ');
            sql.push_str(stmt);
            sql.push(';');
        }
        sql.push_str(" END;");
        Ok(sql)
    }
}

/// `SET '<key>' = '<value>'`
#[derive(Debug, Clone, Default)]
pub struct SetConfigBuilder {
    key: String,
    value: String,
}

impl SetConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key = key.into();
        self.value = value.into();
        self
    }

    pub fn build(self) -> Result<String, SqlError> {
        let key = require(&self.key, "config key")?;
        Ok(format!(
            "SET {} = {}",
            quote_literal(key),
            quote_literal(&self.value)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_renders_destination_and_expression() {
        let sql = InsertBuilder::new()
            .with_expression("SELECT * FROM behavior_b1")
            .with_destination_table("behavior_sink_b1")
            .build()
            .unwrap();
        assert_eq!(sql, "INSERT INTO behavior_sink_b1 SELECT * FROM behavior_b1");
    }

    #[test]
    fn statement_set_wraps_each_insert() {
        let sql = StatementSetBuilder::new()
            .with_insert_statement("x")
            .with_insert_statement("y")
            .build()
            .unwrap();
        assert_eq!(sql, "EXECUTE STATEMENT SET BEGIN x; y; END;");
    }

    #[test]
    fn statement_set_with_one_insert() {
        let sql = StatementSetBuilder::new()
            .with_insert_statement("INSERT INTO a SELECT * FROM b")
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "EXECUTE STATEMENT SET BEGIN INSERT INTO a SELECT * FROM b; END;"
        );
    }

    #[test]
    fn empty_statement_set_is_rejected() {
        assert_eq!(
            StatementSetBuilder::new().build(),
            Err(SqlError::EmptyStatementSet)
        );
    }

    #[test]
    fn set_config_quotes_key_and_value() {
        let sql = SetConfigBuilder::new()
            .with_config("pipeline.name", "behavior_b1")
            .build()
            .unwrap();
        assert_eq!(sql, "SET 'pipeline.name' = 'behavior_b1'");
    }
}
