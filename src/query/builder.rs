use super::components::{Fragment, QueryComponents};
use super::statement::{
    Assignment, CreateTableStatement, DeleteStatement, InsertStatement, UpdateStatement,
};
use crate::connection::Dialect;
use crate::core::{DbError, Result, Value};

/// SQL text plus the values bound to it, ready for a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// The one place statements are assembled into SQL text.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    dialect: Dialect,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render a SELECT from its components.
    ///
    /// A full statement wins outright. Otherwise columns and tables are
    /// required, joins follow the tables verbatim, and a custom fragment
    /// ends the statement right after the joins; conditions, grouping,
    /// order and limit are only rendered when no custom fragment is set.
    pub fn select(&self, components: &QueryComponents) -> Result<BuiltQuery> {
        if let Some(full) = &components.full {
            return Ok(self.finish(full.sql.clone(), full.params.clone()));
        }

        if components.columns.is_empty() {
            return Err(DbError::QueryBuild("No columns set in query components".into()));
        }
        if components.tables.is_empty() {
            return Err(DbError::QueryBuild("No tables set in query components".into()));
        }

        let mut params = Vec::new();
        let mut sql = String::from("SELECT");
        if components.distinct {
            sql.push_str(" DISTINCT");
        }

        sql.push(' ');
        sql.push_str(&components.columns.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&components.tables.join(", "));

        for join in &components.joins {
            push_fragment(&mut sql, &mut params, " ", join);
        }

        if let Some(custom) = &components.custom {
            push_fragment(&mut sql, &mut params, " ", custom);
            return Ok(self.finish(sql, params));
        }

        for (i, condition) in components.conditions.iter().enumerate() {
            let glue = if i == 0 { " WHERE " } else { " AND " };
            push_fragment(&mut sql, &mut params, glue, condition);
        }

        if !components.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&components.groups.join(", "));
        }

        if let Some(having) = &components.having {
            push_fragment(&mut sql, &mut params, " HAVING ", having);
        }

        if !components.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&components.order.join(", "));
        }

        if let Some(limit) = components.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = components.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        Ok(self.finish(sql, params))
    }

    pub fn insert(&self, statement: &InsertStatement) -> Result<BuiltQuery> {
        let table = self.dialect.qualified_table(&statement.database, &statement.table);
        let mut params = Vec::new();

        let mut sql = if statement.values.is_empty() {
            match self.dialect {
                Dialect::MySql => format!("INSERT INTO {} () VALUES ()", table),
                Dialect::Sqlite | Dialect::Postgres => format!("INSERT INTO {} DEFAULT VALUES", table),
            }
        } else {
            let columns: Vec<String> = statement
                .values
                .iter()
                .map(|(column, _)| self.dialect.quote_ident(column))
                .collect();
            let values: Vec<String> = statement
                .values
                .iter()
                .map(|(_, assignment)| self.assignment(assignment, &mut params))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                values.join(", ")
            )
        };

        if let (Dialect::Postgres, Some(column)) = (self.dialect, &statement.returning) {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.dialect.quote_ident(column));
        }

        Ok(self.finish(sql, params))
    }

    pub fn update(&self, statement: &UpdateStatement) -> Result<BuiltQuery> {
        if statement.values.is_empty() {
            return Err(DbError::QueryBuild(format!(
                "UPDATE of '{}' sets no columns",
                statement.table
            )));
        }
        if statement.conditions.is_empty() {
            return Err(DbError::QueryBuild(format!(
                "UPDATE of '{}' has no conditions",
                statement.table
            )));
        }

        let mut params = Vec::new();
        let assignments: Vec<String> = statement
            .values
            .iter()
            .map(|(column, assignment)| {
                format!(
                    "{} = {}",
                    self.dialect.quote_ident(column),
                    self.assignment(assignment, &mut params)
                )
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.dialect.qualified_table(&statement.database, &statement.table),
            assignments.join(", ")
        );
        for (i, condition) in statement.conditions.iter().enumerate() {
            let glue = if i == 0 { " WHERE " } else { " AND " };
            push_fragment(&mut sql, &mut params, glue, condition);
        }

        Ok(self.finish(sql, params))
    }

    pub fn delete(&self, statement: &DeleteStatement) -> Result<BuiltQuery> {
        let mut params = Vec::new();
        let mut sql = format!(
            "DELETE FROM {}",
            self.dialect.qualified_table(&statement.database, &statement.table)
        );
        for (i, condition) in statement.conditions.iter().enumerate() {
            let glue = if i == 0 { " WHERE " } else { " AND " };
            push_fragment(&mut sql, &mut params, glue, condition);
        }
        Ok(self.finish(sql, params))
    }

    pub fn create_table(&self, statement: &CreateTableStatement) -> Result<BuiltQuery> {
        if statement.columns.is_empty() {
            return Err(DbError::QueryBuild(format!(
                "Table '{}' has no columns",
                statement.table
            )));
        }

        let columns = statement
            .columns
            .iter()
            .map(|(name, field)| self.dialect.column_definition(name, field))
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!(
            "CREATE TABLE {} ({})",
            self.dialect.qualified_table(&statement.database, &statement.table),
            columns.join(", ")
        );
        if self.dialect == Dialect::MySql {
            sql.push_str(" CHARSET=utf8mb4");
        }
        Ok(BuiltQuery::new(sql))
    }

    fn assignment(&self, assignment: &Assignment, params: &mut Vec<Value>) -> String {
        match assignment {
            Assignment::Bind(value) => {
                params.push(value.clone());
                "?".to_string()
            }
            Assignment::Expression(expression) => expression.clone(),
        }
    }

    fn finish(&self, sql: String, params: Vec<Value>) -> BuiltQuery {
        BuiltQuery {
            sql: self.dialect.number_placeholders(&sql),
            params,
        }
    }
}

fn push_fragment(sql: &mut String, params: &mut Vec<Value>, glue: &str, fragment: &Fragment) {
    sql.push_str(glue);
    sql.push_str(&fragment.sql);
    params.extend(fragment.params.iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(Dialect::Sqlite)
    }

    #[test]
    fn test_full_override_short_circuits() {
        let components = QueryComponents::full("SHOW TABLES").column("ignored").limit(3);
        assert_eq!(builder().select(&components).unwrap().sql, "SHOW TABLES");
    }

    #[test]
    fn test_columns_and_tables_required() {
        let no_columns = QueryComponents::new().table("t");
        let no_tables = QueryComponents::new().column("x");
        assert!(matches!(builder().select(&no_columns), Err(DbError::QueryBuild(_))));
        assert!(matches!(builder().select(&no_tables), Err(DbError::QueryBuild(_))));
    }

    #[test]
    fn test_clause_order() {
        let components = QueryComponents::new()
            .distinct()
            .column("a")
            .column("COUNT(*)")
            .table("t")
            .join(Fragment::with_params("LEFT JOIN u ON u.id = t.u AND u.x = ?", [1]))
            .condition(Fragment::with_params("a > ?", [2]))
            .condition("b IS NULL")
            .group("a")
            .having(Fragment::with_params("COUNT(*) > ?", [3]))
            .order("a DESC")
            .limit(10)
            .offset(20);

        let built = builder().select(&components).unwrap();
        assert_eq!(
            built.sql,
            "SELECT DISTINCT a, COUNT(*) FROM t LEFT JOIN u ON u.id = t.u AND u.x = ? \
             WHERE a > ? AND b IS NULL GROUP BY a HAVING COUNT(*) > ? ORDER BY a DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(built.params, [Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
    }

    #[test]
    fn test_offset_requires_limit() {
        let components = QueryComponents::new().column("x").table("t").offset(5);
        assert_eq!(builder().select(&components).unwrap().sql, "SELECT x FROM t");
    }

    #[test]
    fn test_custom_replaces_trailing_clauses() {
        let components = QueryComponents::new()
            .column("x")
            .table("t")
            .custom("JOIN y ON 1=1")
            .condition(Fragment::with_params("x = ?", [1]))
            .order("x")
            .limit(4);
        let built = builder().select(&components).unwrap();
        assert_eq!(built.sql, "SELECT x FROM t JOIN y ON 1=1");
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_postgres_numbers_placeholders() {
        let components = QueryComponents::new()
            .column("x")
            .table("t")
            .condition(Fragment::with_params("x = ?", [1]))
            .condition(Fragment::with_params("y = ?", [2]));
        let built = QueryBuilder::new(Dialect::Postgres).select(&components).unwrap();
        assert_eq!(built.sql, "SELECT x FROM t WHERE x = $1 AND y = $2");
    }

    #[test]
    fn test_insert_binds_values_and_inlines_expressions() {
        let statement = InsertStatement {
            database: "app".into(),
            table: "post".into(),
            values: vec![
                ("title".into(), Assignment::Bind(Value::from("Hello"))),
                ("created".into(), Assignment::Expression("NOW()".into())),
            ],
            returning: Some("id".into()),
        };

        let built = QueryBuilder::new(Dialect::MySql).insert(&statement).unwrap();
        assert_eq!(built.sql, "INSERT INTO `app`.`post` (`title`, `created`) VALUES (?, NOW())");
        assert_eq!(built.params, [Value::from("Hello")]);

        let built = QueryBuilder::new(Dialect::Postgres).insert(&statement).unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO \"app\".\"post\" (\"title\", \"created\") VALUES ($1, NOW()) RETURNING \"id\""
        );
    }

    #[test]
    fn test_insert_without_columns() {
        let statement = InsertStatement {
            database: "app".into(),
            table: "marker".into(),
            values: Vec::new(),
            returning: None,
        };
        assert_eq!(
            builder().insert(&statement).unwrap().sql,
            "INSERT INTO \"app\".\"marker\" DEFAULT VALUES"
        );
    }

    #[test]
    fn test_update_requires_conditions() {
        let statement = UpdateStatement {
            database: "app".into(),
            table: "post".into(),
            values: vec![("title".into(), Assignment::Bind(Value::from("x")))],
            conditions: Vec::new(),
        };
        assert!(matches!(builder().update(&statement), Err(DbError::QueryBuild(_))));

        let statement = UpdateStatement {
            conditions: vec![Fragment::with_params("\"id\" = ?", [7])],
            ..statement
        };
        let built = builder().update(&statement).unwrap();
        assert_eq!(built.sql, "UPDATE \"app\".\"post\" SET \"title\" = ? WHERE \"id\" = ?");
        assert_eq!(built.params, [Value::from("x"), Value::Integer(7)]);
    }

    #[test]
    fn test_delete_and_create_table() {
        let delete = DeleteStatement {
            database: "app".into(),
            table: "link_post_tag".into(),
            conditions: vec![Fragment::with_params("\"post_id\" = ?", [3])],
        };
        assert_eq!(
            builder().delete(&delete).unwrap().sql,
            "DELETE FROM \"app\".\"link_post_tag\" WHERE \"post_id\" = ?"
        );

        let create = CreateTableStatement {
            database: "app".into(),
            table: "tag".into(),
            columns: vec![
                ("id".into(), FieldDescriptor::identifier()),
                ("name".into(), FieldDescriptor::text()),
            ],
        };
        assert_eq!(
            builder().create_table(&create).unwrap().sql,
            "CREATE TABLE \"app\".\"tag\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT NOT NULL)"
        );
    }
}
