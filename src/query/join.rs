use super::components::{Fragment, QueryComponents};
use crate::connection::Dialect;
use crate::core::Result;
use crate::schema::{SchemaDescriptor, SchemaRegistry};

/// Alias segment added for the record a foreign field points at.
///
/// Normally the target entity type; when the parent has several foreign
/// fields aimed at the same type the field name is appended so each join
/// gets its own alias.
pub fn link_segment(parent: &SchemaDescriptor, field: &str, target: &str) -> String {
    let same_target = parent
        .foreign_fields()
        .filter(|(_, other)| *other == target)
        .count();
    if same_target > 1 {
        format!("{}:{}", target, field)
    } else {
        target.to_string()
    }
}

/// Column alias under which a joined field comes back: `alias.field`.
pub fn column_alias(alias: &str, field: &str) -> String {
    format!("{}.{}", alias, field)
}

/// Expands foreign fields into aliased LEFT JOINs.
///
/// The root entity is aliased by its type name; each joined record is
/// aliased by its parent's alias plus a [`link_segment`]. Expansion stops
/// once the chain of joined ancestors reaches `max_depth`, so entity types
/// that reference each other still produce a finite statement.
pub struct JoinPlanner<'a> {
    registry: &'a SchemaRegistry,
    dialect: Dialect,
    database: &'a str,
    max_depth: usize,
}

impl<'a> JoinPlanner<'a> {
    pub fn new(registry: &'a SchemaRegistry, dialect: Dialect, database: &'a str, max_depth: usize) -> Self {
        Self {
            registry,
            dialect,
            database,
            max_depth,
        }
    }

    /// Columns, root table and joins for selecting `entity_type`.
    pub fn plan(&self, entity_type: &str) -> Result<QueryComponents> {
        let descriptor = self.registry.describe(entity_type)?;
        let alias = descriptor.entity_type();

        let mut components = QueryComponents::new().table(format!(
            "{} AS {}",
            self.dialect.qualified_table(self.database, descriptor.table()),
            self.dialect.quote_ident(alias)
        ));
        self.add_columns(&mut components, descriptor, alias);

        if self.max_depth > 0 {
            let mut stack = vec![alias.to_string()];
            self.expand(&mut components, descriptor, &mut stack)?;
        }

        Ok(components)
    }

    fn expand(
        &self,
        components: &mut QueryComponents,
        descriptor: &SchemaDescriptor,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        let parent_alias = match stack.last() {
            Some(alias) => alias.clone(),
            None => return Ok(()),
        };

        for (field, target) in descriptor.foreign_fields() {
            let child = self.registry.describe(target)?;
            let child_alias = format!("{}.{}", parent_alias, link_segment(descriptor, field, target));

            self.add_columns(components, child, &child_alias);
            components.joins.push(Fragment::new(format!(
                "LEFT JOIN {} AS {} ON {} = {}",
                self.dialect.qualified_table(self.database, child.table()),
                self.dialect.quote_ident(&child_alias),
                self.dialect.column_ref(&parent_alias, field),
                self.dialect.column_ref(&child_alias, child.identifier_field()?),
            )));

            if stack.len() < self.max_depth {
                stack.push(child_alias);
                self.expand(components, child, stack)?;
                stack.pop();
            }
        }
        Ok(())
    }

    fn add_columns(&self, components: &mut QueryComponents, descriptor: &SchemaDescriptor, alias: &str) {
        for name in descriptor.field_names() {
            components.columns.push(format!(
                "{} AS {}",
                self.dialect.column_ref(alias, name),
                self.dialect.quote_ident(&column_alias(alias, name))
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register_fields(
                "post",
                [
                    ("id", FieldDescriptor::identifier()),
                    ("title", FieldDescriptor::text()),
                    ("author", FieldDescriptor::foreign("user")),
                    ("editor", FieldDescriptor::foreign("user").nullable()),
                ],
            )
            .unwrap();
        registry
            .register_fields(
                "user",
                [
                    ("id", FieldDescriptor::identifier()),
                    ("name", FieldDescriptor::text()),
                    ("team", FieldDescriptor::foreign("team").nullable()),
                ],
            )
            .unwrap();
        registry
            .register_fields(
                "team",
                [
                    ("id", FieldDescriptor::identifier()),
                    ("lead", FieldDescriptor::foreign("user").nullable()),
                ],
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_root_only_at_depth_zero() {
        let registry = registry();
        let components = JoinPlanner::new(&registry, Dialect::Sqlite, "app", 0).plan("post").unwrap();
        assert!(components.joins.is_empty());
        assert_eq!(components.tables, ["\"app\".\"post\" AS \"post\""]);
        assert_eq!(components.columns[1], "\"post\".\"title\" AS \"post.title\"");
    }

    #[test]
    fn test_same_target_fields_get_distinct_aliases() {
        let registry = registry();
        let components = JoinPlanner::new(&registry, Dialect::Sqlite, "app", 1).plan("post").unwrap();
        assert_eq!(components.joins.len(), 2);
        assert_eq!(
            components.joins[0].sql,
            "LEFT JOIN \"app\".\"user\" AS \"post.user:author\" ON \"post\".\"author\" = \"post.user:author\".\"id\""
        );
        assert!(components.joins[1].sql.contains("AS \"post.user:editor\""));
    }

    #[test]
    fn test_cycle_is_bounded_by_depth() {
        let registry = registry();
        let components = JoinPlanner::new(&registry, Dialect::Sqlite, "app", 2).plan("user").unwrap();
        let aliases: Vec<_> = components
            .joins
            .iter()
            .map(|j| j.sql.split(" AS ").nth(1).unwrap_or_default().split(' ').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(aliases, ["\"user.team\"", "\"user.team.user\""]);
    }
}
