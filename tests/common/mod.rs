#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use modeldb::core::ExecutionErrorKind;
use modeldb::{
    BuiltQuery, DbError, Dialect, FieldDescriptor, RelationalBackend, Result, ResultCursor,
    SchemaDescriptor, SchemaRegistry, Store, StoreConfig,
};

/// user, category, post and tag; posts and users both relate to tags.
pub fn blog_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register_fields(
            "user",
            [
                ("id", FieldDescriptor::identifier()),
                ("name", FieldDescriptor::text()),
                ("active", FieldDescriptor::boolean()),
            ],
        )
        .unwrap();
    registry
        .register_fields(
            "category",
            [
                ("id", FieldDescriptor::identifier()),
                ("title", FieldDescriptor::text()),
            ],
        )
        .unwrap();
    registry
        .register(
            SchemaDescriptor::builder("post")
                .field("id", FieldDescriptor::identifier())
                .field("title", FieldDescriptor::text())
                .field("status", FieldDescriptor::enumeration(["draft", "published"]))
                .field("token", FieldDescriptor::derived_token("title"))
                .field("body", FieldDescriptor::long_text().nullable())
                .field("author", FieldDescriptor::foreign("user").nullable())
                .field("category", FieldDescriptor::foreign("category").nullable())
                .field("created", FieldDescriptor::created_timestamp())
                .field("updated", FieldDescriptor::updated_timestamp())
                .links_with("tag")
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            SchemaDescriptor::builder("tag")
                .field("id", FieldDescriptor::identifier())
                .field("name", FieldDescriptor::text())
                .links_with("user")
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

/// Store over a private in-memory SQLite database with every table created.
pub fn blog_store() -> Store {
    blog_store_with(StoreConfig::new("blog"))
}

pub fn blog_store_with(config: StoreConfig) -> Store {
    let store = Store::connect(config, blog_registry()).unwrap();
    store.ensure_database().unwrap();
    store.create_all_storage().unwrap();
    store
}

#[derive(Default)]
pub struct MockState {
    /// Executed statements and control calls, in order.
    pub log: RefCell<Vec<String>>,
    /// Results handed out by `execute`; an empty queue yields an empty cursor.
    pub responses: RefCell<VecDeque<Result<ResultCursor>>>,
}

impl MockState {
    pub fn push_ok(&self, cursor: ResultCursor) {
        self.responses.borrow_mut().push_back(Ok(cursor));
    }

    pub fn push_unknown_database(&self) {
        self.responses.borrow_mut().push_back(Err(DbError::execution(
            ExecutionErrorKind::UnknownDatabase,
            "unknown database 'blog'",
            "SELECT",
        )));
    }

    pub fn push_error(&self, kind: ExecutionErrorKind) {
        self.responses
            .borrow_mut()
            .push_back(Err(DbError::execution(kind, "scripted failure", "SELECT")));
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log.borrow().iter().filter(|entry| entry.starts_with(prefix)).count()
    }
}

/// Backend that replays scripted results and records every call.
pub struct MockBackend {
    pub state: Rc<MockState>,
}

impl RelationalBackend for MockBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, query: &BuiltQuery) -> Result<ResultCursor> {
        self.state.log.borrow_mut().push(format!("execute:{}", query.sql));
        self.state
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(ResultCursor::empty()))
    }

    fn select_database(&self, name: &str) -> Result<()> {
        self.state.log.borrow_mut().push(format!("select:{}", name));
        Ok(())
    }

    fn database_exists(&self, _name: &str) -> Result<bool> {
        Ok(true)
    }

    fn create_database(&self, name: &str) -> Result<()> {
        self.state.log.borrow_mut().push(format!("create:{}", name));
        Ok(())
    }

    fn table_exists(&self, _database: &str, _table: &str) -> Result<bool> {
        Ok(true)
    }

    fn begin(&self) -> Result<()> {
        self.state.log.borrow_mut().push("begin".to_string());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.state.log.borrow_mut().push("commit".to_string());
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.state.log.borrow_mut().push("rollback".to_string());
        Ok(())
    }

    fn last_error_message(&self) -> Option<String> {
        None
    }

    fn query_count(&self) -> u64 {
        self.state.count("execute:") as u64
    }
}

pub fn mock_store() -> (Store, Rc<MockState>) {
    let state = Rc::new(MockState::default());
    let backend = MockBackend {
        state: Rc::clone(&state),
    };
    let store = Store::new(Box::new(backend), blog_registry(), StoreConfig::new("blog")).unwrap();
    (store, state)
}

pub fn new_post(store: &Store, title: &str) -> modeldb::RecordInstance {
    let mut post = store.new_record("post").unwrap();
    post.set("title", title).unwrap();
    post.set("status", "draft").unwrap();
    post
}
