//! Turning rows into domain objects.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;

use crate::adapter::{SqlAdapter, DEFAULT_ID_FIELD};
use crate::error::{Result, SqlError};
use crate::request::SelectRequest;
use crate::value::Row;

/// Something that can be built from a result row.
pub trait Entity: Sized + 'static {
    fn from_row(row: Row) -> Result<Self>;
}

impl Entity for Row {
    fn from_row(row: Row) -> Result<Self> {
        Ok(row)
    }
}

/// Build a `Deserialize` type from a row through its JSON object view.
///
/// ```ignore
/// impl Entity for User {
///     fn from_row(row: Row) -> Result<Self> {
///         deserialize_row(row)
///     }
/// }
/// ```
pub fn deserialize_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    serde_json::from_value(row.to_json()).map_err(|e| {
        SqlError::query_build(format!(
            "Cannot build {} from row: {}",
            std::any::type_name::<T>(),
            e
        ))
    })
}

/// Last object loaded for each primary key.
pub struct IdentityCache<E> {
    entries: RefCell<HashMap<String, Rc<E>>>,
}

impl<E> Default for IdentityCache<E> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<E> IdentityCache<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Rc<E>> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, object: Rc<E>) {
        self.entries.borrow_mut().insert(key.into(), object);
    }

    pub fn invalidate(&self, key: &str) -> Option<Rc<E>> {
        self.entries.borrow_mut().remove(key)
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Where objects of one kind live: their table, id field and identity cache.
pub struct Repository<E> {
    table: String,
    id_field: String,
    cache: IdentityCache<E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_id_field(table, DEFAULT_ID_FIELD)
    }

    pub fn with_id_field(table: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_field: id_field.into(),
            cache: IdentityCache::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn cache(&self) -> &IdentityCache<E> {
        &self.cache
    }

    /// Cache key of a row; rows without a usable primary key have none.
    pub fn key_of(&self, row: &Row) -> Option<String> {
        row.get(&self.id_field)
            .filter(|v| !v.is_null())
            .map(|v| v.display())
    }

    /// Hydrate `row`. With `use_cache`, an object already loaded under the
    /// same primary key is returned instead of a new one.
    pub fn load(&self, row: Row, use_cache: bool) -> Result<Rc<E>> {
        let key = self.key_of(&row);
        if use_cache {
            if let Some(cached) = key.as_deref().and_then(|k| self.cache.get(k)) {
                return Ok(cached);
            }
        }
        let object = Rc::new(E::from_row(row)?);
        if let (true, Some(key)) = (use_cache, key) {
            self.cache.insert(key, object.clone());
        }
        Ok(object)
    }

    pub fn invalidate(&self, key: &str) -> Option<Rc<E>> {
        self.cache.invalidate(key)
    }

    /// A select over this repository's table.
    pub fn select(self: &Rc<Self>, adapter: Rc<dyn SqlAdapter>) -> SelectRequest<E> {
        SelectRequest::new(adapter, self.clone())
    }
}

/// One item yielded by a select: a hydrated object or a raw row.
#[derive(Debug)]
pub enum Record<E> {
    Object(Rc<E>),
    Row(Row),
}

impl<E> Record<E> {
    pub fn object(&self) -> Option<&Rc<E>> {
        match self {
            Record::Object(object) => Some(object),
            Record::Row(_) => None,
        }
    }

    pub fn row(&self) -> Option<&Row> {
        match self {
            Record::Row(row) => Some(row),
            Record::Object(_) => None,
        }
    }

    pub fn into_object(self) -> Option<Rc<E>> {
        match self {
            Record::Object(object) => Some(object),
            Record::Row(_) => None,
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            Record::Row(row) => Some(row),
            Record::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    impl Entity for User {
        fn from_row(row: Row) -> Result<Self> {
            deserialize_row(row)
        }
    }

    fn user_row(id: i64, name: &str) -> Row {
        Row::from_pairs([("id", Value::Int(id)), ("name", Value::from(name))])
    }

    #[test]
    fn test_deserialize_row() {
        let user = User::from_row(user_row(1, "ann")).unwrap();
        assert_eq!(user, User { id: 1, name: "ann".into() });
        let bad = User::from_row(Row::from_pairs([("id", "x")])).unwrap_err();
        assert!(bad.is_query_build());
    }

    #[test]
    fn test_cache_returns_same_object() {
        let repo: Repository<User> = Repository::new("users");
        let a = repo.load(user_row(1, "ann"), true).unwrap();
        let b = repo.load(user_row(1, "changed"), true).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(b.name, "ann");
        assert_eq!(repo.cache().len(), 1);
    }

    #[test]
    fn test_disabled_cache_builds_new_objects() {
        let repo: Repository<User> = Repository::new("users");
        let a = repo.load(user_row(1, "ann"), false).unwrap();
        let b = repo.load(user_row(1, "ann"), false).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert!(repo.cache().is_empty());
    }

    #[test]
    fn test_invalidate_drops_entry() {
        let repo: Repository<User> = Repository::new("users");
        let a = repo.load(user_row(2, "bo"), true).unwrap();
        assert!(repo.invalidate("2").is_some());
        let b = repo.load(user_row(2, "bo"), true).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_rows_without_key_are_not_cached() {
        let repo: Repository<Row> = Repository::with_id_field("t", "uid");
        repo.load(Row::from_pairs([("n", 1)]), true).unwrap();
        assert!(repo.cache().is_empty());
    }
}
