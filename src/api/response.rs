//! Decoded server records and the objects derived from them.
//!
//! A `Response` wraps one decoded record and resolves its nested relations:
//! people (author, assignee, journal users) go through a shared
//! `PersonRegistry` so the same remote user is one in-memory `Person`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::value::{Record, Value};

/// A Redmine user as referenced from another record.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    record: Record,
}

impl Person {
    pub fn new(record: Record) -> Self {
        Self { record }
    }

    pub fn id(&self) -> Option<u64> {
        self.record.id()
    }

    /// The display name, empty if the server did not send one.
    pub fn name(&self) -> &str {
        self.record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Read any other attribute of the user record.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{} (#{})", self.name(), id),
            None => f.write_str(self.name()),
        }
    }
}

/// Identity map of people keyed by remote id.
///
/// Entries are added on first sight and never evicted. The registry is
/// single-threaded; share it with `Rc` within one session.
#[derive(Debug, Default)]
pub struct PersonRegistry {
    people: RefCell<HashMap<String, Rc<Person>>>,
}

impl PersonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the registered person for this record's id, registering the
    /// record if the id is new. Records without an id are not memoized.
    pub fn resolve(&self, record: &Record) -> Rc<Person> {
        let Some(key) = record.get("id").map(|v| v.to_string()) else {
            return Rc::new(Person::new(record.clone()));
        };

        let mut people = self.people.borrow_mut();
        people
            .entry(key)
            .or_insert_with_key(|key| {
                trace!(person_id = %key, "Registering person");
                Rc::new(Person::new(record.clone()))
            })
            .clone()
    }

    /// Look up an already registered person.
    pub fn get(&self, id: u64) -> Option<Rc<Person>> {
        self.people.borrow().get(&id.to_string()).cloned()
    }

    pub fn len(&self) -> usize {
        self.people.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.borrow().is_empty()
    }
}

/// One journal entry on an issue.
#[derive(Debug, Clone)]
pub struct Comment {
    record: Record,
    user: Option<Rc<Person>>,
}

impl Comment {
    fn new(record: Record, people: &PersonRegistry) -> Self {
        let user = record
            .get("user")
            .and_then(Value::as_record)
            .map(|user| people.resolve(user));
        Self { record, user }
    }

    pub fn id(&self) -> Option<u64> {
        self.record.id()
    }

    pub fn user(&self) -> Option<&Rc<Person>> {
        self.user.as_ref()
    }

    /// The free-text body, empty for journals that only changed fields.
    pub fn notes(&self) -> &str {
        self.record
            .get("notes")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notes())
    }
}

/// One decoded record as returned by the server.
#[derive(Debug, Clone)]
pub struct Response {
    record: Record,
    people: Rc<PersonRegistry>,
}

impl Response {
    pub fn new(record: Record, people: Rc<PersonRegistry>) -> Self {
        Self { record, people }
    }

    /// Forward to the decoded record.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }

    pub fn id(&self) -> Option<u64> {
        self.record.id()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn author(&self) -> Option<Rc<Person>> {
        self.person("author")
    }

    pub fn assigned_to(&self) -> Option<Rc<Person>> {
        self.person("assigned_to")
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.relation_id("parent", "parent_issue_id")
    }

    pub fn project_id(&self) -> Option<u64> {
        self.relation_id("project", "project_id")
    }

    /// Id of a related record.
    ///
    /// `field` is the flat name the relation is written under. When the
    /// record carries it, it is authoritative: a locally applied write,
    /// including a cleared one, shadows the nested `<relation>` node.
    pub fn relation_id(&self, relation: &str, field: &str) -> Option<u64> {
        if let Some(value) = self.record.get(field) {
            return value.as_u64();
        }
        self.record
            .get(relation)
            .and_then(Value::as_record)
            .and_then(Record::id)
    }

    /// Journal entries, in server order. Records without journals have none.
    pub fn comments(&self) -> Vec<Comment> {
        let Some(journals) = self.record.get("journals") else {
            return Vec::new();
        };

        let entries: Vec<&Value> = match journals {
            Value::List(items) => items.iter().collect(),
            Value::Record(container) => match container.get("journal") {
                Some(Value::List(items)) => items.iter().collect(),
                Some(single @ Value::Record(_)) => vec![single],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        entries
            .into_iter()
            .filter_map(Value::as_record)
            .map(|journal| Comment::new(journal.clone(), &self.people))
            .collect()
    }

    /// A person relation. An applied `<field>_id` write wins and resolves
    /// through the registry; an id nobody has seen yet gives `None`.
    fn person(&self, field: &str) -> Option<Rc<Person>> {
        if let Some(value) = self.record.get(&format!("{}_id", field)) {
            return value.as_u64().and_then(|id| self.people.get(id));
        }
        self.record
            .get(field)
            .and_then(Value::as_record)
            .map(|person| self.people.resolve(person))
    }
}
