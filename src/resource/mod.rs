//! Resource handles with deferred writes.
//!
//! A `Resource` is in one of three states:
//! - **New**: never saved, no server record;
//! - **Persisted**: backed by a decoded server record;
//! - **Deleted**: terminal, every further write or save fails.
//!
//! Writes are buffered as pending changes and sent in one call by `save`.
//! Reads see pending changes first, then the server record.

mod issue;
mod manager;
mod project;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, instrument};

pub use issue::{Issue, IssueKind};
pub use manager::Manager;
pub use project::{Project, ProjectKind};

use crate::api::{ApiError, Comment, Person, Record, ResourceNames, Response, Result, Value};

/// Static description of one resource type.
pub trait ResourceKind: 'static {
    /// Element/key names on the wire.
    const NAMES: ResourceNames;
    /// Collection path, e.g. `/issues`.
    const PATH: &'static str;
    /// Human-readable type name used in messages.
    const LABEL: &'static str;
    /// Query parameters sent when fetching a single record.
    const ITEM_PARAMS: &'static [(&'static str, &'static str)] = &[];
}

/// A link from one record to another and whether it must be present.
///
/// `name` is the nested node the server sends, `field` the flat id field
/// the server accepts on writes (e.g. `parent` / `parent_issue_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub field: &'static str,
    pub required: bool,
}

impl Relation {
    pub const fn optional(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            field,
            required: false,
        }
    }

    pub const fn required(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            field,
            required: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    New,
    Persisted,
    Deleted,
}

/// Handle to one remote record of kind `K`.
///
/// Two handles are equal when both have the same id; fetching the same
/// record twice yields two distinct handles that compare equal. Handles do
/// not coordinate with each other, the last save wins on the server.
pub struct Resource<K: ResourceKind> {
    manager: Manager<K>,
    response: Option<Response>,
    pending: HashMap<String, Value>,
    deleted: bool,
    /// Id the record had before it was deleted, kept for messages.
    deleted_id: Option<u64>,
}

impl<K: ResourceKind> Resource<K> {
    /// A New resource. Set fields, then `save` to create it.
    pub fn new(manager: Manager<K>) -> Self {
        Self {
            manager,
            response: None,
            pending: HashMap::new(),
            deleted: false,
            deleted_id: None,
        }
    }

    pub(crate) fn from_response(manager: Manager<K>, response: Response) -> Self {
        Self {
            manager,
            response: Some(response),
            pending: HashMap::new(),
            deleted: false,
            deleted_id: None,
        }
    }

    pub fn state(&self) -> ResourceState {
        if self.deleted {
            ResourceState::Deleted
        } else if self.response.is_some() {
            ResourceState::Persisted
        } else {
            ResourceState::New
        }
    }

    pub fn manager(&self) -> &Manager<K> {
        &self.manager
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// The server-assigned id. Pending writes to `id` are ignored.
    pub fn id(&self) -> Option<u64> {
        self.response
            .as_ref()
            .and_then(Response::id)
            .or(self.deleted_id)
    }

    /// Read a field: pending change, then server record, then nothing.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.pending
            .get(field)
            .or_else(|| self.response.as_ref().and_then(|r| r.get(field)))
    }

    /// Read a text field.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Buffer a change until the next `save`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Deleted` once the resource has been deleted.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        if self.deleted {
            return Err(ApiError::Deleted(self.to_string()));
        }
        self.pending.insert(field.into(), value.into());
        Ok(())
    }

    pub fn pending_changes(&self) -> &HashMap<String, Value> {
        &self.pending
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop all unsaved changes.
    pub fn discard_changes(&mut self) {
        self.pending.clear();
    }

    pub fn author(&self) -> Option<Rc<Person>> {
        self.pending_person("author")
            .unwrap_or_else(|| self.response.as_ref().and_then(Response::author))
    }

    pub fn assigned_to(&self) -> Option<Rc<Person>> {
        self.pending_person("assigned_to")
            .unwrap_or_else(|| self.response.as_ref().and_then(Response::assigned_to))
    }

    /// A buffered `<field>_id` write, resolved through the session's people.
    fn pending_person(&self, field: &str) -> Option<Option<Rc<Person>>> {
        let value = self.pending.get(&format!("{}_id", field))?;
        let people = self.manager.connection().people();
        Some(value.as_u64().and_then(|id| people.get(id)))
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.response
            .as_ref()
            .map(Response::comments)
            .unwrap_or_default()
    }

    /// Id of a related record, honouring pending writes to its field.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingRelation` when a required relation is absent.
    pub fn related_id(&self, relation: Relation) -> Result<Option<u64>> {
        let id = match self.pending.get(relation.field) {
            Some(value) => value.as_u64(),
            None => self
                .response
                .as_ref()
                .and_then(|r| r.relation_id(relation.name, relation.field)),
        };

        if id.is_none() && relation.required {
            return Err(ApiError::MissingRelation {
                relation: relation.name,
                resource: self.to_string(),
            });
        }
        Ok(id)
    }

    /// Send pending changes to the server.
    ///
    /// A New resource is created and adopts the server's record. A
    /// Persisted resource is updated and the changes are applied to the
    /// local record so reads reflect them without a refetch.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Deleted` on a deleted resource, or whatever the
    /// create/update call failed with. Pending changes are kept on failure.
    #[instrument(skip(self), fields(resource = %self))]
    pub fn save(&mut self) -> Result<()> {
        if self.deleted {
            return Err(ApiError::Deleted(self.to_string()));
        }

        let fields: Record = self
            .pending
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        match self.response.as_mut() {
            None => {
                let created = self.manager.create_response(&fields)?;
                self.response = Some(created);
            }
            Some(response) => {
                if fields.is_empty() {
                    debug!("No pending changes, skipping update");
                    return Ok(());
                }
                let id = response
                    .id()
                    .ok_or_else(|| ApiError::InvalidResponse("record has no id".to_string()))?;
                self.manager.update(id, &fields)?;

                let record = response.record_mut();
                for (field, value) in self.pending.drain() {
                    record.set(field, value);
                }
            }
        }

        self.pending.clear();
        debug!(id = ?self.id(), "Saved");
        Ok(())
    }

    /// Delete the record on the server. The handle becomes terminal.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Deleted` if already deleted and
    /// `ApiError::NotPersisted` if it was never saved.
    #[instrument(skip(self), fields(resource = %self))]
    pub fn delete(&mut self) -> Result<()> {
        if self.deleted {
            return Err(ApiError::Deleted(self.to_string()));
        }
        let id = self
            .response
            .as_ref()
            .and_then(Response::id)
            .ok_or_else(|| ApiError::NotPersisted(self.to_string()))?;

        self.manager.delete(id)?;
        self.response = None;
        self.pending.clear();
        self.deleted = true;
        self.deleted_id = Some(id);
        Ok(())
    }
}

impl<K: ResourceKind> PartialEq for Resource<K> {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<K: ResourceKind> fmt::Display for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{} #{}", K::LABEL, id),
            None => write!(f, "{} (new)", K::LABEL),
        }
    }
}

impl<K: ResourceKind> fmt::Debug for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::LABEL)
            .field("id", &self.id())
            .field("state", &self.state())
            .field("pending", &self.pending)
            .finish()
    }
}
