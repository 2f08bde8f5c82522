//! Per-resource-type operations: list, filter, get, create, update, delete.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, instrument};

use super::{Resource, ResourceKind};
use crate::api::{ApiError, Connection, HttpMethod, HttpResponse, Record, Response, Result};

/// Entry point for one resource type, e.g. `redmine.issues()`.
pub struct Manager<K: ResourceKind> {
    connection: Rc<Connection>,
    _kind: PhantomData<K>,
}

impl<K: ResourceKind> Manager<K> {
    pub fn new(connection: Rc<Connection>) -> Self {
        Self {
            connection,
            _kind: PhantomData,
        }
    }

    pub fn connection(&self) -> &Rc<Connection> {
        &self.connection
    }

    /// A new, unsaved resource bound to this manager.
    pub fn new_resource(&self) -> Resource<K> {
        Resource::new(self.clone())
    }

    /// Every record the server returns for the collection.
    #[instrument(skip(self), fields(kind = K::NAMES.singular))]
    pub fn all(&self) -> Result<Vec<Resource<K>>> {
        self.list(&[])
    }

    /// Records matching `criteria`. Filtering happens on the server.
    #[instrument(skip(self, criteria), fields(kind = K::NAMES.singular))]
    pub fn filter<I, F, V>(&self, criteria: I) -> Result<Vec<Resource<K>>>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: ToString,
    {
        let params: Vec<(String, String)> = criteria
            .into_iter()
            .map(|(field, value)| (field.into(), value.to_string()))
            .collect();
        debug!(?params, "Filtering");
        self.list(&params)
    }

    /// The record with `id`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` when the server has no such record.
    #[instrument(skip(self), fields(kind = K::NAMES.singular))]
    pub fn get(&self, id: u64) -> Result<Resource<K>> {
        let path = item_path::<K>(id);
        let params = params_of(K::ITEM_PARAMS);
        let response = self.connection.send(HttpMethod::Get, &path, &params, None)?;
        let records = self.records(HttpMethod::Get, &path, &response)?;

        records
            .into_iter()
            .next()
            .map(|response| Resource::from_response(self.clone(), response))
            .ok_or_else(|| ApiError::NotFound(format!("{} #{}", K::LABEL, id)))
    }

    /// Create a record from `fields` and return it as the server stored it.
    #[instrument(skip(self, fields), fields(kind = K::NAMES.singular))]
    pub fn create(&self, fields: &Record) -> Result<Resource<K>> {
        let response = self.create_response(fields)?;
        Ok(Resource::from_response(self.clone(), response))
    }

    /// Apply `fields` to the record with `id`. Handles to that record are
    /// not refreshed.
    #[instrument(skip(self, fields), fields(kind = K::NAMES.singular))]
    pub fn update(&self, id: u64, fields: &Record) -> Result<()> {
        let path = item_path::<K>(id);
        let body = self.connection.encode(K::NAMES.singular, fields)?;
        let response = self
            .connection
            .send(HttpMethod::Put, &path, &[], Some(body))?;
        ensure_success(&path, &response)?;
        debug!(id, fields = fields.len(), "Updated");
        Ok(())
    }

    #[instrument(skip(self), fields(kind = K::NAMES.singular))]
    pub fn delete(&self, id: u64) -> Result<()> {
        let path = item_path::<K>(id);
        let response = self.connection.send(HttpMethod::Delete, &path, &[], None)?;
        ensure_success(&path, &response)?;
        debug!(id, "Deleted");
        Ok(())
    }

    pub(crate) fn create_response(&self, fields: &Record) -> Result<Response> {
        let body = self.connection.encode(K::NAMES.singular, fields)?;
        let response = self
            .connection
            .send(HttpMethod::Post, K::PATH, &[], Some(body))?;
        let created = self
            .records(HttpMethod::Post, K::PATH, &response)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!("creating a {} returned no record", K::LABEL))
            })?;
        debug!(id = ?created.id(), "Created");
        Ok(created)
    }

    fn list(&self, params: &[(String, String)]) -> Result<Vec<Resource<K>>> {
        let response = self
            .connection
            .send(HttpMethod::Get, K::PATH, params, None)?;
        let records = self.records(HttpMethod::Get, K::PATH, &response)?;
        debug!(count = records.len(), "Listed");
        Ok(records
            .into_iter()
            .map(|response| Resource::from_response(self.clone(), response))
            .collect())
    }

    /// Decoded records, or the error the status stands for.
    fn records(
        &self,
        method: HttpMethod,
        path: &str,
        response: &HttpResponse,
    ) -> Result<Vec<Response>> {
        match self.connection.decode(K::NAMES, method, response)? {
            Some(records) => Ok(records),
            None => {
                ensure_success(path, response)?;
                Ok(Vec::new())
            }
        }
    }
}

impl<K: ResourceKind> Clone for Manager<K> {
    fn clone(&self) -> Self {
        Self::new(self.connection.clone())
    }
}

impl<K: ResourceKind> fmt::Debug for Manager<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("kind", &K::LABEL)
            .field("path", &K::PATH)
            .finish()
    }
}

fn item_path<K: ResourceKind>(id: u64) -> String {
    format!("{}/{}", K::PATH, id)
}

fn params_of(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Map a non-success status to an error, using the body as context when
/// the server explained itself.
fn ensure_success(path: &str, response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let body = response.body.trim();
    let context = if body.is_empty() || body.len() > 512 {
        path.to_string()
    } else {
        format!("{}: {}", path, body)
    };
    Err(ApiError::from_status(response.status, &context))
}
