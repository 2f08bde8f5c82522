//! Redmine projects.

use super::{Resource, ResourceKind};
use crate::api::ResourceNames;

/// Marker for `/projects`.
#[derive(Debug, Clone, Copy)]
pub struct ProjectKind;

impl ResourceKind for ProjectKind {
    const NAMES: ResourceNames = ResourceNames {
        singular: "project",
        plural: "projects",
    };
    const PATH: &'static str = "/projects";
    const LABEL: &'static str = "Project";
}

/// A Redmine project.
pub type Project = Resource<ProjectKind>;

impl Resource<ProjectKind> {
    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    /// The short URL identifier, e.g. "ecookbook".
    pub fn identifier(&self) -> Option<&str> {
        self.text("identifier")
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.related_id(super::Relation::optional("parent", "parent_id"))
            .ok()
            .flatten()
    }
}
