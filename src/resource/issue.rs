//! Redmine issues.

use tracing::debug;

use super::{Manager, Project, ProjectKind, Relation, Resource, ResourceKind};
use crate::api::{ApiError, ResourceNames, Result};

/// Marker for `/issues`.
#[derive(Debug, Clone, Copy)]
pub struct IssueKind;

impl ResourceKind for IssueKind {
    const NAMES: ResourceNames = ResourceNames {
        singular: "issue",
        plural: "issues",
    };
    const PATH: &'static str = "/issues";
    const LABEL: &'static str = "Issue";
    // journals are only sent on request
    const ITEM_PARAMS: &'static [(&'static str, &'static str)] = &[("include", "journals")];
}

/// A Redmine issue.
pub type Issue = Resource<IssueKind>;

impl Resource<IssueKind> {
    /// The parent issue may be absent.
    pub const PARENT: Relation = Relation::optional("parent", "parent_issue_id");

    /// Every issue belongs to a project.
    pub const PROJECT: Relation = Relation::required("project", "project_id");

    pub fn subject(&self) -> Option<&str> {
        self.text("subject")
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description")
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.related_id(Self::PARENT).ok().flatten()
    }

    pub fn project_id(&self) -> Option<u64> {
        self.related_id(Self::PROJECT).ok().flatten()
    }

    /// Fetch the parent issue, if there is one.
    pub fn parent(&self) -> Result<Option<Issue>> {
        match self.related_id(Self::PARENT)? {
            Some(id) => {
                debug!(parent_id = id, "Fetching parent issue");
                self.manager().get(id).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Fetch the project the issue belongs to.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingRelation` if the issue names no project.
    pub fn project(&self) -> Result<Project> {
        let id = self
            .related_id(Self::PROJECT)?
            .ok_or_else(|| ApiError::MissingRelation {
                relation: Self::PROJECT.name,
                resource: self.to_string(),
            })?;
        Manager::<ProjectKind>::new(self.manager().connection().clone()).get(id)
    }
}
