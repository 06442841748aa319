//! Project management calls.

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{
    routes, CreateProjectRequest, DeleteProjectRequest, Project, UpdateProjectRequest,
};
use crate::transport::{send_request, Transport};

/// Create, update, and delete projects over a transport.
///
/// Each call connects first if needed.
pub struct ProjectClient<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> ProjectClient<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub async fn create_project(&self, request: &CreateProjectRequest) -> Result<Project> {
        self.transport.connect().await?;
        let project: Project =
            send_request(self.transport.as_ref(), routes::PROJECT_CREATE, request).await?;
        tracing::info!(project = %project.id, "Project created");
        Ok(project)
    }

    pub async fn update_project(&self, request: &UpdateProjectRequest) -> Result<Project> {
        self.transport.connect().await?;
        send_request(self.transport.as_ref(), routes::PROJECT_UPDATE, request).await
    }

    pub async fn delete_project(&self, request: &DeleteProjectRequest) -> Result<Project> {
        self.transport.connect().await?;
        let project: Project =
            send_request(self.transport.as_ref(), routes::PROJECT_DELETE, request).await?;
        tracing::info!(project = %project.id, "Project deleted");
        Ok(project)
    }
}
