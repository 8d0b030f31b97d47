use std::fmt;

/// Job identity of the form `<app>-<role>.<instance>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    app: String,
    role: JobRole,
    instance: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobRole {
    Build,
    Web,
}

impl JobRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            JobRole::Build => "build",
            JobRole::Web => "web",
        }
    }
}

impl fmt::Display for JobRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl JobId {
    pub fn new(app: impl Into<String>, role: JobRole, instance: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            role,
            instance: instance.into(),
        }
    }

    /// Build identities are unique per run so two builds never collide.
    pub fn build(app: &str) -> Self {
        let token = uuid::Uuid::new_v4().simple().to_string();
        Self::new(app, JobRole::Build, &token[..12])
    }

    /// The service identity is stable and reused across deployments.
    pub fn web(app: &str) -> Self {
        Self::new(app, JobRole::Web, "1")
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.app, self.role, self.instance)
    }
}
