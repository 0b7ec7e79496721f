use serde::Deserialize;

/// Google service account used to mint custom tokens.
///
/// Accepts both the snake_case layout of downloaded key files and camelCase.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    #[serde(alias = "projectId")]
    pub project_id: String,
    #[serde(alias = "clientEmail")]
    pub client_email: String,
    /// PKCS#8 PEM private key.
    #[serde(alias = "privateKey")]
    pub private_key: String,
}

impl ServiceAccount {
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        client_email: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            client_email: client_email.into(),
            // Keys pasted into env vars usually carry literal `\n`.
            private_key: private_key.into().replace("\\n", "\n"),
        }
    }
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}
