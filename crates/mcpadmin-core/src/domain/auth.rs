//! Authentication configuration (transient, never cached by the client)

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use zeroize::Zeroizing;

use super::{AuthPerformer, AuthType};
use crate::error::ConfigError;

/// A secret string that is wiped on drop and redacted in debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

/// Header template for per-user API-token auth
///
/// Header values reference user-supplied fields as `{field_name}`,
/// e.g. `Authorization: Bearer {api_key}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthTemplate {
    pub headers: BTreeMap<String, String>,
    pub required_fields: Vec<String>,
}

impl AuthTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_required_field(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    /// Placeholders referenced by header values, in order of first use
    pub fn placeholders(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for value in self.headers.values() {
            let mut rest = value.as_str();
            while let Some(start) = rest.find('{') {
                let after = &rest[start + 1..];
                let Some(end) = after.find('}') else { break };
                let name = after[..end].trim();
                if !name.is_empty() && seen.insert(name.to_string()) {
                    out.push(name.to_string());
                }
                rest = &after[end + 1..];
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.headers.is_empty() {
            return Err(ConfigError::InvalidAuthTemplate(
                "at least one header mapping is required".to_string(),
            ));
        }
        if let Some(name) = self.headers.keys().find(|k| k.trim().is_empty()) {
            return Err(ConfigError::InvalidAuthTemplate(format!(
                "header name '{}' is empty",
                name
            )));
        }
        if self.required_fields.is_empty() {
            return Err(ConfigError::InvalidAuthTemplate(
                "at least one required field is needed".to_string(),
            ));
        }

        let mut fields = BTreeSet::new();
        for field in &self.required_fields {
            let field = field.trim();
            if field.is_empty() {
                return Err(ConfigError::InvalidAuthTemplate(
                    "required field names must not be empty".to_string(),
                ));
            }
            if !fields.insert(field) {
                return Err(ConfigError::InvalidAuthTemplate(format!(
                    "required field '{}' is listed twice",
                    field
                )));
            }
        }

        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|p| !fields.contains(p.as_str()))
        {
            return Err(ConfigError::InvalidAuthTemplate(format!(
                "header placeholder '{{{}}}' is not a required field",
                missing
            )));
        }
        Ok(())
    }
}

/// Credentials supplied alongside an auth configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Shared secret for `ApiToken` + `Admin`
    pub api_token: Option<Secret>,
    /// Header template for `ApiToken` + `PerUser`
    pub auth_template: Option<AuthTemplate>,
    /// The configuring admin's own values for the template fields (optional)
    pub user_credentials: BTreeMap<String, Secret>,
    /// OAuth client registration; omitted when the provider supports DCR
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<Secret>,
}

impl AuthConfig {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn admin_token(token: impl Into<String>) -> Self {
        Self {
            api_token: Some(Secret::new(token)),
            ..Self::default()
        }
    }

    pub fn per_user(template: AuthTemplate) -> Self {
        Self {
            auth_template: Some(template),
            ..Self::default()
        }
    }

    pub fn oauth(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            oauth_client_id: client_id,
            oauth_client_secret: client_secret.map(Secret::new),
            ..Self::default()
        }
    }

    pub fn with_user_credential(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_credentials.insert(field.into(), Secret::new(value));
        self
    }

    /// Validate the credentials for an auth type / performer combination
    ///
    /// `performer` must already be normalized (see `McpServer::normalized_performer`).
    pub fn validate(
        &self,
        auth_type: AuthType,
        performer: Option<AuthPerformer>,
    ) -> Result<(), ConfigError> {
        match (auth_type, performer) {
            (AuthType::None, _) | (AuthType::OAuth, _) => Ok(()),
            (AuthType::ApiToken, None) => Err(ConfigError::MissingAuthPerformer),
            (AuthType::ApiToken, Some(AuthPerformer::Admin)) => match &self.api_token {
                Some(token) if !token.is_blank() => Ok(()),
                _ => Err(ConfigError::MissingApiToken),
            },
            (AuthType::ApiToken, Some(AuthPerformer::PerUser)) => {
                let template = self
                    .auth_template
                    .as_ref()
                    .ok_or(ConfigError::MissingAuthTemplate)?;
                template.validate()?;
                if let Some(unknown) = self
                    .user_credentials
                    .keys()
                    .find(|k| !template.required_fields.iter().any(|f| f.trim() == k.as_str()))
                {
                    return Err(ConfigError::InvalidAuthTemplate(format!(
                        "credential '{}' does not match any required field",
                        unknown
                    )));
                }
                Ok(())
            }
        }
    }
}
