//! Statement sets supplied by the control plane

use serde::{Deserialize, Serialize};

/// Ordered statement templates for each lifecycle step.
///
/// The legacy single-string fields predate the list form. When one is set it
/// replaces the corresponding list; call [`Statements::normalized`] before
/// reading the lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements {
    /// Templates run by CreateUser
    #[serde(default)]
    pub creation: Vec<String>,

    /// Templates run by RevokeUser; empty selects the built-in fallback
    #[serde(default)]
    pub revocation: Vec<String>,

    /// Carried for transport compatibility
    #[serde(default)]
    pub rollback: Vec<String>,

    /// Carried for transport compatibility; RenewUser ignores it
    #[serde(default)]
    pub renewal: Vec<String>,

    /// Legacy form of `creation`
    #[serde(default, rename = "creation_statements", skip_serializing_if = "String::is_empty")]
    pub legacy_creation: String,

    /// Legacy form of `revocation`
    #[serde(default, rename = "revocation_statements", skip_serializing_if = "String::is_empty")]
    pub legacy_revocation: String,

    /// Legacy form of `rollback`
    #[serde(default, rename = "rollback_statements", skip_serializing_if = "String::is_empty")]
    pub legacy_rollback: String,

    /// Legacy form of `renewal`
    #[serde(default, rename = "renew_statements", skip_serializing_if = "String::is_empty")]
    pub legacy_renewal: String,
}

impl Statements {
    /// Statement set with only creation templates
    pub fn creation<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            creation: templates.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add revocation templates
    pub fn with_revocation<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revocation = templates.into_iter().map(Into::into).collect();
        self
    }

    /// Fold the legacy fields into the list fields.
    ///
    /// A non-empty legacy string wins over the list; a list with no legacy
    /// counterpart is mirrored back into the legacy field joined with `;`.
    pub fn normalized(mut self) -> Self {
        fold(&mut self.creation, &mut self.legacy_creation);
        fold(&mut self.revocation, &mut self.legacy_revocation);
        fold(&mut self.rollback, &mut self.legacy_rollback);
        fold(&mut self.renewal, &mut self.legacy_renewal);
        self
    }
}

fn fold(list: &mut Vec<String>, legacy: &mut String) {
    if !legacy.is_empty() {
        *list = vec![legacy.clone()];
    } else if !list.is_empty() {
        *legacy = list.join(";");
    }
}

/// Inputs to username generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameConfig {
    /// Display name of the requesting token or entity
    #[serde(default)]
    pub display_name: String,
    /// Role the credential is issued for
    #[serde(default)]
    pub role_name: String,
}

impl UsernameConfig {
    /// Create from display and role names
    pub fn new(display_name: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            role_name: role_name.into(),
        }
    }
}
