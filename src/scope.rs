//! Scope: the `(stanza?, application?, substance?)` triple that every engine
//! operation is evaluated against, and the canonical `(application,
//! substance)` key used to index streams and parameterization.

use serde::{Deserialize, Serialize};

/// One of the three nesting levels a [`Scope`] (and a [`crate::variables::VariableManager`]
/// table) can sit at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextLevel {
    Global,
    Stanza,
    Application,
    Substance,
}

/// Immutable `(stanza?, application?, substance?)` triple.
///
/// Invariants: a substance implies an application; an application implies a
/// stanza. Scopes are value objects — entering a child scope (e.g.
/// `with_application`) produces a new `Scope` rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    stanza: Option<String>,
    application: Option<String>,
    substance: Option<String>,
}

impl Scope {
    /// The empty scope: no stanza, application, or substance.
    pub fn root() -> Self {
        Self { stanza: None, application: None, substance: None }
    }

    pub fn with_stanza(stanza: impl Into<String>) -> Self {
        Self { stanza: Some(stanza.into()), application: None, substance: None }
    }

    /// Enters an application under this scope's stanza, discarding any
    /// substance already set (a child scope resets variable tables at and
    /// below its own level).
    pub fn with_application(&self, application: impl Into<String>) -> Self {
        Self {
            stanza: self.stanza.clone(),
            application: Some(application.into()),
            substance: None,
        }
    }

    /// Enters a substance under this scope's application. Panics is avoided
    /// in favor of leaving `application` as-is (callers are expected to have
    /// set it first; [`Scope::is_fully_specified`] is the guard used by the
    /// engine before any stream access).
    pub fn with_substance(&self, substance: impl Into<String>) -> Self {
        Self {
            stanza: self.stanza.clone(),
            application: self.application.clone(),
            substance: Some(substance.into()),
        }
    }

    pub fn stanza(&self) -> Option<&str> {
        self.stanza.as_deref()
    }

    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn substance(&self) -> Option<&str> {
        self.substance.as_deref()
    }

    pub fn is_fully_specified(&self) -> bool {
        self.application.is_some() && self.substance.is_some()
    }

    /// The deepest level this scope currently occupies.
    pub fn level(&self) -> ContextLevel {
        if self.substance.is_some() {
            ContextLevel::Substance
        } else if self.application.is_some() {
            ContextLevel::Application
        } else if self.stanza.is_some() {
            ContextLevel::Stanza
        } else {
            ContextLevel::Global
        }
    }

    /// Canonical `application\tsubstance` key (`-` standing in for an absent
    /// side), used to index the stream store and parameterization map.
    pub fn use_key(&self) -> UseKey {
        UseKey {
            application: self.application.clone().unwrap_or_else(|| "-".to_string()),
            substance: self.substance.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Canonical `(application, substance)` key, derived from a [`Scope`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UseKey {
    pub application: String,
    pub substance: String,
}

impl UseKey {
    pub fn new(application: impl Into<String>, substance: impl Into<String>) -> Self {
        Self { application: application.into(), substance: substance.into() }
    }
}

impl std::fmt::Display for UseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.application, self.substance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_key_placeholders_absent_sides() {
        let scope = Scope::root();
        assert_eq!(scope.use_key(), UseKey::new("-", "-"));
    }

    #[test]
    fn entering_application_resets_substance() {
        let scope = Scope::with_stanza("default").with_application("refrig").with_substance("HFC-134a");
        assert!(scope.is_fully_specified());
        let reentered = scope.with_application("foam");
        assert_eq!(reentered.substance(), None);
        assert_eq!(reentered.application(), Some("foam"));
    }

    #[test]
    fn level_tracks_deepest_set_field() {
        assert_eq!(Scope::root().level(), ContextLevel::Global);
        assert_eq!(Scope::with_stanza("default").level(), ContextLevel::Stanza);
        assert_eq!(
            Scope::with_stanza("default").with_application("refrig").level(),
            ContextLevel::Application
        );
        assert_eq!(
            Scope::with_stanza("default")
                .with_application("refrig")
                .with_substance("HFC-134a")
                .level(),
            ContextLevel::Substance
        );
    }
}
