use crate::dom::SelectorError;
use crate::middleware::MiddlewareError;

/// Errors raised while constructing or driving views, adapters and directors.
///
/// Construction-time variants ([`Construction`](Error::Construction),
/// [`DuplicateName`](Error::DuplicateName), [`Resolution`](Error::Resolution))
/// are returned synchronously from factory calls, before anything touches the
/// document.  The remaining variants surface from render and sync futures and
/// indicate a bug rather than an expected access or data condition; expected
/// middleware rejections never show up here (see
/// [`RenderOutcome`](crate::view::RenderOutcome)).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required option was missing or invalid.
    #[error("can't construct {kind}: {reason}")]
    Construction {
        /// The kind of object being built (`"View"`, `"Adapter"`, ...).
        kind: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A name was registered twice in a scope that requires uniqueness.
    #[error("{kind} with name '{name}' already defined")]
    DuplicateName {
        /// The kind of object (`"Adapter"`, `"StaticView"`, `"SubView"`).
        kind: &'static str,
        /// The offending name.
        name: String,
    },

    /// A name did not resolve in the relevant registry.
    #[error("{kind} '{name}' not defined")]
    Resolution {
        /// The kind of object looked up.
        kind: &'static str,
        /// The unknown name.
        name: String,
    },

    /// The adapter failed while rendering, syncing or removing a view.
    #[error("adapter '{adapter}' failed for view '{view}': {source}")]
    Adapter {
        /// Adapter name.
        adapter: String,
        /// View name.
        view: String,
        /// Underlying adapter error.
        #[source]
        source: AdapterError,
    },

    /// Binding a declared event listener failed.
    #[error("can't bind event '{key}' for view '{view}': {reason}")]
    EventBinding {
        /// View name.
        view: String,
        /// Event key as declared (`"click .save"`).
        key: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Data passed to render or sync was not a JSON object.
    #[error("data for view '{view}' must be an object, got {found}")]
    InvalidData {
        /// View name.
        view: String,
        /// JSON type of the rejected value.
        found: &'static str,
    },

    /// A selector could not be parsed.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// A middleware pipeline failed in a way that is neither a security nor a
    /// data rejection.
    #[error("middleware failed for view '{view}': {source}")]
    Middleware {
        /// View name.
        view: String,
        /// Underlying middleware error.
        #[source]
        source: MiddlewareError,
    },
}

impl Error {
    pub(crate) fn construction(kind: &'static str, reason: impl Into<String>) -> Self {
        Error::Construction {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        Error::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn resolution(kind: &'static str, name: impl Into<String>) -> Self {
        Error::Resolution {
            kind,
            name: name.into(),
        }
    }
}

/// Errors reported by [`Adapter`](crate::adapter::Adapter) implementations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The view's template payload is not what this adapter understands.
    #[error("template is not a {expected}")]
    TemplateMismatch {
        /// Description of the expected payload type.
        expected: &'static str,
    },

    /// The view's holder could not be located in the document.
    #[error("holder '{0}' not found")]
    HolderNotFound(String),

    /// The adapter needs state from a previous render that is missing.
    #[error("view is not mounted")]
    NotMounted,

    /// Any other adapter-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_message_names_kind() {
        let err = Error::construction("View", "no template specified");
        assert_eq!(err.to_string(), "can't construct View: no template specified");
    }

    #[test]
    fn duplicate_and_resolution_messages() {
        assert_eq!(
            Error::duplicate("SubView", "child").to_string(),
            "SubView with name 'child' already defined"
        );
        assert_eq!(
            Error::resolution("Adapter", "missing").to_string(),
            "Adapter 'missing' not defined"
        );
    }

    #[test]
    fn adapter_error_exposes_source() {
        use std::error::Error as _;

        let err = Error::Adapter {
            adapter: "tag".into(),
            view: "menu".into(),
            source: AdapterError::NotMounted,
        };
        assert!(err.to_string().contains("tag"));
        assert!(err.source().is_some());
    }
}
