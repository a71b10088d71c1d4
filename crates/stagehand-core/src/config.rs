use serde::Deserialize;

/// Fallbacks applied when a view definition leaves a field out.
///
/// Use struct update syntax to override individual fields:
///
/// ```rust,ignore
/// let defaults = ViewDefaults {
///     adapter: Some("template".into()),
///     ..ViewDefaults::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewDefaults {
    /// Holder selector (default: `"body"`).
    pub holder: Option<String>,
    /// Adapter name (default: none).
    pub adapter: Option<String>,
}

impl Default for ViewDefaults {
    fn default() -> Self {
        Self {
            holder: Some("body".to_string()),
            adapter: None,
        }
    }
}

/// Director-wide configuration.
///
/// ```rust,ignore
/// let config = DirectorConfig::from_json(r#"{
///     "view_defaults": { "adapter": "template", "holder": "#main" },
///     "static_view_defaults": { "holder": "body" }
/// }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Defaults for views.
    pub view_defaults: ViewDefaults,
    /// Defaults for static views.
    pub static_view_defaults: ViewDefaults,
}

impl DirectorConfig {
    /// Parse a JSON document.  Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_hold_in_body() {
        let config = DirectorConfig::default();
        assert_eq!(config.view_defaults.holder.as_deref(), Some("body"));
        assert_eq!(config.view_defaults.adapter, None);
        assert_eq!(config.static_view_defaults, ViewDefaults::default());
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let config = DirectorConfig::from_json(r#"{"view_defaults": {"adapter": "template"}}"#).unwrap();
        assert_eq!(
            config.view_defaults,
            ViewDefaults {
                adapter: Some("template".into()),
                ..ViewDefaults::default()
            }
        );
        assert_eq!(config.static_view_defaults.holder.as_deref(), Some("body"));
    }

    #[test]
    fn from_json_rejects_bad_types() {
        assert!(DirectorConfig::from_json(r#"{"view_defaults": {"holder": 3}}"#).is_err());
    }
}
