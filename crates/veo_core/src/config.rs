//! Migration configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::ContextKind;
use crate::error::{CoreError, CoreResult};
use crate::record::FileField;

/// Name formats used to build the title sent to the publishing service,
/// one per context kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameFormats {
    pub course: String,
    pub module: String,
    pub category: String,
    pub block: String,
    pub user: String,
}

impl Default for NameFormats {
    fn default() -> Self {
        Self {
            course: "%courseid% - %filename%".to_string(),
            module: "%moduleid% - %filename%".to_string(),
            category: "%categoryid% - %filename%".to_string(),
            block: "%blockid% - %filename%".to_string(),
            user: "%userid% - %filename%".to_string(),
        }
    }
}

impl NameFormats {
    /// Format for a context kind; the system context has none.
    pub fn for_kind(&self, kind: ContextKind) -> Option<&str> {
        match kind {
            ContextKind::Course => Some(&self.course),
            ContextKind::Module => Some(&self.module),
            ContextKind::Category => Some(&self.category),
            ContextKind::Block => Some(&self.block),
            ContextKind::User => Some(&self.user),
            ContextKind::System => None,
        }
    }
}

const DEFAULT_POLLING_INTERVAL_SECS: u64 = 10;

/// Settings consumed by the migration engine and driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Platform identifier passed through to the publishing service
    pub destination_platform: String,
    pub name_formats: NameFormats,
    /// Seconds between two status requests while waiting on the service, 0 means the default
    pub status_polling_interval_secs: u64,
    /// Seconds allowed for one upload
    pub upload_timeout_secs: u64,
    /// Cap on status requests per wait, unbounded when absent
    pub max_poll_attempts: Option<u32>,
    /// Whether the driver picks unregistered items by itself
    pub automatic_migration: bool,
    pub accepted_mime_types: Vec<String>,
    /// Fields searched for items when migrating automatically
    pub file_fields: Vec<FileField>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            destination_platform: "local".to_string(),
            name_formats: NameFormats::default(),
            status_polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            upload_timeout_secs: 3600,
            max_poll_attempts: None,
            automatic_migration: false,
            accepted_mime_types: vec!["video/mp4".to_string()],
            file_fields: Vec::new(),
        }
    }
}

impl MigrationConfig {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            destination_platform: platform.into(),
            ..Self::default()
        }
    }

    pub fn polling_interval_secs(mut self, secs: u64) -> Self {
        self.status_polling_interval_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.upload_timeout_secs = secs;
        self
    }

    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = Some(attempts);
        self
    }

    pub fn automatic(mut self, enabled: bool) -> Self {
        self.automatic_migration = enabled;
        self
    }

    pub fn accept(mut self, mime_type: impl Into<String>) -> Self {
        self.accepted_mime_types.push(mime_type.into());
        self
    }

    pub fn file_field(mut self, field: FileField) -> Self {
        self.file_fields.push(field);
        self
    }

    pub fn status_polling_interval(&self) -> Duration {
        match self.status_polling_interval_secs {
            0 => Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Whether items of this MIME type may be migrated.
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.accepted_mime_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(mime_type))
    }

    /// Check the configuration can drive a migration.
    pub fn validate(&self) -> CoreResult<()> {
        if self.destination_platform.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "destination platform is not set".to_string(),
            ));
        }
        if self.accepted_mime_types.is_empty() {
            return Err(CoreError::InvalidConfig(
                "no MIME type accepted for migration".to_string(),
            ));
        }
        if self.max_poll_attempts == Some(0) {
            return Err(CoreError::InvalidConfig(
                "max_poll_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::default();

        assert_eq!(config.status_polling_interval(), Duration::from_secs(10));
        assert_eq!(config.upload_timeout(), Duration::from_secs(3600));
        assert!(config.max_poll_attempts.is_none());
        assert!(!config.automatic_migration);
        assert!(config.accepts("video/MP4"));
        assert!(!config.accepts("audio/mpeg"));
        assert_eq!(
            config.name_formats.for_kind(ContextKind::Module),
            Some("%moduleid% - %filename%")
        );
        assert_eq!(config.name_formats.for_kind(ContextKind::System), None);
    }

    #[test]
    fn test_validate() {
        assert!(MigrationConfig::new("vimeo").validate().is_ok());
        assert!(MigrationConfig::new("  ").validate().is_err());

        let mut config = MigrationConfig::new("vimeo");
        config.accepted_mime_types.clear();
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));

        assert!(MigrationConfig::new("vimeo").max_poll_attempts(0).validate().is_err());
    }

    #[test]
    fn test_partial_config() {
        let config: MigrationConfig = serde_json::from_str(
            r#"{"destination_platform": "youtube", "status_polling_interval_secs": 2}"#,
        )
        .unwrap();

        assert_eq!(config.destination_platform, "youtube");
        assert_eq!(config.status_polling_interval_secs, 2);
        assert_eq!(config.upload_timeout_secs, 3600);
        assert_eq!(config.name_formats, NameFormats::default());
    }

    #[test]
    fn test_zero_polling_interval_uses_default() {
        let config: MigrationConfig =
            serde_json::from_str(r#"{"status_polling_interval_secs": 0}"#).unwrap();
        assert_eq!(config.status_polling_interval(), Duration::from_secs(10));

        let config = MigrationConfig::new("vimeo").polling_interval_secs(0);
        assert_eq!(config.status_polling_interval(), Duration::from_secs(10));
        assert_eq!(
            MigrationConfig::new("vimeo")
                .polling_interval_secs(3)
                .status_polling_interval(),
            Duration::from_secs(3)
        );
    }
}
