#![forbid(unsafe_code)]

pub mod ids {
    /// Opaque entity id (task or artifact). The store generates these, but
    /// callers echo them back over the wire, so every inbound id is
    /// re-validated before it reaches a SQL statement.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct EntityId(String);

    impl EntityId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, EntityIdError> {
            let value = value.into();
            validate_entity_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum EntityIdError {
        Empty,
        TooLong,
        InvalidChar { ch: char, index: usize },
    }

    fn validate_entity_id(value: &str) -> Result<(), EntityIdError> {
        if value.is_empty() {
            return Err(EntityIdError::Empty);
        }
        if value.len() > 128 {
            return Err(EntityIdError::TooLong);
        }
        for (index, ch) in value.chars().enumerate() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(EntityIdError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    /// Upper bound on parent-chain walks. A well-formed tree never gets
    /// close; the bound turns a corrupted chain into an error instead of a
    /// hang.
    pub const MAX_HIERARCHY_DEPTH: usize = 128;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum TaskStatus {
        Pending,
        InProgress,
        Completed,
        Blocked,
    }

    impl TaskStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                TaskStatus::Pending => "pending",
                TaskStatus::InProgress => "in-progress",
                TaskStatus::Completed => "completed",
                TaskStatus::Blocked => "blocked",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value.trim() {
                "pending" => Some(TaskStatus::Pending),
                "in-progress" => Some(TaskStatus::InProgress),
                "completed" => Some(TaskStatus::Completed),
                "blocked" => Some(TaskStatus::Blocked),
                _ => None,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ArtifactRole {
        Deliverable,
        Prerequisite,
    }

    impl ArtifactRole {
        pub fn as_str(self) -> &'static str {
            match self {
                ArtifactRole::Deliverable => "deliverable",
                ArtifactRole::Prerequisite => "prerequisite",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value.trim() {
                "deliverable" => Some(ArtifactRole::Deliverable),
                "prerequisite" => Some(ArtifactRole::Prerequisite),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ids::{EntityId, EntityIdError};
    use super::model::{ArtifactRole, TaskStatus};

    #[test]
    fn entity_id_accepts_generated_forms() {
        for raw in ["TASK-001", "ART-042", "a", "x_y.z-9"] {
            assert!(EntityId::try_new(raw).is_ok(), "{raw} must validate");
        }
    }

    #[test]
    fn entity_id_rejects_empty_and_oversized() {
        assert_eq!(EntityId::try_new(""), Err(EntityIdError::Empty));
        let long = "a".repeat(129);
        assert_eq!(EntityId::try_new(long), Err(EntityIdError::TooLong));
    }

    #[test]
    fn entity_id_rejects_sql_hostile_chars() {
        let err = EntityId::try_new("TASK 1").unwrap_err();
        assert_eq!(err, EntityIdError::InvalidChar { ch: ' ', index: 4 });
        assert!(EntityId::try_new("a'b").is_err());
        assert!(EntityId::try_new("a/b").is_err());
    }

    #[test]
    fn status_round_trips_all_variants() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Blocked,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("done"), None);
    }

    #[test]
    fn role_round_trips_and_rejects_unknown() {
        for role in [ArtifactRole::Deliverable, ArtifactRole::Prerequisite] {
            assert_eq!(ArtifactRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ArtifactRole::parse("output"), None);
    }
}
