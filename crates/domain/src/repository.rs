use crate::shared::entity::Entity;

/// A `Repository` is the hosting-platform project that `Reminder`s
/// are delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    /// Full name of the repository, e.g. `owner/name`
    pub id: String,
    /// Reminders are never delivered to inactive repositories
    pub is_active: bool,
    /// Reference to the platform integration installed on this repository.
    /// It is exchanged for short lived access tokens when delivering.
    pub installation_id: Option<i64>,
}

impl Repository {
    pub fn new(id: String, installation_id: Option<i64>) -> Self {
        Self {
            id,
            is_active: true,
            installation_id,
        }
    }

    /// Splits the full name into owner and repository name
    pub fn owner_and_name(full_name: &str) -> Option<(&str, &str)> {
        match full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Some((owner, name)),
            _ => None,
        }
    }
}

impl Entity<String> for Repository {
    fn id(&self) -> String {
        self.id.clone()
    }
}
