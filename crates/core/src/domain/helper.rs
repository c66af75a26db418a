use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

const MAX_ROLE_TAG_LEN: usize = 32;

/// Discord snowflake of a helper, kept in its decimal string form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(DomainError::InvalidUserId(raw.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperData {
    pub user_id: UserId,
    /// Role tags in storage order. Never contains duplicates.
    pub langs: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a role mutation: the record as stored afterwards and the tags that changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    pub changes: HelperData,
    pub applied: Vec<String>,
}

impl HelperData {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, langs: Vec::new(), updated_at: Utc::now() }
    }

    pub fn has_role(&self, tag: &str) -> bool {
        self.langs.iter().any(|lang| lang == tag)
    }

    /// Appends tags that are not present yet and returns the ones that were added.
    pub fn add_roles(&mut self, tags: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for tag in tags {
            if !self.has_role(tag) {
                self.langs.push(tag.clone());
                added.push(tag.clone());
            }
        }
        if !added.is_empty() {
            self.updated_at = Utc::now();
        }
        added
    }

    /// Removes the given tags, keeping the relative order of the rest.
    pub fn remove_roles(&mut self, tags: &[String]) -> Vec<String> {
        let removed: Vec<String> =
            self.langs.iter().filter(|lang| tags.contains(lang)).cloned().collect();
        if !removed.is_empty() {
            self.langs.retain(|lang| !tags.contains(lang));
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn clear_roles(&mut self) -> Vec<String> {
        let removed = std::mem::take(&mut self.langs);
        if !removed.is_empty() {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Drops repeated tags left behind by older writers, first occurrence wins.
    pub fn dedup_roles(&mut self) {
        let mut seen = Vec::with_capacity(self.langs.len());
        self.langs.retain(|lang| {
            if seen.contains(lang) {
                false
            } else {
                seen.push(lang.clone());
                true
            }
        });
    }
}

pub fn normalize_role_tag(raw: &str) -> Result<String, DomainError> {
    let tag = raw.trim().to_ascii_lowercase();
    let valid = !tag.is_empty()
        && tag.len() <= MAX_ROLE_TAG_LEN
        && tag.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '+' || ch == '#');
    if !valid {
        return Err(DomainError::InvalidRoleTag(raw.to_owned()));
    }
    Ok(tag)
}

/// Parses a comma or whitespace separated tag list, preserving first-seen order.
pub fn parse_role_tags(input: &str) -> Result<Vec<String>, DomainError> {
    let mut tags: Vec<String> = Vec::new();
    for token in input.split(|ch: char| ch == ',' || ch.is_whitespace()) {
        if token.trim().is_empty() {
            continue;
        }
        let tag = normalize_role_tag(token)?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    if tags.is_empty() {
        return Err(DomainError::InvariantViolation("at least one role tag is required".to_owned()));
    }
    Ok(tags)
}
