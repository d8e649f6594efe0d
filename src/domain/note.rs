//! Experiment note domain entity, its inputs and listing options.

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validation::{check_decimal, check_text, FieldErrors, NON_FIELD_ERRORS};
use crate::config::{
    DEFAULT_NOTE_STATUS, DEFAULT_PROTOCOL_VERSION, MAX_PROJECT_CODE_LENGTH, MAX_STATUS_LENGTH,
    MAX_TITLE_LENGTH,
};
use crate::errors::{AppError, AppResult};

/// Inclusive bounds of the measured values.
pub fn optical_density_range() -> (Decimal, Decimal) {
    (Decimal::ZERO, Decimal::new(1000, 2))
}

pub fn signal_level_range() -> (Decimal, Decimal) {
    (Decimal::ZERO, Decimal::new(100, 2))
}

pub fn storage_buffer_ph_range() -> (Decimal, Decimal) {
    (Decimal::ZERO, Decimal::new(1400, 2))
}

/// Fractional digits a `timestamptz` column keeps.
const STORED_SUBSEC_DIGITS: u16 = 6;

/// Reminders are compared for uniqueness, so they are kept at the precision
/// the store can represent.
fn stored_reminder(reminder: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    reminder.map(|at| at.trunc_subsecs(STORED_SUBSEC_DIGITS))
}

/// A single laboratory record owned by one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentNote {
    pub id: Uuid,
    pub code_of_project: String,
    pub title: String,
    pub comments: Option<String>,
    pub status: String,
    pub version_of_protocol: i32,
    pub latex_started_at: DateTime<Utc>,
    pub latex_completed_at: DateTime<Utc>,
    pub is_latex_loss: bool,
    pub optical_density: Decimal,
    pub signal_level: Decimal,
    pub storage_buffer_ph: Decimal,
    pub picture: Option<String>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExperimentNote {
    /// Build a note for `owner_id`; any owner the client sent is ignored.
    pub fn new(owner_id: Uuid, draft: NoteDraft, now: DateTime<Utc>) -> Self {
        let mut note = Self {
            id: Uuid::new_v4(),
            code_of_project: String::new(),
            title: String::new(),
            comments: None,
            status: DEFAULT_NOTE_STATUS.to_string(),
            version_of_protocol: DEFAULT_PROTOCOL_VERSION,
            latex_started_at: now,
            latex_completed_at: now,
            is_latex_loss: false,
            optical_density: Decimal::ZERO,
            signal_level: Decimal::ZERO,
            storage_buffer_ph: Decimal::ZERO,
            picture: None,
            reminder_date: None,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        note.replace(draft, now);
        note
    }

    /// Full replacement of every editable field.
    pub fn replace(&mut self, draft: NoteDraft, now: DateTime<Utc>) {
        self.code_of_project = draft.code_of_project;
        self.title = draft.title;
        self.comments = draft.comments;
        self.status = draft.status;
        self.version_of_protocol = draft.version_of_protocol;
        self.latex_started_at = draft.latex_started_at.unwrap_or(now);
        self.latex_completed_at = draft.latex_completed_at.unwrap_or(now);
        self.is_latex_loss = draft.is_latex_loss;
        self.optical_density = draft.optical_density;
        self.signal_level = draft.signal_level;
        self.storage_buffer_ph = draft.storage_buffer_ph;
        self.reminder_date = stored_reminder(draft.reminder_date);
        self.touch(now);
    }

    /// Partial update: only fields present in `patch` change.
    pub fn apply(&mut self, patch: NotePatch, now: DateTime<Utc>) {
        if let Some(code) = patch.code_of_project {
            self.code_of_project = code;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(comments) = patch.comments {
            self.comments = comments;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(version) = patch.version_of_protocol {
            self.version_of_protocol = version;
        }
        if let Some(started) = patch.latex_started_at {
            self.latex_started_at = started;
        }
        if let Some(completed) = patch.latex_completed_at {
            self.latex_completed_at = completed;
        }
        if let Some(loss) = patch.is_latex_loss {
            self.is_latex_loss = loss;
        }
        if let Some(value) = patch.optical_density {
            self.optical_density = value;
        }
        if let Some(value) = patch.signal_level {
            self.signal_level = value;
        }
        if let Some(value) = patch.storage_buffer_ph {
            self.storage_buffer_ph = value;
        }
        if let Some(reminder) = patch.reminder_date {
            self.reminder_date = stored_reminder(reminder);
        }
        self.touch(now);
    }

    /// Refresh `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    /// Ownership is the only authorization boundary for notes.
    pub fn ensure_owned_by(&self, owner_id: Uuid) -> AppResult<()> {
        if self.owner_id == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Record-level invariants checked before every write.
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = FieldErrors::new();

        errors.check(
            "code_of_project",
            check_text(&self.code_of_project, MAX_PROJECT_CODE_LENGTH),
        );
        errors.check("title", check_text(&self.title, MAX_TITLE_LENGTH));
        errors.check("status", check_text(&self.status, MAX_STATUS_LENGTH));
        if self.version_of_protocol < 1 {
            errors.add(
                "version_of_protocol",
                "Ensure this value is greater than or equal to 1",
            );
        }

        let (min, max) = optical_density_range();
        errors.check("optical_density", check_decimal(self.optical_density, min, max));
        let (min, max) = signal_level_range();
        errors.check("signal_level", check_decimal(self.signal_level, min, max));
        let (min, max) = storage_buffer_ph_range();
        errors.check(
            "storage_buffer_ph",
            check_decimal(self.storage_buffer_ph, min, max),
        );

        if self.latex_completed_at < self.latex_started_at {
            errors.add(
                "latex_completed_at",
                "Latex completion time cannot be earlier than its start time",
            );
        }
        if self.updated_at < self.created_at {
            errors.add(NON_FIELD_ERRORS, "Update time cannot be earlier than creation time");
        }

        errors.into_result()
    }
}

fn default_status() -> String {
    DEFAULT_NOTE_STATUS.to_string()
}

fn default_protocol_version() -> i32 {
    DEFAULT_PROTOCOL_VERSION
}

/// Distinguishes an absent field from an explicit `null`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Editable fields of a note, used for create and full update.
///
/// Server-managed fields (`id`, `owner`, timestamps, `picture`) are not part
/// of the draft, so values supplied for them are dropped during decoding.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NoteDraft {
    #[validate(length(min = 1, max = 50, message = "Project code must be 1-50 characters"))]
    pub code_of_project: String,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default = "default_status")]
    #[validate(length(min = 1, max = 16, message = "Status must be 1-16 characters"))]
    pub status: String,
    #[serde(default = "default_protocol_version")]
    #[validate(range(min = 1, message = "Protocol version must be positive"))]
    pub version_of_protocol: i32,
    #[serde(default)]
    pub latex_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latex_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_latex_loss: bool,
    #[serde(default)]
    pub optical_density: Decimal,
    #[serde(default)]
    pub signal_level: Decimal,
    #[serde(default)]
    pub storage_buffer_ph: Decimal,
    #[serde(default)]
    pub reminder_date: Option<DateTime<Utc>>,
}

impl NoteDraft {
    /// Minimal draft with every optional field at its default.
    pub fn new(code_of_project: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code_of_project: code_of_project.into(),
            title: title.into(),
            comments: None,
            status: default_status(),
            version_of_protocol: default_protocol_version(),
            latex_started_at: None,
            latex_completed_at: None,
            is_latex_loss: false,
            optical_density: Decimal::ZERO,
            signal_level: Decimal::ZERO,
            storage_buffer_ph: Decimal::ZERO,
            reminder_date: None,
        }
    }
}

/// Partial update; nullable fields accept an explicit `null` to clear them.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NotePatch {
    #[validate(length(min = 1, max = 50, message = "Project code must be 1-50 characters"))]
    pub code_of_project: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub comments: Option<Option<String>>,
    pub status: Option<String>,
    pub version_of_protocol: Option<i32>,
    pub latex_started_at: Option<DateTime<Utc>>,
    pub latex_completed_at: Option<DateTime<Utc>>,
    pub is_latex_loss: Option<bool>,
    pub optical_density: Option<Decimal>,
    pub signal_level: Option<Decimal>,
    pub storage_buffer_ph: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub reminder_date: Option<Option<DateTime<Utc>>>,
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteOrdering {
    /// Most recently updated first
    RecentlyUpdated,
    /// Owner, then updated date, then title
    Default,
}

impl NoteOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteOrdering::RecentlyUpdated => "recent",
            NoteOrdering::Default => "default",
        }
    }
}

/// Which text columns a search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    TitleOrCode,
    TitleOrComments,
}

/// Case-insensitive substring search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSearch {
    pub text: String,
    pub scope: SearchScope,
}

/// Owner-scoped listing criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub owner_id: Uuid,
    pub ordering: NoteOrdering,
    pub search: Option<NoteSearch>,
}

impl NoteQuery {
    pub fn list(owner_id: Uuid, ordering: NoteOrdering) -> Self {
        Self {
            owner_id,
            ordering,
            search: None,
        }
    }

    /// A blank search text degrades to a plain listing.
    pub fn search(owner_id: Uuid, text: &str, scope: SearchScope) -> Self {
        let text = text.trim();
        let ordering = match scope {
            SearchScope::TitleOrCode => NoteOrdering::RecentlyUpdated,
            SearchScope::TitleOrComments => NoteOrdering::Default,
        };
        Self {
            owner_id,
            ordering,
            search: (!text.is_empty()).then(|| NoteSearch {
                text: text.to_string(),
                scope,
            }),
        }
    }

    /// Whether `note` satisfies the query, matching the store's semantics.
    pub fn matches(&self, note: &ExperimentNote) -> bool {
        if note.owner_id != self.owner_id {
            return false;
        }
        let Some(search) = &self.search else {
            return true;
        };
        let needle = search.text.to_lowercase();
        let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
        contains(&note.title)
            || match search.scope {
                SearchScope::TitleOrCode => contains(&note.code_of_project),
                SearchScope::TitleOrComments => note.comments.as_deref().is_some_and(contains),
            }
    }
}

/// Count of notes touched today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeStats {
    pub count_entries: u64,
}
