use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::ValidationError;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

text_enum!(TaskCategory {
    Mental => "mental",
    Physical => "physical",
    Educational => "educational",
    Fun => "fun",
});

text_enum!(TaskPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(Recurring {
    None => "none",
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    /// Minutes.
    pub time_allocation: Option<i32>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub recurring: Recurring,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: TaskCategory,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    #[serde(default)]
    pub time_allocation: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default = "default_recurring")]
    pub recurring: Recurring,
    #[serde(default)]
    pub completed: bool,
}

fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

fn default_recurring() -> Recurring {
    Recurring::None
}

impl NewTask {
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(ValidationError::field("name", "must not be empty"));
        }
        if matches!(self.time_allocation, Some(m) if m <= 0) {
            return Err(ValidationError::field(
                "timeAllocation",
                "must be a positive number of minutes",
            ));
        }
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(self)
    }
}

/// Fields left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<TaskCategory>,
    pub priority: Option<TaskPriority>,
    pub time_allocation: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub recurring: Option<Recurring>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn validated(mut self) -> Result<Self, ValidationError> {
        if let Some(name) = self.name.take() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ValidationError::field("name", "must not be empty"));
            }
            self.name = Some(name);
        }
        if matches!(self.time_allocation, Some(m) if m <= 0) {
            return Err(ValidationError::field(
                "timeAllocation",
                "must be a positive number of minutes",
            ));
        }
        Ok(self)
    }

    pub fn apply_to(&self, task: &mut Task, now: OffsetDateTime) {
        if let Some(v) = &self.name {
            task.name = v.clone();
        }
        if let Some(v) = &self.description {
            task.description = Some(v.clone());
        }
        if let Some(v) = self.category {
            task.category = v;
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.time_allocation {
            task.time_allocation = Some(v);
        }
        if let Some(v) = self.due_date {
            task.due_date = Some(v);
        }
        if let Some(v) = self.recurring {
            task.recurring = v;
        }
        if let Some(v) = self.completed {
            task.completed = v;
        }
        task.updated_at = now;
    }
}
