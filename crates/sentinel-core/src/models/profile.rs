use serde::{Deserialize, Serialize};

/// Profile of the logged-in user as returned by `/auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "phoneNumber")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default, alias = "jobTitle")]
    pub job_title: Option<String>,
}

/// Shown for a field the backend left blank
pub const NOT_PROVIDED: &str = "Not provided";

impl Profile {
    /// Label/value pairs in display order
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("Username", display(&self.username)),
            ("Email", display(&self.email)),
            ("Phone number", display(&self.phone_number)),
            ("Workplace", display(&self.workplace)),
            ("Job title", display(&self.job_title)),
        ]
    }

    /// True when no field carries a value
    pub fn is_empty(&self) -> bool {
        [
            &self.username,
            &self.email,
            &self.phone_number,
            &self.workplace,
            &self.job_title,
        ]
        .iter()
        .all(|f| f.as_deref().map(str::trim).unwrap_or_default().is_empty())
    }
}

fn display(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => v,
        _ => NOT_PROVIDED,
    }
}
