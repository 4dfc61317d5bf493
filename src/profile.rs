use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::identity::AuthUser;
use crate::store::Document;
use crate::Result;

pub const DEFAULT_EXAM: &str = "JEE";
pub const DEFAULT_YEAR: &str = "2026";
pub const DEFAULT_EDUCATION_LEVEL: &str = "12th";
pub const DEFAULT_STUDY_HOURS: &str = "2-4";
pub const DEFAULT_LANGUAGE: &str = "English";
const FALLBACK_NAME: &str = "Student";

/// Typed view of a `users/<uid>` document. Unknown fields are ignored and
/// fields of an unexpected type read as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileRecord {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub full_name: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub target_exam: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub education_level: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub target_year: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub study_hours: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub preferred_language: Option<String>,
    #[serde(deserialize_with = "lenient_flag")]
    pub onboarding_completed: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub created_at: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub photo_base64: Option<String>,
}

/// Strings as they are, numbers and booleans as text, anything else absent.
fn lenient_text<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

/// Truthiness: `null`, `false`, `0` and `""` are false.
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ProfileRecord {
    pub fn from_document(document: Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    /// Stored full name, then the account display name, then "Student".
    pub fn display_name(&self, user: &AuthUser) -> String {
        non_empty(&self.full_name)
            .or_else(|| non_empty(&user.display_name))
            .unwrap_or(FALLBACK_NAME)
            .to_owned()
    }

    pub fn first_name(&self, user: &AuthUser) -> String {
        let name = self.display_name(user);
        name.split(' ').next().unwrap_or_default().to_owned()
    }

    /// Uploaded avatar first, then the provider photo.
    pub fn avatar_source<'a>(
        &'a self,
        user: &'a AuthUser,
    ) -> Option<&'a str> {
        non_empty(&self.photo_base64)
            .or_else(|| non_empty(&user.photo_url))
    }

    pub fn exam(&self) -> &str {
        non_empty(&self.target_exam).unwrap_or(DEFAULT_EXAM)
    }

    pub fn exam_badge(&self) -> String {
        let year = non_empty(&self.target_year).unwrap_or(DEFAULT_YEAR);
        format!("{} {}", self.exam(), year)
    }

    /// Creation date as "Month D, YYYY".
    pub fn member_since(&self) -> Option<String> {
        let created = non_empty(&self.created_at)?;
        let date = DateTime::parse_from_rfc3339(created).ok()?;
        Some(date.format("%B %-d, %Y").to_string())
    }

    pub fn apply_edit(&mut self, edit: &ProfileEdit) {
        self.full_name = Some(edit.full_name.clone());
        self.target_exam = Some(edit.target_exam.clone());
        self.education_level = Some(edit.education_level.clone());
        self.target_year = Some(edit.target_year.clone());
        self.study_hours = Some(edit.study_hours.clone());
        self.preferred_language = Some(edit.preferred_language.clone());
    }
}

/// Contents of the profile edit form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEdit {
    pub full_name: String,
    pub target_exam: String,
    pub education_level: String,
    pub target_year: String,
    pub study_hours: String,
    pub preferred_language: String,
}

impl ProfileEdit {
    /// Form contents when edit mode opens, defaults filling the gaps.
    pub fn prefilled(record: &ProfileRecord, user: &AuthUser) -> Self {
        let or = |value: &Option<String>, default: &str| {
            non_empty(value).unwrap_or(default).to_owned()
        };
        Self {
            full_name: non_empty(&record.full_name)
                .or_else(|| non_empty(&user.display_name))
                .unwrap_or_default()
                .to_owned(),
            target_exam: or(&record.target_exam, DEFAULT_EXAM),
            education_level: or(
                &record.education_level,
                DEFAULT_EDUCATION_LEVEL,
            ),
            target_year: or(&record.target_year, DEFAULT_YEAR),
            study_hours: or(&record.study_hours, DEFAULT_STUDY_HOURS),
            preferred_language: or(
                &record.preferred_language,
                DEFAULT_LANGUAGE,
            ),
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(document) => Ok(document),
            _ => Err(crate::PrepmindError::Parse),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::identity::ProviderKind;

    fn user(display_name: Option<&str>) -> AuthUser {
        AuthUser {
            uid: "u1".into(),
            email: "meera@example.com".into(),
            display_name: display_name.map(str::to_owned),
            photo_url: None,
            provider: ProviderKind::Password,
        }
    }

    #[test]
    fn reads_camel_case_document() {
        let doc = json!({
            "fullName": "Meera Nair",
            "targetExam": "NEET",
            "targetYear": "2027",
            "onboardingCompleted": true,
            "createdAt": "2025-01-05T10:20:30.000Z",
            "somethingElse": 42
        });
        let record =
            ProfileRecord::from_document(doc.as_object().cloned().unwrap())
                .unwrap();

        assert_eq!(record.full_name.as_deref(), Some("Meera Nair"));
        assert!(record.onboarding_completed);
        assert_eq!(record.exam_badge(), "NEET 2027");
        assert_eq!(record.member_since().as_deref(), Some("January 5, 2025"));
    }

    #[test]
    fn odd_field_types_do_not_fail_the_record() {
        let doc = json!({
            "fullName": ["not", "a", "name"],
            "targetYear": 2027,
            "targetExam": null,
            "onboardingCompleted": null,
            "photoBase64": {"nested": true}
        });
        let record =
            ProfileRecord::from_document(doc.as_object().cloned().unwrap())
                .unwrap();

        assert_eq!(record.full_name, None);
        assert_eq!(record.target_year.as_deref(), Some("2027"));
        assert!(!record.onboarding_completed);
        assert_eq!(record.photo_base64, None);
        assert_eq!(record.exam_badge(), "JEE 2027");

        let flagged = json!({"onboardingCompleted": 1});
        let record =
            ProfileRecord::from_document(flagged.as_object().cloned().unwrap())
                .unwrap();
        assert!(record.onboarding_completed);
    }

    #[test]
    fn name_fallbacks() {
        let empty = ProfileRecord {
            full_name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(empty.display_name(&user(None)), "Student");
        assert_eq!(empty.first_name(&user(Some("Arjun Rao"))), "Arjun");
        assert_eq!(empty.exam_badge(), "JEE 2026");
    }

    #[test]
    fn uploaded_avatar_wins_over_provider_photo() {
        let mut u = user(None);
        u.photo_url = Some("https://photos.example.com/p.jpg".into());
        let mut record = ProfileRecord::default();
        assert_eq!(
            record.avatar_source(&u),
            Some("https://photos.example.com/p.jpg")
        );

        record.photo_base64 = Some("data:image/jpeg;base64,AAAA".into());
        assert_eq!(
            record.avatar_source(&u),
            Some("data:image/jpeg;base64,AAAA")
        );
    }

    #[test]
    fn edit_form_defaults_and_document() {
        let edit = ProfileEdit::prefilled(
            &ProfileRecord::default(),
            &user(Some("Kiran")),
        );
        assert_eq!(edit.full_name, "Kiran");
        assert_eq!(edit.education_level, "12th");
        assert_eq!(edit.study_hours, "2-4");

        let doc = edit.to_document().unwrap();
        assert_eq!(doc["preferredLanguage"], json!("English"));
        assert_eq!(doc.len(), 6);
    }
}
