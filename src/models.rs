use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub code: String,
    pub name: String,
    pub year: i32,
    pub semester: i32,
}

/// Metadata of a stored upload, as handed out to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub file_type: String,
    pub download_url: String,
}

#[derive(Debug, Clone)]
pub struct Note {
    pub id: Uuid,
    pub name: String,
    pub file: FileInfo,
    pub upload_date: DateTime<Utc>,
    pub user_id: Uuid,
    pub subject_code: String,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub date: DateTime<Utc>,
    pub user_id: Uuid,
    pub note_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct Rating {
    pub id: Uuid,
    pub value: i64,
    pub date: DateTime<Utc>,
    pub user_id: Uuid,
    pub note_id: Uuid,
}

#[derive(Debug)]
pub struct NewNote<'a> {
    pub name: &'a str,
    pub subject_code: &'a str,
    pub file: FileInfo,
}

/// Public identity of a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub text: String,
    pub date: DateTime<Utc>,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingView {
    pub id: Uuid,
    pub value: i64,
    pub date: DateTime<Utc>,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    pub id: Uuid,
    pub name: String,
    pub file: FileInfo,
    pub upload_date: DateTime<Utc>,
    pub user: UserView,
    pub subject: Subject,
    pub average_rating: f64,
    pub comment_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratings: Option<Vec<RatingView>>,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub user: UserView,
    pub token: String,
}
