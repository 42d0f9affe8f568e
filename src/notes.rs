use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::{assemble_note_view, comment_view, rating_view};
use crate::error::AppError;
use crate::models::{Comment, CommentView, NewNote, Note, NoteView, Rating, RatingView, Subject, User};
use crate::repository;
use crate::validate;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

fn require_user(conn: &Connection, id: Uuid) -> Result<User, AppError> {
    repository::get_user(conn, id)?
        .ok_or_else(|| AppError::not_found(format!("User not found with id: {id}")))
}

fn require_note(conn: &Connection, id: Uuid) -> Result<Note, AppError> {
    repository::get_note(conn, id)?
        .ok_or_else(|| AppError::not_found(format!("Note not found with id: {id}")))
}

fn require_subject(conn: &Connection, code: &str) -> Result<Subject, AppError> {
    repository::get_subject(conn, code)?
        .ok_or_else(|| AppError::not_found(format!("Subject not found with code: {code}")))
}

/// Checks everything about an upload that does not depend on the file, so a
/// doomed request is rejected before any bytes hit the disk.
pub fn check_upload(conn: &Connection, user_id: Uuid, name: &str, subject_code: &str) -> Result<(), AppError> {
    validate::required("name", name, Some(100))?;
    require_user(conn, user_id)?;
    require_subject(conn, subject_code.trim())?;
    Ok(())
}

pub fn create_note(conn: &Connection, user_id: Uuid, new_note: NewNote<'_>) -> Result<NoteView, AppError> {
    let name = validate::required("name", new_note.name, Some(100))?;
    let user = require_user(conn, user_id)?;
    let subject = require_subject(conn, new_note.subject_code.trim())?;

    let note = Note {
        id: Uuid::new_v4(),
        name: name.to_string(),
        file: new_note.file,
        upload_date: Utc::now(),
        user_id: user.id,
        subject_code: subject.code,
    };
    repository::insert_note(conn, &note)?;
    info!("Note {} uploaded by {} for {}", note.id, user.id, note.subject_code);

    assemble_note_view(conn, &note, false)
}

pub fn list_notes(conn: &Connection, subject_code: Option<&str>) -> Result<Vec<NoteView>, AppError> {
    let notes = match subject_code.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => repository::find_notes_by_subject_code(conn, code)?,
        None => repository::find_all_notes(conn)?,
    };

    notes
        .iter()
        .map(|note| assemble_note_view(conn, note, false))
        .collect()
}

pub fn note_detail(conn: &Connection, note_id: Uuid) -> Result<NoteView, AppError> {
    let note = require_note(conn, note_id)?;
    assemble_note_view(conn, &note, true)
}

pub fn add_comment(conn: &Connection, user_id: Uuid, note_id: Uuid, text: &str) -> Result<CommentView, AppError> {
    let text = validate::required("text", text, None)?;
    let user = require_user(conn, user_id)?;
    let note = require_note(conn, note_id)?;

    let comment = Comment {
        id: Uuid::new_v4(),
        text: text.to_string(),
        date: Utc::now(),
        user_id: user.id,
        note_id: note.id,
    };
    repository::insert_comment(conn, &comment)?;
    debug!("Comment {} added to note {}", comment.id, note.id);

    comment_view(conn, comment)
}

/// Records `user_id`'s rating of `note_id`. A user holds at most one rating
/// per note: a repeat submission overwrites the value and date of the
/// existing row and keeps its id.
pub fn submit_rating(conn: &Connection, user_id: Uuid, note_id: Uuid, value: i64) -> Result<Rating, AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&value) {
        return Err(AppError::validation(format!(
            "Rating value must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    let user = require_user(conn, user_id)?;
    let note = require_note(conn, note_id)?;

    // The UNIQUE (user_id, note_id) constraint turns concurrent first
    // submissions into one insert and one update.
    let rating = repository::upsert_rating(
        conn,
        &Rating {
            id: Uuid::new_v4(),
            value,
            date: Utc::now(),
            user_id: user.id,
            note_id: note.id,
        },
    )?;
    info!("User {} rated note {} with {}", user.id, note.id, rating.value);

    Ok(rating)
}

pub fn submit_rating_view(conn: &Connection, user_id: Uuid, note_id: Uuid, value: i64) -> Result<RatingView, AppError> {
    let rating = submit_rating(conn, user_id, note_id, value)?;
    rating_view(conn, rating)
}
