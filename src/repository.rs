//! Row-level access to the SQLite tables.
//!
//! Every function takes a borrowed [`Connection`]; callers hold the shared
//! connection lock for as long as they need a consistent view.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::{Comment, FileInfo, Note, Rating, Subject, User};

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// users

const USER_COLUMNS: &str = "id, name, email, password_hash";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id.to_string()],
        user_from_row,
    )
    .optional()
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        [email],
        user_from_row,
    )
    .optional()
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )
}

pub fn count_users(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

// subjects

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        code: row.get(0)?,
        name: row.get(1)?,
        year: row.get(2)?,
        semester: row.get(3)?,
    })
}

pub fn insert_subject(conn: &Connection, subject: &Subject) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO subjects (code, name, year, semester) VALUES (?1, ?2, ?3, ?4)",
        params![subject.code, subject.name, subject.year, subject.semester],
    )?;
    Ok(())
}

pub fn get_subject(conn: &Connection, code: &str) -> rusqlite::Result<Option<Subject>> {
    conn.query_row(
        "SELECT code, name, year, semester FROM subjects WHERE code = ?1",
        [code],
        subject_from_row,
    )
    .optional()
}

pub fn find_all_subjects(conn: &Connection) -> rusqlite::Result<Vec<Subject>> {
    let mut stmt = conn.prepare("SELECT code, name, year, semester FROM subjects ORDER BY code")?;
    let subjects = stmt.query_map([], subject_from_row)?;
    subjects.collect()
}

pub fn count_subjects(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))
}

// notes

const NOTE_COLUMNS: &str =
    "id, name, file_name, file_type, download_url, upload_date, user_id, subject_code";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        file: FileInfo {
            file_name: row.get(2)?,
            file_type: row.get(3)?,
            download_url: row.get(4)?,
        },
        upload_date: timestamp_at(row, 5)?,
        user_id: uuid_at(row, 6)?,
        subject_code: row.get(7)?,
    })
}

pub fn insert_note(conn: &Connection, note: &Note) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO notes (id, name, file_name, file_type, download_url, upload_date, user_id, subject_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            note.id.to_string(),
            note.name,
            note.file.file_name,
            note.file.file_type,
            note.file.download_url,
            timestamp(note.upload_date),
            note.user_id.to_string(),
            note.subject_code
        ],
    )?;
    Ok(())
}

pub fn get_note(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
        [id.to_string()],
        note_from_row,
    )
    .optional()
}

pub fn find_all_notes(conn: &Connection) -> rusqlite::Result<Vec<Note>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM notes ORDER BY upload_date DESC"
    ))?;
    let notes = stmt.query_map([], note_from_row)?;
    notes.collect()
}

pub fn find_notes_by_subject_code(conn: &Connection, code: &str) -> rusqlite::Result<Vec<Note>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM notes WHERE subject_code = ?1 ORDER BY upload_date DESC"
    ))?;
    let notes = stmt.query_map([code], note_from_row)?;
    notes.collect()
}

// comments

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: uuid_at(row, 0)?,
        text: row.get(1)?,
        date: timestamp_at(row, 2)?,
        user_id: uuid_at(row, 3)?,
        note_id: uuid_at(row, 4)?,
    })
}

pub fn insert_comment(conn: &Connection, comment: &Comment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO comments (id, text, date, user_id, note_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            comment.id.to_string(),
            comment.text,
            timestamp(comment.date),
            comment.user_id.to_string(),
            comment.note_id.to_string()
        ],
    )?;
    Ok(())
}

pub fn find_comments_by_note_id(conn: &Connection, note_id: Uuid) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, date, user_id, note_id FROM comments WHERE note_id = ?1 ORDER BY date",
    )?;
    let comments = stmt.query_map([note_id.to_string()], comment_from_row)?;
    comments.collect()
}

// ratings

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: uuid_at(row, 0)?,
        value: row.get(1)?,
        date: timestamp_at(row, 2)?,
        user_id: uuid_at(row, 3)?,
        note_id: uuid_at(row, 4)?,
    })
}

/// Inserts `rating`, or, when the (user, note) pair already has a row,
/// overwrites that row's value and date. Returns the row as stored, so on the
/// update path the id is the existing one rather than `rating.id`.
pub fn upsert_rating(conn: &Connection, rating: &Rating) -> rusqlite::Result<Rating> {
    conn.query_row(
        "INSERT INTO ratings (id, value, date, user_id, note_id) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (user_id, note_id) DO UPDATE SET value = excluded.value, date = excluded.date
         RETURNING id, value, date, user_id, note_id",
        params![
            rating.id.to_string(),
            rating.value,
            timestamp(rating.date),
            rating.user_id.to_string(),
            rating.note_id.to_string()
        ],
        rating_from_row,
    )
}

#[cfg(test)]
pub fn find_rating_by_user_and_note(
    conn: &Connection,
    user_id: Uuid,
    note_id: Uuid,
) -> rusqlite::Result<Option<Rating>> {
    conn.query_row(
        "SELECT id, value, date, user_id, note_id FROM ratings WHERE user_id = ?1 AND note_id = ?2",
        [user_id.to_string(), note_id.to_string()],
        rating_from_row,
    )
    .optional()
}

pub fn find_ratings_by_note_id(conn: &Connection, note_id: Uuid) -> rusqlite::Result<Vec<Rating>> {
    let mut stmt = conn.prepare(
        "SELECT id, value, date, user_id, note_id FROM ratings WHERE note_id = ?1 ORDER BY date",
    )?;
    let ratings = stmt.query_map([note_id.to_string()], rating_from_row)?;
    ratings.collect()
}
