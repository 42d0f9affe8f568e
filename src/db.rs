use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::error::AppError;
use crate::models::{Subject, User};
use crate::repository;

pub type DbConnection = Arc<Mutex<Connection>>;

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS subjects (
        code TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        year INTEGER NOT NULL,
        semester INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_type TEXT NOT NULL,
        download_url TEXT NOT NULL,
        upload_date TEXT NOT NULL,
        user_id TEXT NOT NULL,
        subject_code TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (subject_code) REFERENCES subjects (code)
    );
    CREATE INDEX IF NOT EXISTS notes_subject_code ON notes (subject_code);

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        text TEXT NOT NULL,
        date TEXT NOT NULL,
        user_id TEXT NOT NULL,
        note_id TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (note_id) REFERENCES notes (id)
    );
    CREATE INDEX IF NOT EXISTS comments_note_id ON comments (note_id);

    CREATE TABLE IF NOT EXISTS ratings (
        id TEXT PRIMARY KEY,
        value INTEGER NOT NULL CHECK (value BETWEEN 1 AND 5),
        date TEXT NOT NULL,
        user_id TEXT NOT NULL,
        note_id TEXT NOT NULL,
        UNIQUE (user_id, note_id),
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (note_id) REFERENCES notes (id)
    );
    CREATE INDEX IF NOT EXISTS ratings_note_id ON ratings (note_id);

    CREATE TABLE IF NOT EXISTS auth_tokens (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id)
    );
";

pub fn establish_connection(path: &Path) -> rusqlite::Result<DbConnection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

#[cfg(test)]
pub fn in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory database");
    conn.execute_batch(SCHEMA).expect("apply schema");
    conn
}

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "password123";

/// Fills empty `subjects` and `users` tables with sample data.
pub fn seed(conn: &Connection, bcrypt_cost: u32) -> Result<(), AppError> {
    if repository::count_subjects(conn)? == 0 {
        let subjects = [
            ("CS101", "Introduction to Computer Science", 1, 1),
            ("MATH201", "Calculus II", 2, 1),
            ("PHYS101", "Physics I", 1, 2),
            ("ENG205", "Technical Writing", 2, 2),
        ];
        for (code, name, year, semester) in subjects {
            repository::insert_subject(
                conn,
                &Subject {
                    code: code.to_string(),
                    name: name.to_string(),
                    year,
                    semester,
                },
            )?;
        }
        info!("Seeded {} subjects", subjects.len());
    }

    if repository::count_users(conn)? == 0 {
        repository::insert_user(
            conn,
            &User {
                id: Uuid::new_v4(),
                name: "Demo User".to_string(),
                email: DEMO_EMAIL.to_string(),
                password_hash: hash_password(DEMO_PASSWORD, bcrypt_cost)?,
            },
        )?;
        info!("Seeded demo user {DEMO_EMAIL}");
    }

    Ok(())
}
