//! Read-time aggregates over a note's comments and ratings.
//!
//! Nothing here is cached: every view recomputes its numbers from the rows
//! returned by the `find_*_by_note_id` queries.

use std::collections::HashMap;

use rusqlite::Connection;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Comment, CommentView, Note, NoteView, Rating, RatingView, UserView};
use crate::repository;

/// Arithmetic mean of the rating values, or `0.0` when there are none.
pub fn average_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let total: i64 = ratings.iter().map(|rating| rating.value).sum();
    total as f64 / ratings.len() as f64
}

pub fn comment_count(comments: &[Comment]) -> usize {
    comments.len()
}

/// Resolves users by id, asking the database at most once per id.
struct UserLookup<'c> {
    conn: &'c Connection,
    seen: HashMap<Uuid, UserView>,
}

impl<'c> UserLookup<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, id: Uuid) -> Result<UserView, AppError> {
        if let Some(user) = self.seen.get(&id) {
            return Ok(user.clone());
        }
        let user = repository::get_user(self.conn, id)?
            .map(|user| UserView::from(&user))
            .ok_or_else(|| AppError::not_found(format!("User not found with id: {id}")))?;
        self.seen.insert(id, user.clone());
        Ok(user)
    }
}

pub fn comment_view(conn: &Connection, comment: Comment) -> Result<CommentView, AppError> {
    let user = UserLookup::new(conn).get(comment.user_id)?;
    Ok(CommentView {
        id: comment.id,
        text: comment.text,
        date: comment.date,
        user,
    })
}

pub fn rating_view(conn: &Connection, rating: Rating) -> Result<RatingView, AppError> {
    let user = UserLookup::new(conn).get(rating.user_id)?;
    Ok(RatingView {
        id: rating.id,
        value: rating.value,
        date: rating.date,
        user,
    })
}

/// Builds the client-facing view of `note`. With `include_detail` the view
/// also lists every comment and rating with its author.
pub fn assemble_note_view(
    conn: &Connection,
    note: &Note,
    include_detail: bool,
) -> Result<NoteView, AppError> {
    let mut users = UserLookup::new(conn);

    let owner = users.get(note.user_id)?;
    let subject = repository::get_subject(conn, &note.subject_code)?.ok_or_else(|| {
        AppError::not_found(format!("Subject not found with code: {}", note.subject_code))
    })?;

    let comments = repository::find_comments_by_note_id(conn, note.id)?;
    let ratings = repository::find_ratings_by_note_id(conn, note.id)?;

    let average_rating = average_rating(&ratings);
    let comment_count = comment_count(&comments);

    let (comments, ratings) = if include_detail {
        let comments = comments
            .into_iter()
            .map(|comment| {
                Ok(CommentView {
                    user: users.get(comment.user_id)?,
                    id: comment.id,
                    text: comment.text,
                    date: comment.date,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        let ratings = ratings
            .into_iter()
            .map(|rating| {
                Ok(RatingView {
                    user: users.get(rating.user_id)?,
                    id: rating.id,
                    value: rating.value,
                    date: rating.date,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        (Some(comments), Some(ratings))
    } else {
        (None, None)
    };

    Ok(NoteView {
        id: note.id,
        name: note.name.clone(),
        file: note.file.clone(),
        upload_date: note.upload_date,
        user: owner,
        subject,
        average_rating,
        comment_count,
        comments,
        ratings,
    })
}
