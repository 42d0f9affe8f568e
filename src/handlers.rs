use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::accounts;
use crate::auth::{hash_password_blocking, verify_password_blocking, AuthUser};
use crate::error::AppError;
use crate::extract::{lenient_integer, AppJson, AppPath};
use crate::models::{CommentView, NewNote, NoteView, RatingView, Session, Subject, UserView};
use crate::notes;
use crate::repository;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterUser {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginUser {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct Message {
    message: &'static str,
}

#[derive(Deserialize)]
pub struct NoteFilter {
    subject: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    note_id: Uuid,
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    note_id: Uuid,
    #[serde(deserialize_with = "lenient_integer")]
    value: i64,
}

pub async fn register_user(
    State(state): State<AppState>,
    AppJson(user_data): AppJson<RegisterUser>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let registration =
        accounts::check_registration(&user_data.name, &user_data.email, &user_data.password)?;

    // Hash before taking the connection so other requests are not held up.
    let password_hash = hash_password_blocking(user_data.password.clone(), state.bcrypt_cost).await?;

    let session = accounts::register(&*state.db.lock().await, &registration, password_hash)?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login_user(
    State(state): State<AppState>,
    AppJson(login_data): AppJson<LoginUser>,
) -> Result<Json<Session>, AppError> {
    let user = accounts::find_login(&*state.db.lock().await, &login_data.email)?;

    if !verify_password_blocking(login_data.password, user.password_hash.clone()).await? {
        return Err(accounts::rejected_login());
    }

    let session = accounts::open_session(&*state.db.lock().await, &user)?;

    Ok(Json(session))
}

pub async fn logout_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Message>, AppError> {
    accounts::logout(&*state.db.lock().await, &auth.token)?;

    Ok(Json(Message {
        message: "Logout successful",
    }))
}

pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserView>, AppError> {
    let user = accounts::current_user(&*state.db.lock().await, auth.user_id)?;
    Ok(Json(user))
}

pub async fn list_subjects(State(state): State<AppState>) -> Result<Json<Vec<Subject>>, AppError> {
    let subjects = repository::find_all_subjects(&*state.db.lock().await)?;
    Ok(Json(subjects))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Query(filter): Query<NoteFilter>,
) -> Result<Json<Vec<NoteView>>, AppError> {
    let notes = notes::list_notes(&*state.db.lock().await, filter.subject.as_deref())?;
    Ok(Json(notes))
}

pub async fn get_note(
    State(state): State<AppState>,
    AppPath(note_id): AppPath<Uuid>,
) -> Result<Json<NoteView>, AppError> {
    let note = notes::note_detail(&*state.db.lock().await, note_id)?;
    Ok(Json(note))
}

pub async fn upload_note(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<NoteView>), AppError> {
    let mut name = None;
    let mut subject_code = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = Some(field.text().await?),
            "subjectCode" => subject_code = Some(field.text().await?),
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::validation("file part has no file name"))?;
                upload = Some((file_name, field.bytes().await?));
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| AppError::validation("name is required"))?;
    let subject_code = subject_code.ok_or_else(|| AppError::validation("subjectCode is required"))?;
    let (file_name, bytes) = upload.ok_or_else(|| AppError::validation("No file uploaded"))?;

    notes::check_upload(&*state.db.lock().await, auth.user_id, &name, &subject_code)?;

    let file = state.storage.store(&bytes, &file_name).await?;

    let note = persist_note(
        &state,
        auth.user_id,
        NewNote {
            name: &name,
            subject_code: &subject_code,
            file,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

/// Inserts the note for an already stored file, removing the file again when
/// the insert fails.
async fn persist_note(state: &AppState, user_id: Uuid, new_note: NewNote<'_>) -> Result<NoteView, AppError> {
    let stored = new_note.file.clone();
    let created = notes::create_note(&*state.db.lock().await, user_id, new_note);

    if created.is_err() {
        state.storage.discard(&stored).await;
    }
    created
}

pub async fn add_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<NewComment>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    let comment = notes::add_comment(
        &*state.db.lock().await,
        auth.user_id,
        payload.note_id,
        &payload.text,
    )?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn submit_rating(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<NewRating>,
) -> Result<Json<RatingView>, AppError> {
    let rating = notes::submit_rating_view(
        &*state.db.lock().await,
        auth.user_id,
        payload.note_id,
        payload.value,
    )?;

    Ok(Json(rating))
}

pub async fn download_file(
    State(state): State<AppState>,
    AppPath(stored_name): AppPath<String>,
) -> Result<Response, AppError> {
    let (file, mime_type) = state.storage.open(&stored_name).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, storage};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::Mutex;

    async fn state_with_cost(bcrypt_cost: u32) -> AppState {
        let conn = db::in_memory();
        db::seed(&conn, 4).unwrap();
        AppState::new(Arc::new(Mutex::new(conn)), storage::scratch().await, bcrypt_cost)
    }

    async fn state() -> AppState {
        state_with_cost(4).await
    }

    async fn sign_up(state: &AppState, email: &str) -> AuthUser {
        let (status, Json(session)) = register_user(
            State(state.clone()),
            AppJson(RegisterUser {
                name: "Student".into(),
                email: email.into(),
                password: "secret".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        AuthUser {
            user_id: session.user.id,
            token: session.token,
        }
    }

    async fn seeded_note(state: &AppState, owner: &AuthUser) -> Uuid {
        let file = state.storage.store(b"notes", "week1.pdf").await.unwrap();
        notes::create_note(
            &*state.db.lock().await,
            owner.user_id,
            NewNote {
                name: "Week 1",
                subject_code: "CS101",
                file,
            },
        )
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn seeded_subjects_are_listed() {
        let state = state().await;
        let Json(subjects) = list_subjects(State(state)).await.unwrap();
        let codes: Vec<_> = subjects.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, ["CS101", "ENG205", "MATH201", "PHYS101"]);
    }

    #[tokio::test]
    async fn demo_user_can_log_in() {
        let state = state().await;
        let Json(session) = login_user(
            State(state.clone()),
            AppJson(LoginUser {
                email: db::DEMO_EMAIL.into(),
                password: db::DEMO_PASSWORD.into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(session.user.name, "Demo User");

        let rejected = login_user(
            State(state),
            AppJson(LoginUser {
                email: db::DEMO_EMAIL.into(),
                password: "wrong".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(rejected.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let state = state().await;
        sign_up(&state, "twice@example.com").await;

        let err = register_user(
            State(state),
            AppJson(RegisterUser {
                name: "Again".into(),
                email: "twice@example.com".into(),
                password: "secret".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rating_flow_through_handlers() {
        let state = state().await;
        let owner = sign_up(&state, "owner@example.com").await;
        let reader = sign_up(&state, "reader@example.com").await;
        let note_id = seeded_note(&state, &owner).await;

        let Json(first) = submit_rating(
            State(state.clone()),
            reader.clone(),
            AppJson(NewRating { note_id, value: 2 }),
        )
        .await
        .unwrap();
        let Json(second) = submit_rating(
            State(state.clone()),
            reader.clone(),
            AppJson(NewRating { note_id, value: 4 }),
        )
        .await
        .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.user.id, reader.user_id);

        submit_rating(State(state.clone()), owner, AppJson(NewRating { note_id, value: 5 }))
            .await
            .unwrap();

        let bad = submit_rating(State(state.clone()), reader, AppJson(NewRating { note_id, value: 6 }))
            .await
            .unwrap_err();
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);

        let Json(note) = get_note(State(state), AppPath(note_id)).await.unwrap();
        assert_eq!(note.ratings.map(|r| r.len()), Some(2));
        assert_eq!(note.average_rating, 4.5);
    }

    #[tokio::test]
    async fn comments_show_up_in_detail_only() {
        let state = state().await;
        let owner = sign_up(&state, "owner@example.com").await;
        let note_id = seeded_note(&state, &owner).await;

        let (status, Json(comment)) = add_comment(
            State(state.clone()),
            owner.clone(),
            AppJson(NewComment {
                note_id,
                text: "Clear and concise".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment.user.id, owner.user_id);

        let Json(listed) = list_notes(
            State(state.clone()),
            Query(NoteFilter {
                subject: Some("CS101".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].comment_count, 1);
        assert!(listed[0].comments.is_none());

        let Json(detail) = get_note(State(state), AppPath(note_id)).await.unwrap();
        assert_eq!(detail.comments.map(|c| c.len()), Some(1));
    }

    #[tokio::test]
    async fn unknown_note_is_404() {
        let state = state().await;
        let err = get_note(State(state), AppPath(Uuid::new_v4())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let state = state().await;
        let user = sign_up(&state, "leaving@example.com").await;

        let Json(me) = current_user(State(state.clone()), user.clone()).await.unwrap();
        assert_eq!(me.email, "leaving@example.com");

        logout_user(State(state.clone()), user.clone()).await.unwrap();
        let still_valid = crate::auth::verify_auth_token(&*state.db.lock().await, &user.token);
        assert!(still_valid.is_err());
    }

    #[tokio::test]
    async fn stored_files_download_with_their_type() {
        let state = state().await;
        let info = state.storage.store(b"hello", "hello.txt").await.unwrap();
        let stored_name = info.download_url.trim_start_matches("/files/").to_string();

        let response = download_file(State(state.clone()), AppPath(stored_name))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain"
        );

        let missing = download_file(State(state), AppPath("nope.txt".into()))
            .await
            .unwrap_err();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reads_are_not_held_up_by_password_hashing() {
        let state = state_with_cost(12).await;

        let registering = tokio::spawn(register_user(
            State(state.clone()),
            AppJson(RegisterUser {
                name: "Slow Hash".into(),
                email: "slow@example.com".into(),
                password: "secret".into(),
            }),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        let Json(subjects) = list_subjects(State(state.clone())).await.unwrap();
        let waited = started.elapsed();

        assert_eq!(subjects.len(), 4);
        assert!(
            !registering.is_finished(),
            "registration finished before the read; hashing was too fast to observe"
        );
        assert!(waited < Duration::from_millis(100), "read waited {waited:?}");

        let (status, _) = registering.await.unwrap().unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn failed_note_insert_discards_the_stored_file() {
        let state = state().await;
        let owner = sign_up(&state, "owner@example.com").await;
        let file = state.storage.store(b"orphan", "orphan.pdf").await.unwrap();
        let stored_name = file.download_url.trim_start_matches("/files/").to_string();

        let err = persist_note(
            &state,
            owner.user_id,
            NewNote {
                name: "Orphan",
                subject_code: "NOPE999",
                file,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!state.storage.root().join(&stored_name).exists());
        assert!(repository::find_all_notes(&*state.db.lock().await)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rating_values_accept_numeric_strings() {
        let note_id = Uuid::new_v4();
        let rating: NewRating =
            serde_json::from_value(serde_json::json!({ "noteId": note_id, "value": "3" })).unwrap();
        assert_eq!(rating.value, 3);
        assert_eq!(rating.note_id, note_id);

        assert!(serde_json::from_value::<NewRating>(
            serde_json::json!({ "noteId": note_id, "value": 3.5 })
        )
        .is_err());
    }
}
