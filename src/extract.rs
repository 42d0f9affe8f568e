use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// `axum::Json` whose rejections are reported as `AppError` bodies.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Path` whose rejections are reported as `AppError` bodies.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Accepts an integer given either as a JSON number or as a numeric string.
pub fn lenient_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer) {
        Ok(Raw::Number(value)) => Ok(value),
        Ok(Raw::Text(text)) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("{text:?} is not an integer"))),
        Err(_) => Err(serde::de::Error::custom("expected an integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        response::IntoResponse,
    };
    use serde_json::{json, Value};

    #[derive(Debug, Deserialize)]
    struct Score {
        #[serde(deserialize_with = "lenient_integer")]
        value: i64,
    }

    fn score(body: Value) -> Result<i64, serde_json::Error> {
        serde_json::from_value::<Score>(body).map(|score| score.value)
    }

    #[test]
    fn integers_may_arrive_as_strings() {
        assert_eq!(score(json!({ "value": 4 })).unwrap(), 4);
        assert_eq!(score(json!({ "value": " 3 " })).unwrap(), 3);
        assert!(score(json!({ "value": 3.5 })).is_err());
        assert!(score(json!({ "value": "three" })).is_err());
        assert!(score(json!({ "value": u64::MAX })).is_err());
    }

    async fn error_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn malformed_json_becomes_a_validation_error() {
        let request = Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"value": 3.5}"#))
            .unwrap();

        let rejection = match AppJson::<Score>::from_request(request, &()).await {
            Ok(_) => panic!("fractional value was accepted"),
            Err(rejection) => rejection,
        };
        let response = rejection.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn path_rejections_become_validation_errors() {
        let (mut parts, _) = Request::builder()
            .uri("/notes/not-a-uuid")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let rejection = match AppPath::<uuid::Uuid>::from_request_parts(&mut parts, &()).await {
            Ok(_) => panic!("path without a matched route was accepted"),
            Err(rejection) => rejection,
        };
        let response = rejection.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(response).await["error"].is_string());
    }
}
