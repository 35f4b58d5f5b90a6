use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, Request};
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

pub const DEFAULT_PREV_ID: i64 = 0;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
/// SQLite's bound-parameter limit; one `IN` placeholder per id.
pub const MAX_DELETE_IDS: usize = 32_766;

/// Raw `GET /todos` query. Values are kept as strings so that unparsable
/// input falls back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ReadTodoParams {
    prev_id: Option<String>,
    size: Option<String>,
}

impl ReadTodoParams {
    pub fn into_request(self) -> Result<ReadTodoRequest, AppError> {
        let prev_id = self
            .prev_id
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PREV_ID);
        let size = self
            .size
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);

        if size < 0 {
            return Err(AppError::Validation(format!(
                "size must not be negative: {size}"
            )));
        }

        Ok(ReadTodoRequest { prev_id, size })
    }
}

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let uri = request.uri().to_string();
        tracing::info_span!("http_request", method = ?request.method(), uri)
    });

    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/todos",
            get(read_todos)
                .post(create_todo)
                .put(update_todo)
                .delete(delete_todos),
        )
        .layer(ServiceBuilder::new().layer(trace_layer))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.todos.ping().await?;
    Ok(StatusCode::OK)
}

async fn read_todos(
    State(state): State<AppState>,
    params: Result<Query<ReadTodoParams>, QueryRejection>,
) -> Result<Json<ReadTodoResponse>, AppError> {
    let req = params
        .map(|Query(params)| params)
        .unwrap_or_default()
        .into_request()?;

    let todos = state.todos.read_todos(req.prev_id, req.size).await?;
    Ok(Json(ReadTodoResponse { todos }))
}

async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<Json<CreateTodoResponse>, AppError> {
    let Json(req) = payload?;
    if req.subject.is_empty() {
        return Err(AppError::Validation("subject is required".to_string()));
    }

    let todo = state.todos.create_todo(&req.subject, &req.description).await?;
    Ok(Json(CreateTodoResponse { todo }))
}

async fn update_todo(
    State(state): State<AppState>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<UpdateTodoResponse>, AppError> {
    let Json(req) = payload?;
    if req.id == 0 {
        return Err(AppError::Validation("id is required".to_string()));
    }
    if req.subject.is_empty() {
        return Err(AppError::Validation("subject is required".to_string()));
    }

    let todo = state
        .todos
        .update_todo(req.id, &req.subject, &req.description)
        .await?;
    Ok(Json(UpdateTodoResponse { todo }))
}

// An absent body deletes nothing.
async fn delete_todos(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DeleteTodoResponse>, AppError> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        DeleteTodoRequest::default()
    } else {
        serde_json::from_slice::<DeleteTodoRequest>(&body)?
    };
    if req.ids.len() > MAX_DELETE_IDS {
        return Err(AppError::Validation(format!(
            "at most {MAX_DELETE_IDS} ids can be deleted at once"
        )));
    }

    state.todos.delete_todos(&req.ids).await?;
    Ok(Json(DeleteTodoResponse {}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(prev_id: Option<&str>, size: Option<&str>) -> ReadTodoParams {
        ReadTodoParams {
            prev_id: prev_id.map(str::to_string),
            size: size.map(str::to_string),
        }
    }

    #[test]
    fn valid_params_are_used_as_given() {
        let req = params(Some("42"), Some("3")).into_request().unwrap();
        assert_eq!(req, ReadTodoRequest { prev_id: 42, size: 3 });
    }

    #[test]
    fn size_zero_is_kept() {
        let req = params(None, Some("0")).into_request().unwrap();
        assert_eq!(req.size, 0);
    }

    #[test]
    fn missing_params_fall_back_to_defaults() {
        let req = ReadTodoParams::default().into_request().unwrap();
        assert_eq!(req.prev_id, DEFAULT_PREV_ID);
        assert_eq!(req.size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn unparsable_params_fall_back_to_defaults() {
        let req = params(Some("abc"), Some("ten")).into_request().unwrap();
        assert_eq!(req, ReadTodoRequest { prev_id: 0, size: 10 });
    }

    #[test]
    fn negative_prev_id_is_passed_through() {
        let req = params(Some("-5"), Some("10")).into_request().unwrap();
        assert_eq!(req, ReadTodoRequest { prev_id: -5, size: 10 });
    }

    #[test]
    fn negative_size_is_rejected() {
        let result = params(None, Some("-1")).into_request();
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
