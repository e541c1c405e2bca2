use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    context::unix_now,
    query::{paginate, ListParams, QueryError, QueryOptions, Record},
    repositories::{sleep_records, users, WriteError},
    storage::{Storage, StorageRead},
};

use super::{
    models::{
        humanize_seconds, ErrorResponse, HealthResponse, ItemResponse, ListResponse,
        MessageResponse, SleepRecordResponse, UserDetailResponse, UserResponse, UserSummary,
    },
    AppState,
};

/// Header carrying the id of the authenticated caller.
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn health<S: StorageRead + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    let uptime_secs = state.started_at.elapsed().map(|d| d.as_secs()).unwrap_or(0);
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            uptime_secs,
        }),
    )
}

pub async fn list_users<S: StorageRead + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let Some(viewer) = acting_user(&headers) else {
        return unauthorized();
    };
    let raw: QueryOptions = pairs.into_iter().collect();

    let result = ListParams::from_options(&raw, state.default_limit).and_then(|params| {
        let repo = users::repository(state.storage.clone())?;
        let page = paginate(&repo, &params)?;
        let followed = users::followed_by(&state.storage, viewer, &page.records)?;
        Ok((page, followed))
    });

    match result {
        Ok((page, followed)) => Json(ListResponse {
            data: page
                .records
                .iter()
                .map(|r| user_to_response(r, viewer, &followed))
                .collect(),
            total: page.total,
            pagination: page.pagination,
        })
        .into_response(),
        Err(err) => query_error_response("listing users", err),
    }
}

pub async fn get_user<S: StorageRead + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let Some(viewer) = acting_user(&headers) else {
        return unauthorized();
    };

    let found = users::repository(state.storage.clone()).and_then(|repo| repo.get(id));
    let user = match found {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    message: format!("user {id} not found"),
                }),
            )
                .into_response();
        }
        Err(err) => return query_error_response("loading user", err),
    };

    let details = state.storage.follow_counts(user.id).and_then(|counts| {
        let followed = if user.id == viewer {
            BTreeSet::new()
        } else {
            state
                .storage
                .followed_ids_among(viewer, &[user.id])?
                .into_iter()
                .collect()
        };
        Ok((counts, followed))
    });

    match details {
        Ok((counts, followed)) => Json(ItemResponse {
            data: UserDetailResponse {
                user: user_to_response(&user, viewer, &followed),
                followers_count: counts.followers,
                followeds_count: counts.followeds,
            },
        })
        .into_response(),
        Err(err) => query_error_response("loading follow counts", err.into()),
    }
}

pub async fn list_sleep_records<S: StorageRead + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let Some(viewer) = acting_user(&headers) else {
        return unauthorized();
    };
    let mut raw: QueryOptions = pairs.into_iter().collect();
    if !raw.contains_key(sleep_records::FOLLOWING) {
        raw.insert(sleep_records::FOLLOWING, true);
    }
    raw.insert(sleep_records::CURRENT_USER, viewer);

    let result = ListParams::from_options(&raw, state.default_limit).and_then(|params| {
        let repo = sleep_records::repository(state.storage.clone(), unix_now())?;
        paginate(&repo, &params)
    });

    match result {
        Ok(page) => Json(ListResponse {
            data: page.records.iter().map(sleep_record_to_response).collect(),
            total: page.total,
            pagination: page.pagination,
        })
        .into_response(),
        Err(err) => query_error_response("listing sleep records", err),
    }
}

pub async fn follow_user<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let Some(viewer) = acting_user(&headers) else {
        return unauthorized();
    };
    match users::follow(&state.storage, viewer, id, unix_now()) {
        Ok(()) => Json(MessageResponse {
            message: format!("you are now following user {id}"),
        })
        .into_response(),
        Err(err) => write_error_response("following user", err),
    }
}

pub async fn unfollow_user<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let Some(viewer) = acting_user(&headers) else {
        return unauthorized();
    };
    match users::unfollow(&state.storage, viewer, id) {
        Ok(()) => Json(MessageResponse {
            message: format!("you are no longer following user {id}"),
        })
        .into_response(),
        Err(err) => write_error_response("unfollowing user", err),
    }
}

pub async fn clock_in<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(viewer) = acting_user(&headers) else {
        return unauthorized();
    };
    let written = sleep_records::clock_in(&state.storage, viewer, unix_now());
    sleep_record_written(&state.storage, written, StatusCode::CREATED, "clocking in")
}

pub async fn clock_out<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(viewer) = acting_user(&headers) else {
        return unauthorized();
    };
    let written = sleep_records::clock_out(&state.storage, viewer, unix_now());
    sleep_record_written(&state.storage, written, StatusCode::OK, "clocking out")
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            message: "endpoint not found".to_string(),
        }),
    )
}

fn acting_user(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn unauthorized() -> Response {
    rejected(
        StatusCode::UNAUTHORIZED,
        format!("missing or invalid {USER_ID_HEADER} header"),
    )
}

fn sleep_record_written<S: StorageRead + Clone>(
    store: &S,
    written: Result<i64, WriteError>,
    status: StatusCode,
    what: &str,
) -> Response {
    let id = match written {
        Ok(id) => id,
        Err(err) => return write_error_response(what, err),
    };
    match sleep_records::find(store.clone(), id) {
        Ok(Some(record)) => (
            status,
            Json(ItemResponse {
                data: sleep_record_to_response(&record),
            }),
        )
            .into_response(),
        Ok(None) => internal_error(what, &format!("sleep record {id} missing after write")),
        Err(err) => query_error_response(what, err),
    }
}

fn query_error_response(what: &str, err: QueryError) -> Response {
    if !err.is_validation() {
        return internal_error(what, &err);
    }
    log::warn!("Rejected request while {}: {}", what, err);
    rejected(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}

fn write_error_response(what: &str, err: WriteError) -> Response {
    let status = match &err {
        WriteError::Storage(e) => return internal_error(what, e),
        WriteError::UserNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    log::warn!("Rejected request while {}: {}", what, err);
    rejected(status, err.to_string())
}

/// Logs the detail; the client only learns that the server failed.
fn internal_error(what: &str, detail: &dyn std::fmt::Debug) -> Response {
    log::error!("Failed {}: {:?}", what, detail);
    rejected(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

fn rejected(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { message })).into_response()
}

fn text(record: &Record, name: &str) -> String {
    record.get(name).as_str().unwrap_or_default().to_string()
}

fn user_to_response(record: &Record, viewer: i64, followed: &BTreeSet<i64>) -> UserResponse {
    UserResponse {
        id: record.id,
        email: text(record, "email"),
        is_followed: (record.id != viewer).then(|| followed.contains(&record.id)),
    }
}

fn sleep_record_to_response(record: &Record) -> SleepRecordResponse {
    let owner = record.association(sleep_records::USER);
    let duration = humanize_seconds(record.get("duration").as_i64().unwrap_or(0));
    let email = owner.map(|u| text(u, "email")).unwrap_or_default();
    SleepRecordResponse {
        id: record.id,
        user_id: record.get("user_id").as_i64().unwrap_or_default(),
        user: owner.map(|u| UserSummary {
            id: u.id,
            email: text(u, "email"),
        }),
        clock_in: record.get("clock_in").as_i64(),
        clock_out: record.get("clock_out").as_i64(),
        detail_info: format!(
            "Record {} from user {} has {} of sleep length",
            record.id, email, duration
        ),
        duration,
    }
}
