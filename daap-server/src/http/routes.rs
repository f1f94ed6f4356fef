//! One handler per route in the table from `SPEC_FULL.md` §6. Each
//! object-response handler follows the same shape: resolve the
//! `(revision, delta)` pair against the provider, build a `DaapObject`
//! with a response-builder, encode it, and (for the cacheable GETs)
//! check/populate the response cache around that work.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use daap_codec::DaapObject;
use daap_core::provider::ByteRange;
use daap_core::response;
use futures::Stream;

use super::query::{ListingQuery, MediaQuery, SessionQuery, UpdateQuery};
use super::range::{self, content_range_header};
use super::{AppError, AppResult, AppState};

const CONTENT_TYPE: &str = "application/x-dmap-tagged";

fn object_response(status: StatusCode, bytes: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, CONTENT_TYPE)], bytes).into_response()
}

/// Encode `object`, checking/populating the response cache by
/// `(endpoint, path, query excluding session-id)` first.
async fn cached_object_response(
    state: &AppState,
    endpoint: &str,
    path: &str,
    raw_query: &str,
    object: AppResult<DaapObject>,
) -> AppResult<Response> {
    let key = super::cache::ResponseCache::key(endpoint, path, raw_query);
    if let Some(bytes) = state.cache.get(key).await {
        return Ok(object_response(StatusCode::OK, bytes.to_vec()));
    }

    let bytes = object?.encode().map_err(daap_core::Error::from)?;
    state.cache.insert(key, Bytes::from(bytes.clone())).await;
    Ok(object_response(StatusCode::OK, bytes))
}

pub async fn server_info(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> AppResult<Response> {
    let object = response::server_info(
        &state.config.server.name,
        state.config.server.password.is_some(),
        true,
    )
    .map_err(daap_core::Error::from);
    cached_object_response(
        &state,
        "server-info",
        "/server-info",
        raw_query.as_deref().unwrap_or(""),
        object,
    )
    .await
}

pub async fn content_codes(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> AppResult<Response> {
    let object = response::content_codes().map_err(daap_core::Error::from);
    cached_object_response(
        &state,
        "content-codes",
        "/content-codes",
        raw_query.as_deref().unwrap_or(""),
        object,
    )
    .await
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let client_version = headers
        .get("Client-DAAP-Version")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let session_id = state
        .provider
        .create_session(user_agent, Some(remote_addr.ip()), client_version);
    let bytes = response::login_response(session_id)?
        .encode()
        .map_err(daap_core::Error::from)?;
    Ok(object_response(StatusCode::OK, bytes))
}

pub async fn logout(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<SessionQuery>,
) -> StatusCode {
    state.provider.destroy_session(query.session_id);
    StatusCode::NO_CONTENT
}

pub async fn activity(
    axum::extract::Query(_query): axum::extract::Query<SessionQuery>,
) -> StatusCode {
    StatusCode::OK
}

pub async fn fp_setup() -> AppResult<Response> {
    Err(AppError::not_implemented("Fairplay is not supported"))
}

pub async fn update(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<UpdateQuery>,
) -> AppResult<Response> {
    let next_revision = state
        .provider
        .get_next_revision(query.session_id, query.revision_number, query.delta)
        .await?;
    let bytes = response::update_response(next_revision)?
        .encode()
        .map_err(daap_core::Error::from)?;
    Ok(object_response(StatusCode::OK, bytes))
}

pub async fn databases(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ListingQuery>,
    RawQuery(raw_query): RawQuery,
) -> AppResult<Response> {
    let (new_revision, old_revision) = state
        .provider
        .resolve_view(query.revision_number, query.delta);
    let object = response::databases_response(
        state.provider.library(),
        state.provider.capabilities(),
        new_revision,
        old_revision,
    )
    .map_err(daap_core::Error::from);
    cached_object_response(
        &state,
        "databases",
        "/databases",
        raw_query.as_deref().unwrap_or(""),
        object,
    )
    .await
}

pub async fn items(
    State(state): State<AppState>,
    Path(database): Path<u32>,
    axum::extract::Query(query): axum::extract::Query<ListingQuery>,
    RawQuery(raw_query): RawQuery,
) -> AppResult<Response> {
    let (new_revision, old_revision) = state
        .provider
        .resolve_view(query.revision_number, query.delta);
    let object = response::items_response(
        state.provider.library(),
        state.provider.capabilities(),
        database,
        new_revision,
        old_revision,
    )
    .map_err(daap_core::Error::from);
    let path = format!("/databases/{database}/items");
    cached_object_response(&state, "items", &path, raw_query.as_deref().unwrap_or(""), object).await
}

pub async fn containers(
    State(state): State<AppState>,
    Path(database): Path<u32>,
    axum::extract::Query(query): axum::extract::Query<ListingQuery>,
    RawQuery(raw_query): RawQuery,
) -> AppResult<Response> {
    let (new_revision, old_revision) = state
        .provider
        .resolve_view(query.revision_number, query.delta);
    let object = response::containers_response(
        state.provider.library(),
        state.provider.capabilities(),
        database,
        new_revision,
        old_revision,
    )
    .map_err(daap_core::Error::from);
    let path = format!("/databases/{database}/containers");
    cached_object_response(&state, "containers", &path, raw_query.as_deref().unwrap_or(""), object)
        .await
}

pub async fn container_items(
    State(state): State<AppState>,
    Path((database, container)): Path<(u32, u32)>,
    axum::extract::Query(query): axum::extract::Query<ListingQuery>,
    RawQuery(raw_query): RawQuery,
) -> AppResult<Response> {
    let (new_revision, old_revision) = state
        .provider
        .resolve_view(query.revision_number, query.delta);
    let object = response::container_items_response(
        state.provider.library(),
        state.provider.capabilities(),
        database,
        container,
        new_revision,
        old_revision,
    )
    .map_err(daap_core::Error::from);
    let path = format!("/databases/{database}/containers/{container}/items");
    cached_object_response(
        &state,
        "container-items",
        &path,
        raw_query.as_deref().unwrap_or(""),
        object,
    )
    .await
}

/// Split `"42.mp3"` into `(42, "mp3")`, since axum has no dotted-suffix
/// matcher and hands this to us as one path segment.
fn split_item_and_suffix(segment: &str) -> AppResult<(u32, &str)> {
    let (id_str, suffix) = segment
        .rsplit_once('.')
        .ok_or_else(|| AppError::bad_request(format!("'{segment}' is missing a file extension")))?;
    let item_id: u32 = id_str
        .parse()
        .map_err(|_| AppError::bad_request(format!("'{id_str}' is not a valid item id")))?;
    Ok((item_id, suffix))
}

pub async fn item_stream(
    State(state): State<AppState>,
    Path((database, item_and_suffix)): Path<(u32, String)>,
    axum::extract::Query(query): axum::extract::Query<MediaQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let (item, _suffix) = split_item_and_suffix(&item_and_suffix)?;
    // The unauthenticated media routes have no session middleware ahead
    // of them, but still require a `session-id` query argument; an
    // unknown one surfaces as 403 via `Error::UnknownSession`.
    let session_id = query.session_id;

    let byte_range = match range::parse_range_header(&headers) {
        None => None,
        Some(Ok(range)) => Some(range),
        Some(Err(err)) => return Err(err.into()),
    };

    let (stream, guard) = state
        .provider
        .get_item(session_id, database, item, byte_range)
        .await?;

    build_stream_response(stream, Some(guard), byte_range)
}

pub async fn artwork(
    State(state): State<AppState>,
    Path((database, item)): Path<(u32, u32)>,
    axum::extract::Query(query): axum::extract::Query<MediaQuery>,
) -> AppResult<Response> {
    let stream = state
        .provider
        .get_artwork(query.session_id, database, item)
        .await?;
    build_stream_response(stream, None, None)
}

/// Wraps the provider's `MediaStream` body into the streamed axum
/// response, attaching a `StreamGuard` (if any) so the session reverts
/// out of `Streaming` state exactly when the body stops being polled —
/// on normal completion, an I/O error, or the client aborting the
/// request.
fn build_stream_response(
    stream: daap_core::MediaStream,
    guard: Option<daap_core::provider::StreamGuard>,
    byte_range: Option<ByteRange>,
) -> AppResult<Response> {
    let total_size = stream.total_size;
    let mime_type = stream.mime_type.clone();

    let (status, served_len, range_header) = match byte_range {
        None => (StatusCode::OK, total_size, None),
        Some((start, end)) => {
            let end = end.unwrap_or(total_size);
            if start >= total_size && total_size > 0 {
                return Err(AppError::new(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    format!("range start {start} beyond size {total_size}"),
                ));
            }
            let header_value = content_range_header(start, end, total_size);
            (StatusCode::PARTIAL_CONTENT, end - start, Some(header_value))
        }
    };

    let body = Body::from_stream(GuardedStream {
        body: stream.body,
        _guard: guard,
    });

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, served_len)
        .body(body)
        .expect("well-formed static headers");

    if let Some(value) = range_header {
        if let Ok(header_value) = header::HeaderValue::from_str(&value) {
            response.headers_mut().insert(header::CONTENT_RANGE, header_value);
        }
    }

    Ok(response)
}

/// Keeps a `StreamGuard` alive for exactly as long as the body stream is
/// being polled, reverting the session out of `Streaming` state on
/// every exit path (drained, errored, or dropped on client abort).
struct GuardedStream<G> {
    body: daap_core::provider::ByteStream,
    _guard: Option<G>,
}

impl<G: Unpin> Stream for GuardedStream<G> {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.body.as_mut().poll_next(cx)
    }
}
