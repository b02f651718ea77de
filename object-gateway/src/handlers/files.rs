use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, HeaderValue, StatusCode, Uri},
    response::Response,
    Json,
};
use futures::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::models::{ApiError, ApiResult};
use crate::storage::{ObjectStream, StagedUpload};
use crate::utils::validation::validate_object_name;
use crate::AppState;

/// Name of the multipart form field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

pub const UPLOAD_SUCCESS: &str = "Upload success";
pub const DELETE_SUCCESS: &str = "File is deleted successfully";

/// List every object name in the bucket
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let names = state.store.list_objects().await?;
    debug!("Listed {} objects", names.len());
    Ok(Json(names))
}

/// Stream an object for inline rendering, without a disposition header
pub async fn view_file(
    State(state): State<AppState>,
    Path(object_name): Path<String>,
) -> ApiResult<Response> {
    validate_object_name(&object_name)?;

    let object = state.store.get_object(&object_name).await?;
    let content_type = object
        .content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(&object_name));

    debug!(object = %object_name, content_type = %content_type, "Viewing object");
    Ok(stream_response(object_name, object, &content_type))
}

/// Stream an object as an attachment named after the object
pub async fn download_file(
    State(state): State<AppState>,
    Path(object_name): Path<String>,
) -> ApiResult<Response> {
    validate_object_name(&object_name)?;

    let disposition = attachment_disposition(&object_name)?;
    let object = state.store.get_object(&object_name).await?;
    let content_type = guess_content_type(&object_name);

    info!(object = %object_name, content_type = %content_type, "Downloading object");
    let mut response = stream_response(object_name, object, &content_type);
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

/// Store the multipart `file` field under its filename, replacing any
/// existing object of that name
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<&'static str> {
    let mut multipart = multipart.map_err(|rejection| ApiError::InvalidInput(rejection.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Skipping multipart field: {:?}", field.name());
            continue;
        }

        let object_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidInput("upload is missing a filename".to_string()))?;
        validate_object_name(&object_name)?;

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(&object_name));

        let staged = spool_field(field, state.config.max_upload_bytes()).await?;
        let size = staged.size();

        state
            .store
            .put_object(&object_name, staged, &content_type)
            .await?;

        info!(
            object = %object_name,
            size,
            content_type = %content_type,
            "Upload stored"
        );
        return Ok(UPLOAD_SUCCESS);
    }

    Err(ApiError::InvalidInput(format!(
        "multipart field '{}' is required",
        UPLOAD_FIELD
    )))
}

/// Remove an object; removing a missing object also succeeds
pub async fn delete_file(
    State(state): State<AppState>,
    Path(object_name): Path<String>,
) -> ApiResult<(StatusCode, &'static str)> {
    remove_object(&state, &object_name).await
}

/// Delete for objects whose name is also a static route (`upload`,
/// `view-files`); the name is the request path itself
pub async fn delete_static_name(
    State(state): State<AppState>,
    uri: Uri,
) -> ApiResult<(StatusCode, &'static str)> {
    let object_name = uri.path().trim_start_matches('/');
    remove_object(&state, object_name).await
}

async fn remove_object(
    state: &AppState,
    object_name: &str,
) -> ApiResult<(StatusCode, &'static str)> {
    validate_object_name(object_name)?;

    state.store.delete_object(object_name).await?;

    info!(object = %object_name, "Object deleted");
    Ok((StatusCode::OK, DELETE_SUCCESS))
}

/// Content type for `name` by extension, `application/octet-stream` if unknown
pub fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
        .to_string()
}

/// `Content-Disposition` value marking a response as a download of `name`
pub fn attachment_disposition(name: &str) -> ApiResult<HeaderValue> {
    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let escaped = fallback.replace('\\', "\\\\").replace('"', "\\\"");

    let mut value = format!("attachment; filename=\"{}\"", escaped);
    if !name.is_ascii() {
        value.push_str(&format!("; filename*=UTF-8''{}", urlencoding::encode(name)));
    }

    HeaderValue::from_str(&value)
        .map_err(|_| ApiError::InvalidInput(format!("object name cannot be sent as a filename: {}", name)))
}

fn stream_response(object_name: String, object: ObjectStream, content_type: &str) -> Response {
    let body = object.body.inspect_err(move |e| {
        // Headers are already sent, so the client only sees a truncated body
        warn!(object = %object_name, "Object stream aborted mid-transfer: {}", e);
    });

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Some(len) = object.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    response
}

/// Copy a multipart field to a temporary file, enforcing `limit` bytes
async fn spool_field(mut field: Field<'_>, limit: u64) -> ApiResult<StagedUpload> {
    let (file, path) = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile()
        .map_err(|e| ApiError::Internal(format!("failed to create spool file: {}", e)))?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "maximum upload size is {} bytes",
                limit
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to spool upload: {}", e)))?;
    }

    file.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to spool upload: {}", e)))?;

    Ok(StagedUpload::new(path, size))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::IoAborted(err.body_text())
    }
}
