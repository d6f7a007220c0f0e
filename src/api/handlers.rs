// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::api::state::UploadLimits;
use crate::catalog::{
    AssetResolver, CatalogError, CatalogQuery, CreatureStore, PageRequest, ResolvedAsset,
    UpsertEngine, UpsertOutcome,
};
use crate::database_ops::db::Db;
use crate::normalization::{canonical_name_opt, unflatten, FlatPaths};
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use futures::StreamExt;
use indexmap::map::Entry;
use serde_json::{Map, Value};

type ApiResult = Result<HttpResponse, CatalogError>;

/// Multipart part carrying the uploaded artwork.
const IMAGE_FIELD: &str = "image";

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Hello, World!")
}

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> HttpResponse {
    let database = if db.ping().await {
        "connected"
    } else {
        "disconnected"
    };
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
    })
}

/// Paginated catalog listing
pub async fn list_pokemons(
    query: web::Query<ListParams>,
    db: web::Data<Db>,
    assets: web::Data<AssetResolver>,
) -> ApiResult {
    let request = PageRequest::from_raw(query.page.as_deref(), query.limit.as_deref());
    let page = CatalogQuery::new(db.get_ref(), assets.get_ref())
        .list(request)
        .await?;
    Ok(HttpResponse::Ok().json(ListResponse::from(page)))
}

/// Case-insensitive substring search on names
pub async fn search_pokemons(
    query: web::Query<SearchParams>,
    db: web::Data<Db>,
    assets: web::Data<AssetResolver>,
) -> ApiResult {
    let q = query.q.as_deref().unwrap_or_default();
    tracing::debug!(q, "search requested");
    let data = CatalogQuery::new(db.get_ref(), assets.get_ref())
        .search(q)
        .await?;
    Ok(HttpResponse::Ok().json(SearchResponse { data }))
}

pub async fn get_pokemon(path: web::Path<String>, db: web::Data<Db>) -> ApiResult {
    let raw = path.into_inner();
    let name = canonical_name_opt(Some(&raw))
        .ok_or_else(|| CatalogError::not_found("Pokemon not found"))?;
    tracing::info!(name = %name, "searching for pokemon");
    match db.find_by_name(&name).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(CatalogError::not_found("Pokemon not found")),
    }
}

/// Create or partially update a creature from a JSON or multipart body
pub async fn upsert_pokemon(
    req: HttpRequest,
    body: web::Payload,
    db: web::Data<Db>,
    assets: web::Data<AssetResolver>,
    limits: web::Data<UploadLimits>,
) -> ApiResult {
    let (payload, image) = if is_multipart(&req) {
        read_multipart(&req, body, limits.max_bytes).await?
    } else {
        (read_json_object(body, limits.max_bytes).await?, None)
    };
    tracing::info!(
        keys = ?payload.keys().collect::<Vec<_>>(),
        with_image = image.is_some(),
        "upsert requested"
    );

    let staged = match image {
        Some(bytes) => Some(assets.stage_upload(&bytes).await?),
        None => None,
    };

    let outcome = UpsertEngine::new(db.get_ref(), assets.get_ref())
        .upsert(payload, staged)
        .await?;
    Ok(match outcome {
        UpsertOutcome::Created(record) => HttpResponse::Created().json(record),
        UpsertOutcome::Updated(record) => HttpResponse::Ok().json(record),
    })
}

pub async fn delete_pokemon(body: web::Json<DeleteRequest>, db: web::Data<Db>) -> ApiResult {
    let name = canonical_name_opt(body.name.as_deref())
        .ok_or_else(|| CatalogError::validation("a name is required"))?;
    if db.delete_by_name(&name).await? {
        tracing::info!(name = %name, "pokemon deleted");
        Ok(HttpResponse::Ok().json(MessageResponse {
            message: "Pokemon deleted successfully".to_string(),
        }))
    } else {
        Err(CatalogError::not_found("Pokemon not found"))
    }
}

/// Artwork by id: full art, else standard, else 404
pub async fn get_creature_asset(
    path: web::Path<i64>,
    assets: web::Data<AssetResolver>,
) -> ApiResult {
    let id = path.into_inner();
    let asset = assets
        .resolve_creature(id)
        .ok_or_else(|| CatalogError::not_found("Image not found"))?;
    serve_asset(&assets, &asset).await
}

pub async fn get_type_asset(
    path: web::Path<String>,
    assets: web::Data<AssetResolver>,
) -> ApiResult {
    let asset = assets
        .resolve_type(&path.into_inner())
        .ok_or_else(|| CatalogError::not_found("Image not found"))?;
    serve_asset(&assets, &asset).await
}

async fn serve_asset(assets: &AssetResolver, asset: &ResolvedAsset) -> ApiResult {
    let bytes = assets.read(asset).await?;
    Ok(HttpResponse::Ok()
        .content_type("image/png")
        .insert_header(("X-Asset-Tier", asset.tier.as_str()))
        .body(bytes))
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("multipart/form-data"))
}

async fn read_json_object(
    mut body: web::Payload,
    max_bytes: usize,
) -> Result<Map<String, Value>, CatalogError> {
    let mut buf = web::BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk
            .map_err(|e| CatalogError::validation(format!("failed to read request body: {e}")))?;
        if buf.len() + chunk.len() > max_bytes {
            return Err(CatalogError::validation(format!(
                "request body exceeds {max_bytes} bytes"
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(&buf) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(CatalogError::validation("request body must be a JSON object")),
    }
}

/// Collect text parts into a nested payload (dotted part names nest) and keep
/// the raw bytes of the image part.
async fn read_multipart(
    req: &HttpRequest,
    body: web::Payload,
    max_bytes: usize,
) -> Result<(Map<String, Value>, Option<Vec<u8>>), CatalogError> {
    let mut multipart = Multipart::new(req.headers(), body);
    let mut fields = FlatPaths::new();
    let mut image = None;

    while let Some(item) = multipart.next().await {
        let mut field = item
            .map_err(|e| CatalogError::validation(format!("invalid multipart payload: {e}")))?;
        let name = field.name().unwrap_or_default().to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| CatalogError::validation(format!("invalid {name} field: {e}")))?;
            if data.len() + chunk.len() > max_bytes {
                return Err(CatalogError::validation(format!(
                    "field {name} exceeds max size of {max_bytes} bytes"
                )));
            }
            data.extend_from_slice(&chunk);
        }

        if name == IMAGE_FIELD {
            if !data.is_empty() {
                image = Some(data);
            }
            continue;
        }
        if name.is_empty() {
            continue;
        }
        let text = String::from_utf8(data)
            .map_err(|_| CatalogError::validation(format!("field {name} is not valid UTF-8")))?;
        push_form_value(&mut fields, name, text);
    }

    Ok((unflatten(&fields), image))
}

/// Repeated part names (`type=Fire&type=Flying`) collect into an array.
fn push_form_value(fields: &mut FlatPaths, name: String, text: String) {
    match fields.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(Value::String(text));
        }
        Entry::Occupied(mut slot) => match slot.get_mut() {
            Value::Array(items) => items.push(Value::String(text)),
            first => {
                let prev = first.take();
                *first = Value::Array(vec![prev, Value::String(text)]);
            }
        },
    }
}
