//! Invoice number handlers
//!
//! Allocation, preview and settings of the per-owner invoice sequences.

use crate::dto::{
    AllocateNumberRequest, ApiResponse, InvoiceNumberResponse, SequenceSettingsResponse,
};
use actix_web::{web, HttpResponse};
use domus_core::models::SequenceSettingsUpdate;
use domus_core::AppError;
use domus_services::SequenceAllocator;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Allocate the next invoice number of an owner
///
/// POST /api/v1/invoice-numbers
#[instrument(skip(allocator, req))]
pub async fn allocate_number(
    allocator: web::Data<SequenceAllocator>,
    req: web::Json<AllocateNumberRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Number allocation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let allocated = allocator
        .allocate(req.owner_id.as_deref(), req.owner_name.as_deref())
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(InvoiceNumberResponse::from(
        allocated,
    ))))
}

/// Preview the next number without consuming it
///
/// GET /api/v1/invoice-numbers/{owner_key}/next
#[instrument(skip(allocator))]
pub async fn peek_number(
    allocator: web::Data<SequenceAllocator>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let owner_key = path.into_inner();
    let next = allocator.peek(&owner_key).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(InvoiceNumberResponse::from(next))))
}

/// GET /api/v1/invoice-numbers/{owner_key}/settings
#[instrument(skip(allocator))]
pub async fn get_settings(
    allocator: web::Data<SequenceAllocator>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let owner_key = path.into_inner();
    debug!(owner_key = %owner_key, "Getting sequence settings");

    let sequence = allocator.settings(&owner_key).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(SequenceSettingsResponse::from(
        sequence,
    ))))
}

/// Update series, padding, year inclusion or move the counter forward
///
/// PUT /api/v1/invoice-numbers/{owner_key}/settings
#[instrument(skip(allocator, req))]
pub async fn update_settings(
    allocator: web::Data<SequenceAllocator>,
    path: web::Path<String>,
    req: web::Json<SequenceSettingsUpdate>,
) -> Result<HttpResponse, AppError> {
    let owner_key = path.into_inner();

    req.validate().map_err(|e| {
        warn!("Sequence settings validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let updated = allocator.update_settings(&owner_key, &req).await?;
    info!(owner_key = %owner_key, next_number = updated.next_number, "Sequence settings updated");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        SequenceSettingsResponse::from(updated),
        "Sequence settings updated",
    )))
}

/// Configure invoice number routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invoice-numbers")
            .route("", web::post().to(allocate_number))
            .route("/{owner_key}/next", web::get().to(peek_number))
            .route("/{owner_key}/settings", web::get().to(get_settings))
            .route("/{owner_key}/settings", web::put().to(update_settings)),
    );
}
