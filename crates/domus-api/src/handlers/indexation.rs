//! HICP and rent indexation handlers

use crate::dto::{
    ApiResponse, ContractIndexationRequest, ContractResponse, HicpRangeParams, HicpUpsertRequest,
    IndexRentRequest,
};
use actix_web::{web, HttpResponse};
use domus_core::AppError;
use domus_services::IndexationService;
use serde_json::json;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Insert or replace monthly HICP values
///
/// PUT /api/v1/hicp
#[instrument(skip(indexation, req))]
pub async fn upsert_hicp(
    indexation: web::Data<IndexationService>,
    req: web::Json<HicpUpsertRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("HICP upsert validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let written = indexation.upsert_hicp(&req.values).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({ "written": written }))))
}

/// GET /api/v1/hicp
#[instrument(skip(indexation))]
pub async fn list_hicp(
    indexation: web::Data<IndexationService>,
    query: web::Query<HicpRangeParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("HICP range validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let values = indexation.list_hicp(query.from_year, query.to_year).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(values)))
}

/// Index an arbitrary amount between two months
///
/// POST /api/v1/indexation
#[instrument(skip(indexation, req))]
pub async fn index_rent(
    indexation: web::Data<IndexationService>,
    req: web::Json<IndexRentRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Indexation request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let (from, to) = req
        .from()
        .zip(req.to())
        .ok_or_else(|| AppError::Validation("Invalid month".to_string()))?;

    let result = indexation.index_rent(req.base_amount, from, to).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(result)))
}

/// Index a contract's rent and store the new amount
///
/// POST /api/v1/contracts/{id}/indexation
#[instrument(skip(indexation, req))]
pub async fn index_contract(
    indexation: web::Data<IndexationService>,
    path: web::Path<i64>,
    req: web::Json<ContractIndexationRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Contract indexation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let to = req
        .to()
        .ok_or_else(|| AppError::Validation("Invalid month".to_string()))?;

    let result = indexation.index_contract(path.into_inner(), to).await?;
    info!(
        id = result.contract.id,
        rent = %result.contract.rent_amount,
        "Contract rent indexed"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        json!({
            "contract": ContractResponse::from(result.contract),
            "indexation": result.indexation,
        }),
        "Rent indexed",
    )))
}

/// Configure HICP and ad-hoc indexation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/hicp")
            .route("", web::get().to(list_hicp))
            .route("", web::put().to(upsert_hicp)),
    )
    .route("/indexation", web::post().to(index_rent));
}
