//! Contract handlers
//!
//! Contract registration and coverage queries. Per-contract invoices and
//! indexation live under the same scope but are handled in their own modules.

use crate::dto::{
    ApiResponse, ContractCreateRequest, ContractResponse, MonthParams, PaginationParams,
    ProrationResponse,
};
use crate::handlers::{indexation, invoice};
use actix_web::{web, HttpResponse};
use domus_core::AppError;
use domus_services::ContractService;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// POST /api/v1/contracts
#[instrument(skip(contracts, req))]
pub async fn create_contract(
    contracts: web::Data<ContractService>,
    req: web::Json<ContractCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Contract creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let new_contract = req.into_inner().into_new_contract().map_err(AppError::Validation)?;
    let created = contracts.create(new_contract).await?;

    info!(id = created.id, number = %created.number, "Contract created");

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        ContractResponse::from(created),
        "Contract created successfully",
    )))
}

/// List contracts with pagination
///
/// GET /api/v1/contracts
#[instrument(skip(contracts))]
pub async fn list_contracts(
    contracts: web::Data<ContractService>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    debug!(page = query.page, per_page = query.per_page, "Listing contracts");

    let (items, total) = contracts.list(query.page, query.per_page).await?;
    let response: Vec<ContractResponse> = items.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(query.paginate(response, total)))
}

/// GET /api/v1/contracts/{id}
#[instrument(skip(contracts))]
pub async fn get_contract(
    contracts: web::Data<ContractService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let contract = contracts.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ContractResponse::from(contract))))
}

/// Coverage of the month an invoice issued in `year`/`month` would bill
///
/// GET /api/v1/contracts/{id}/proration
#[instrument(skip(contracts))]
pub async fn get_proration(
    contracts: web::Data<ContractService>,
    path: web::Path<i64>,
    query: web::Query<MonthParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Proration query validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let contract_id = path.into_inner();
    let proration = contracts
        .proration(contract_id, query.year, query.month)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ProrationResponse::new(
        contract_id,
        proration,
    ))))
}

/// Configure contract routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/contracts")
            .route("", web::get().to(list_contracts))
            .route("", web::post().to(create_contract))
            .route("/{id}", web::get().to(get_contract))
            .route("/{id}/proration", web::get().to(get_proration))
            .route("/{id}/invoices", web::get().to(invoice::list_contract_invoices))
            .route("/{id}/invoices", web::post().to(invoice::issue_invoice))
            .route("/{id}/indexation", web::post().to(indexation::index_contract)),
    );
}
