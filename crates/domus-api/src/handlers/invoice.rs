//! Invoice handlers

use crate::dto::{ApiResponse, InvoiceResponse, IssueInvoiceRequest};
use actix_web::{web, HttpResponse};
use domus_core::AppError;
use domus_services::InvoiceService;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Issue the monthly invoice of a contract
///
/// POST /api/v1/contracts/{id}/invoices
#[instrument(skip(invoices, req))]
pub async fn issue_invoice(
    invoices: web::Data<InvoiceService>,
    path: web::Path<i64>,
    req: web::Json<IssueInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Invoice request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let contract_id = path.into_inner();
    let invoice = invoices
        .issue_monthly(contract_id, req.year, req.month, req.force_refresh_rate)
        .await?;

    info!(contract_id, number = %invoice.number, "Invoice issued");

    Ok(HttpResponse::Created().json(ApiResponse::success(InvoiceResponse::from(invoice))))
}

/// GET /api/v1/contracts/{id}/invoices
#[instrument(skip(invoices))]
pub async fn list_contract_invoices(
    invoices: web::Data<InvoiceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let items = invoices.list_for_contract(path.into_inner()).await?;
    let response: Vec<InvoiceResponse> = items.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// GET /api/v1/invoices/{id}
#[instrument(skip(invoices))]
pub async fn get_invoice(
    invoices: web::Data<InvoiceService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let invoice = invoices.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(InvoiceResponse::from(invoice))))
}

/// Configure invoice routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/invoices").route("/{id}", web::get().to(get_invoice)));
}
