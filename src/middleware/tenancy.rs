// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;
use crate::common::error::ApiError; // Usamos o nosso ApiError para rejeição

// O nome do nosso cabeçalho HTTP customizado
const TENANT_ID_HEADER: &str = "x-tenant-id";

// O estabelecimento (business) em nome do qual o painel está operando.
// A autenticação que garante o acesso fica na camada externa.
#[derive(Debug, Clone)]
pub struct TenantContext(pub Uuid);

fn bad_header(code: &str, message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        code: code.to_string(),
        error: message.to_string(),
        details: None,
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_ID_HEADER)
            .ok_or_else(|| bad_header("missing_tenant", "O cabeçalho X-Tenant-ID é obrigatório."))?;

        let value_str = value.to_str().map_err(|_| {
            bad_header("invalid_tenant", "Cabeçalho X-Tenant-ID contém caracteres inválidos.")
        })?;

        let tenant_id = Uuid::parse_str(value_str).map_err(|_| {
            bad_header("invalid_tenant", "Cabeçalho X-Tenant-ID inválido (não é um UUID).")
        })?;

        Ok(TenantContext(tenant_id))
    }
}
