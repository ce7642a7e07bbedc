use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Mensagem exibida (modal bloqueante) quando uma escrita falha.
pub const WRITE_FAILURE_MESSAGE: &str =
    "Failed to save changes. Please check your connection and try again.";

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Documento não encontrado: {0}")]
    DocumentNotFound(String),

    #[error("Conta não encontrada: {0}")]
    AccountNotFound(String),

    #[error("Nenhum rascunho aberto para a conta {0}")]
    DraftNotFound(String),

    #[error("Contato {0} não encontrado")]
    ContactNotFound(usize),

    #[error("Telefone {phone} do contato {contact} não encontrado")]
    PhoneNotFound { contact: usize, phone: usize },

    #[error("Endereço {0} não encontrado no histórico")]
    HistoryEntryNotFound(usize),

    #[error("Não é possível arquivar o último contato ativo")]
    LastActiveContact,

    #[error("Contato {0} está arquivado")]
    ContactArchived(usize),

    #[error("O rascunho não está em modo de edição")]
    NotEditing,

    #[error("Existe uma edição em andamento para esta conta")]
    EditInProgress,

    // ValidationBlock: CEP fora da área de atendimento sem override
    #[error("CEP {0} fora da área de atendimento")]
    OutOfServiceArea(String),

    #[error("Lista de configurações desconhecida: {0}")]
    InvalidSettingsList(String),

    // Falha de rede/armazenamento ao salvar. O rascunho é mantido.
    #[error("Falha de escrita: {0}")]
    WriteFailure(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de serialização: {0}")]
    SerializationError(#[from] serde_json::Error),

    // Variante genérica para qualquer outro erro inesperado
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidSettingsList(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DocumentNotFound(_)
            | AppError::AccountNotFound(_)
            | AppError::DraftNotFound(_)
            | AppError::ContactNotFound(_)
            | AppError::PhoneNotFound { .. }
            | AppError::HistoryEntryNotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailAlreadyExists
            | AppError::LastActiveContact
            | AppError::ContactArchived(_)
            | AppError::NotEditing
            | AppError::EditInProgress => StatusCode::CONFLICT,
            AppError::OutOfServiceArea(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::WriteFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte qualquer falha de persistência em `WriteFailure`,
    /// preservando os erros de domínio (ex.: conta inexistente).
    pub fn into_write_failure(self) -> AppError {
        match self {
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::SerializationError(_) => AppError::WriteFailure(self.to_string()),
            other => other,
        }
    }

    // Erro de validação de um único campo, montado fora do derive
    pub fn validation(field: &'static str, code: &'static str, message: &str) -> AppError {
        let mut error = validator::ValidationError::new(code);
        error.message = Some(message.to_string().into());
        let mut errors = validator::ValidationErrors::new();
        errors.add(field, error);
        AppError::ValidationError(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid.",
                    "details": details,
                }));
                return (status, body).into_response();
            }
            AppError::InvalidCredentials => {
                "Failed to log in. Please check your email and password.".to_string()
            }
            AppError::InvalidToken => "Missing or invalid authentication token.".to_string(),
            AppError::Forbidden => "You do not have permission to access this resource.".to_string(),
            AppError::EmailAlreadyExists => "This email is already in use.".to_string(),
            AppError::DocumentNotFound(_) => "Document not found.".to_string(),
            AppError::AccountNotFound(_) => "Account not found.".to_string(),
            AppError::DraftNotFound(_) => "No open draft for this account.".to_string(),
            AppError::ContactNotFound(index) => format!("Contact {} not found.", index + 1),
            AppError::PhoneNotFound { contact, phone } => {
                format!("Phone {} of contact {} not found.", phone + 1, contact + 1)
            }
            AppError::HistoryEntryNotFound(_) => "Address history entry not found.".to_string(),
            AppError::LastActiveContact => {
                "An account must keep at least one active contact.".to_string()
            }
            AppError::ContactArchived(index) => format!("Contact {} is archived. Restore it first.", index + 1),
            AppError::NotEditing => "The draft is not in edit mode.".to_string(),
            AppError::EditInProgress => {
                "Finish or cancel the current edit before restoring an address.".to_string()
            }
            AppError::OutOfServiceArea(zip) => format!(
                "Zip code {} is outside the service area. Set the override to save anyway.",
                zip
            ),
            AppError::InvalidSettingsList(list) => format!("Unknown settings list '{}'.", list),
            AppError::WriteFailure(ref cause) => {
                tracing::error!("🔥 Falha de escrita: {}", cause);
                WRITE_FAILURE_MESSAGE.to_string()
            }

            // Todos os outros erros viram 500.
            // O `tracing` vai logar a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                "An unexpected error occurred.".to_string()
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn write_failure_uses_the_retry_message() {
        let response = AppError::WriteFailure("connection reset".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], WRITE_FAILURE_MESSAGE);
    }

    #[test]
    fn store_errors_become_write_failures_but_domain_errors_survive() {
        let db = AppError::InternalServerError(anyhow::anyhow!("timeout")).into_write_failure();
        assert!(matches!(db, AppError::WriteFailure(_)));

        let missing = AppError::AccountNotFound("abc".into()).into_write_failure();
        assert!(matches!(missing, AppError::AccountNotFound(_)));
    }

    #[test]
    fn validation_block_is_unprocessable() {
        let err = AppError::OutOfServiceArea("99999".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
