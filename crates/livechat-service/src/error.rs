//! Service layer error types

use livechat_core::CoreError;
use livechat_gateway::GatewayError;

/// Service layer error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Invalid room {0:?}, expected <room id>:<channel id>")]
    InvalidRoom(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
