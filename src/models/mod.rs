pub mod contract;
pub mod dashboard;
pub mod employee;
pub mod expense;
pub mod payment;
pub mod project;
pub mod update;
pub mod user;
pub mod work_log;

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "ok")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
