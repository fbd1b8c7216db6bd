//! HTTP API for the OMS
//!
//! Identity comes from trusted gateway headers (see [`identity`]).

pub mod handlers;
pub mod identity;
pub mod models;
pub mod routes;

use std::sync::Arc;

use observability::HttpMetrics;

use crate::manager::OrderManager;

pub use identity::Caller;
pub use routes::{create_api_state, create_router};

pub struct OmsApiState {
    pub manager: Arc<OrderManager>,
    pub http_metrics: HttpMetrics,
}
