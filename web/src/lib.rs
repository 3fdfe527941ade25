//! Axum integration for the gatecheck services.
//!
//! Handlers stay thin: extract the request, call the domain service, map the
//! result to a response. This crate holds the pieces every handler shares.
//!
//! # Request Flow
//!
//! 1. **Correlation ID** is read from `X-Correlation-ID` (or generated)
//! 2. **Handler** extracts JSON / query parameters and calls the service
//! 3. **Expected outcomes** (including business-level refusals) return `200 OK`
//! 4. **Infrastructure failures** become an [`AppError`] with a JSON body
//!
//! # Example
//!
//! ```ignore
//! use gatecheck_web::{AppError, correlation_id_layer};
//! use axum::{Router, routing::post, Json};
//!
//! async fn submit(
//!     State(state): State<AppState>,
//!     Json(request): Json<OrderRequest>,
//! ) -> Result<Json<OrderResponse>, AppError> {
//!     let order = state.orders.place(request).await?;
//!     Ok(Json(order.into()))
//! }
//!
//! let app = Router::new()
//!     .route("/api/orders", post(submit))
//!     .layer(correlation_id_layer())
//!     .with_state(app_state);
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
