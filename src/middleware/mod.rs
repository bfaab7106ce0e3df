pub mod error_handling;
pub mod trace_id;

pub use error_handling::error_handling_middleware;
pub use trace_id::{trace_id_middleware, TraceId};
