//! HTTP surface: IP admission middleware and code routes.

mod admission;
mod client_ip;
mod error;
mod routes;

pub use admission::{admit, AdmissionDecision, RequestAdmission};
pub use client_ip::ClientIpResolver;
pub use routes::{router, SendCodeRequest, VerifyCodeRequest};
