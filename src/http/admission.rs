//! Per-IP admission middleware.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use super::client_ip::ClientIpResolver;
use crate::ratelimit::RateLimiterGate;

/// Outcome of checking one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Hand the request to the rest of the pipeline
    Continue,
    /// The client is over its limit
    TooManyRequests,
    /// The limiter could not decide; the request is refused
    Unavailable,
}

impl AdmissionDecision {
    /// The status a rejected request is answered with.
    pub fn rejection_status(&self) -> Option<StatusCode> {
        match self {
            AdmissionDecision::Continue => None,
            AdmissionDecision::TooManyRequests => Some(StatusCode::TOO_MANY_REQUESTS),
            AdmissionDecision::Unavailable => Some(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

/// Shared state for [`admit`].
#[derive(Debug, Clone)]
pub struct RequestAdmission {
    gate: RateLimiterGate,
    resolver: ClientIpResolver,
}

impl RequestAdmission {
    /// Create admission state from a gate and a client address resolver.
    pub fn new(gate: RateLimiterGate, resolver: ClientIpResolver) -> Self {
        Self { gate, resolver }
    }

    /// Decide whether a request from `client` may proceed.
    ///
    /// Store failures fail closed.
    pub async fn decide(&self, client: IpAddr) -> AdmissionDecision {
        match self.gate.allow(&client.to_string()).await {
            Ok(true) => AdmissionDecision::Continue,
            Ok(false) => AdmissionDecision::TooManyRequests,
            Err(e) => {
                error!(client = %client, error = %e, "Rate limit check failed, rejecting request");
                AdmissionDecision::Unavailable
            }
        }
    }
}

/// Middleware rejecting requests from clients over the IP policy.
///
/// Requires the router to be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn admit(
    State(admission): State<RequestAdmission>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let Some(peer) = peer else {
        error!("Request has no peer address, rejecting");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let client = admission.resolver.resolve(peer, req.headers());
    let decision = admission.decide(client).await;

    match decision.rejection_status() {
        None => next.run(req).await,
        Some(status) => {
            if decision == AdmissionDecision::TooManyRequests {
                debug!(client = %client, path = %req.uri().path(), "Request rate limited");
            }
            status.into_response()
        }
    }
}
