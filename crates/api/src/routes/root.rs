//! Root greeting endpoint.

/// Body returned by `GET /`.
pub const GREETING: &str = "Re.Power Backend API running 🚀";

/// GET / — confirms the API is up.
pub async fn greet() -> &'static str {
    GREETING
}
