// web-server/src/middleware/mod.rs
pub mod rate_limiter;

pub use self::rate_limiter::RateLimiter;
