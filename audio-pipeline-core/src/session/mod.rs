pub mod capture_session;
pub mod environment;
pub mod lifecycle;
