pub mod oauth_identity_repository;
pub mod one_time_token_repository;
pub mod session_repository;
pub mod user_repository;
