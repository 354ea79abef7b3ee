pub mod context;
pub mod extractors;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod services;
