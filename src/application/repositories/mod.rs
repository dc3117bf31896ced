pub mod login_token_repository;
pub mod one_time_token_repository;
pub mod user_repository;
