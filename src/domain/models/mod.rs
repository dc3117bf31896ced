pub mod auth_token;
pub mod login_token;
pub mod one_time_token;
pub mod session;
pub mod token_state;
pub mod user;
