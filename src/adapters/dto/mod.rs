pub mod auth_dto;
mod token_dto;
mod user_dto;
