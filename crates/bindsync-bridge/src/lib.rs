pub mod adapter;
pub mod echo;
pub mod mapper;
pub mod relay;
