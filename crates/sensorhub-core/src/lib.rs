pub mod errors;
pub mod events;
pub mod provider;
pub mod security;
