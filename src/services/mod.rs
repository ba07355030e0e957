pub mod lending_service;
pub mod paystack_service;
pub mod sweep;
