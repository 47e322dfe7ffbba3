pub mod booking;
pub mod error;
pub mod events;
pub mod payment;
pub mod repository;
pub mod route;
pub mod seats;
