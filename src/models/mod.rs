pub mod booking;
pub mod donation;
pub mod profile;
pub mod session;
