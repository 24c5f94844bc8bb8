pub mod booking;
pub mod donations;
pub mod feed;
pub mod matcher;
pub mod orders;
pub mod profiles;
