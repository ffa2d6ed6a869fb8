pub mod booking;
pub mod business;
pub mod customer;
pub mod messaging;
pub mod notification;
