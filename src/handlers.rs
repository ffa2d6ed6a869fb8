pub mod bookings;
pub mod messaging;
