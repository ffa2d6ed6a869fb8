pub mod availability;
pub mod booking_admission;
pub mod booking_lifecycle;
pub mod channel_api;
pub mod conflict;
pub mod customer_resolver;
pub mod form_fields;
pub mod notification_dispatcher;
pub mod reminders;
pub mod templates;
pub mod token_lifecycle;
