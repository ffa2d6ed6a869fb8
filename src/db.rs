pub mod business_repo;
pub use business_repo::{BusinessRepository, PgBusinessRepository};
pub mod customer_repo;
pub use customer_repo::{CustomerRepository, PgCustomerRepository};
pub mod booking_repo;
pub use booking_repo::{BookingRepository, PgBookingRepository};
pub mod notification_repo;
pub use notification_repo::{NotificationRepository, PgNotificationRepository};
pub mod credential_repo;
pub use credential_repo::{CredentialRepository, PgCredentialRepository};
