pub mod auth;
pub mod error;
pub mod status;

pub use status::{AppointmentStatus, PaymentStatus};
