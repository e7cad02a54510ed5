pub mod booking;
pub mod lifecycle;
pub mod messaging;
pub mod payment;
pub mod policy;
pub mod validation;
pub mod wizard;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use payment::PaymentService;
pub use wizard::BookingWizard;
