pub mod aggregation;
pub mod goals;
pub mod notifications;
pub mod report;

pub use goals::GoalService;
pub use notifications::NotificationService;
pub use report::ReportService;
