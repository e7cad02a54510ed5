pub mod catalog;
pub mod schedule;
pub mod slots;

pub use catalog::CatalogService;
pub use schedule::ScheduleService;
pub use slots::SlotService;
