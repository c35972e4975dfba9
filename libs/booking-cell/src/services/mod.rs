pub mod booking;
pub mod crm;
pub mod lifecycle;
pub mod meetings;
pub mod progress;

pub use booking::BookingService;
pub use crm::{CrmError, LawmaticsClient};
pub use lifecycle::MeetingLifecycleService;
pub use meetings::MeetingService;
pub use progress::ProgressLogger;
