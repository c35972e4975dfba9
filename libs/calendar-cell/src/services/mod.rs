pub mod busy;
pub mod connections;
pub mod events;
pub mod token;

pub use busy::BusyFetcher;
pub use connections::ConnectionService;
pub use events::CalendarEventService;
pub use token::TokenManager;
