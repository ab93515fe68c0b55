pub mod broadcasting;
pub mod events;
pub mod extract;
pub mod groups;
pub mod middleware;
pub mod notifications;
pub mod response;
pub mod ws;
