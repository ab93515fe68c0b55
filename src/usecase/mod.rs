pub mod authorizer;
pub mod broadcast;
pub mod contracts;
pub mod dispatcher;
pub mod enrollment;
pub mod error;
pub mod events;
pub mod jwt;
pub mod notifications;
pub mod smtp;
pub mod worker;
