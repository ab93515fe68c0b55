pub mod definition;
pub mod group;
pub mod mail;
pub mod notification;
pub mod topic;
pub mod user;
