pub mod events;
pub mod hub;
pub mod locations;
pub mod room;
pub mod ticket;
pub mod tracker;
