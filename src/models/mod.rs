pub mod delivery;
pub mod driver;
pub mod order;
pub mod restaurant;
pub mod user;
