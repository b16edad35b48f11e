pub mod assignment;
pub mod state_machine;
pub mod transitions;
