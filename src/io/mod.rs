pub mod layout;
pub mod progress;
