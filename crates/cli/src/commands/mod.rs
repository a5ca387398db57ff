pub mod agent;
pub mod daemon;
pub mod status;
