pub mod extract;
pub mod inputs;
pub mod stages;
pub mod topology;
