pub mod clock;
pub mod ease;
pub mod layer;
pub mod scheduler;
