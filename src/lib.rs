pub mod audio;
pub mod bubble;
pub mod events;
pub mod notes;
pub mod orchestra;
pub mod physics;
pub mod placement;
pub mod pond;
pub mod score;
pub mod simulator;
pub mod themes;
pub mod types;
