// Analysis wizard: step state, the controller that drives it, per-session
// snapshots, and the live session registry behind the HTTP handlers.

pub mod controller;
pub mod handlers;
pub mod sessions;
pub mod snapshot;
pub mod state;
