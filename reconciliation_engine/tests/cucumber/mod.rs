mod reconciler_world;
mod setups;
mod steps;

pub use reconciler_world::ReconcilerWorld;
