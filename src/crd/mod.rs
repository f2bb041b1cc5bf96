pub mod conditions;
pub mod control_plane;
pub mod nova;
