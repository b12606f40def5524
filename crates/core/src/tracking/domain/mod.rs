pub mod camera_motion;
pub mod effect_event;
pub mod mode;
pub mod target_tracker;
pub mod tracker_config;
