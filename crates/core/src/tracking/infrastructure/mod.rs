pub mod periodic_motion;
