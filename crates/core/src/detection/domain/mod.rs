pub mod detection;
pub mod face_detector;
