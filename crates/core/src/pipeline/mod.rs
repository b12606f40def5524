pub mod pipeline_logger;
pub mod track_faces_use_case;
