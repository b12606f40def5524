pub mod person_extractor;
