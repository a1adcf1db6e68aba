pub mod candidate_file;
pub mod document;
pub mod prepared_document;
pub mod province;
