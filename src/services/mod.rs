pub mod assembly_service;
pub mod attempt_service;
pub mod grading_service;
pub mod media_service;
pub mod score_service;
pub mod snapshot_service;
pub mod test_service;
pub mod version_service;
