pub mod code_repository;
pub mod education_repository;
pub mod graduate_repository;
pub mod new_comer_repository;
pub mod statistics_repository;

pub use code_repository::CodeRepository;
pub use education_repository::EducationRepository;
pub use graduate_repository::GraduateRepository;
pub use new_comer_repository::NewComerRepository;
pub use statistics_repository::StatisticsRepository;
