pub mod geocode_use_case;
pub mod merge_use_case;
pub mod ports;
pub mod refine_use_case;

pub use geocode_use_case::{GeocodeReport, GeocodeUseCase};
pub use merge_use_case::MergeUseCase;
pub use refine_use_case::RefineUseCase;
