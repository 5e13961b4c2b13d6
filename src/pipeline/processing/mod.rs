// Pipeline processing: normalization, merging and refinement

pub mod merge;
pub mod normalize;
pub mod refine;

pub use merge::{deduplicate, merge_locations, MergeReport};
pub use refine::{refine_all, refine_location, RefineSummary};
