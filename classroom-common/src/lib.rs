pub mod merge;
pub mod model;
pub mod ordering;
pub mod util;
