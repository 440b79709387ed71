//! Built-in stage processors.

pub mod labelling;
pub mod resolver;
pub mod source;
pub mod threshold;

pub use labelling::LabellingNode;
pub use resolver::ResolverNode;
pub use source::{detect_csv_width, CsvSource, GridSource, RandomSource};
pub use threshold::ThresholdNode;
