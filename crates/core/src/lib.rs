pub mod config;
pub mod criteria;
pub mod errors;
pub mod filter;
pub mod literature;

pub use criteria::compile;
pub use errors::PipelineError;
pub use filter::{FieldVocabulary, Filter, FilterError, FilterValue, Operator, Scalar, ValueNode};
pub use literature::{Category, Complexity};
