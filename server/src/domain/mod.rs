//! Filter domain logic
//!
//! - `filter` - Filter tree parsing and the recursive compiler
//! - `comparisons` - Operator registry and built-in comparison sources
//! - `functions` - Value function registry and built-in function sources

pub mod comparisons;
pub mod filter;
pub mod functions;

pub use comparisons::{Comparison, ComparisonRegistry, ComparisonSource};
pub use filter::{ComplexFilter, FilterError, FilterRegistries, RequestContext, SharedRegistries};
pub use functions::{FunctionRegistry, FunctionSource};
