//! Query Compilation and Execution
//!
//! Compiles compact query strings into targets and runs them:
//!
//! - **AST**: the compiled [`TargetSeries`]
//! - **Parser**: query string compiler
//! - **Executor**: runs targets against a series store
//! - **Result**: output series assembly and serialization
//!
//! # Query Language
//!
//! ```text
//! [lookback<] measurement.field[.filter][=>stage,arg,...]*
//! filter := token (('&' | '|') token)*
//! token  := key (= | <= | >= | < | > | ~) value
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use chronicle_query::query::{compile_query, QueryExecutor};
//! use chronicle_query::storage::{MemoryStore, TimeRange};
//!
//! let target = compile_query("cpu.usage.host=web1|host=web2=>add,10")?;
//!
//! let executor = QueryExecutor::new(Arc::new(store));
//! let output = executor.execute("metrics", &target, TimeRange::all())?;
//! println!("{}", serde_json::to_string(&output.series)?);
//! ```

mod ast;
mod error;
mod executor;
mod parser;
mod result;

pub use ast::TargetSeries;
pub use error::{QueryError, QueryResult};
pub use executor::{QueryExecutor, QueryOutput};
pub use parser::compile_query;
pub use result::{assemble, sort_by_target, write_csv, OutputSeries};
