//! Query parsing: textual requests in, resolved specs or issue reports out.

mod parser;
mod query_spec;
mod request;

pub use parser::QueryParser;
pub use query_spec::{
    OrderByInstance, OrderBySpec, QueryResolution, ResolvedQuerySpec, WhereFilterSpec,
};
pub use request::QueryRequest;
