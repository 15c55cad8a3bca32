pub mod parser;
pub mod statement;

pub use parser::prepare;
pub use statement::Statement;
