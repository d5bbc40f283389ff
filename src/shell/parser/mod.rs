pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::Segment;
pub use parser::Parser;
