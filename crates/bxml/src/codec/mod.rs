//! Token, value, and count encodings of the BXML wire format.

pub mod charset;
pub mod count;
pub mod token;
pub mod value;

pub use charset::Charset;
pub use count::CountForm;
pub use token::TokenType;
pub use value::ValueType;
