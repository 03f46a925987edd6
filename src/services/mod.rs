pub mod convert;
pub mod email;
