pub mod imap;
pub mod logging;
pub mod printer;
