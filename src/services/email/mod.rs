pub mod attachment;
pub mod dispatcher;
pub mod mailbox;
pub mod spool;
pub mod supervisor;
