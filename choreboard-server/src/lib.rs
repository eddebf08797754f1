pub mod completion;
pub mod photos;
pub mod report;
pub mod server;
pub mod storage;
