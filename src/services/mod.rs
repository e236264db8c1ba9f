pub mod cleanup;
pub mod conversion;
pub mod discovery;
pub mod intake;
pub mod job_store;
pub mod pipeline;
pub mod rasterizer;
pub mod storage;
pub mod upload;
pub mod workspace;
pub mod worker;
