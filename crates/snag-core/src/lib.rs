pub mod config;
pub mod logging;

pub mod archive;
pub mod checksum;
pub mod corruption;
pub mod extract;
pub mod fetcher;
pub mod http;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod render;
pub mod report;
pub mod storage;
pub mod url_model;
pub mod validate;
