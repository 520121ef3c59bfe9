pub mod fetch;
pub mod http_client;
pub mod ingest;
pub mod parse;
pub mod partnership;
pub mod phase;
pub mod session;
pub mod store;
