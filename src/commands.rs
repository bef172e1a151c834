pub mod ingest;
pub mod pages;
pub mod status;
pub mod structure;
