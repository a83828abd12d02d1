pub mod ingestion;

pub use ingestion::IngestionService;
