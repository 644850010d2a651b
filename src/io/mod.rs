// src/io/mod.rs
pub mod csv_source;
pub mod csv_writer;
pub mod metadata_store;
pub mod notifier;

pub use csv_source::CsvRecordSource;
pub use csv_writer::CsvMatchWriter;
pub use metadata_store::YamlMetadataStore;
pub use notifier::{LogNotifier, SpoolNotifier};

use crate::pipeline::collaborators::Collaborators;

/// CSV in, CSV out, YAML metadata.
pub fn file_collaborators() -> Collaborators {
    Collaborators {
        source: Box::new(CsvRecordSource::new()),
        writer: Box::new(CsvMatchWriter::new()),
        metadata_store: Box::new(YamlMetadataStore::new()),
    }
}
