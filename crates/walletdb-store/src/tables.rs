//! Redb table definitions for persistent secret storage.

use redb::TableDefinition;

// Key: caller-chosen record name, Value: versioned JSON record or legacy raw bytes
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
