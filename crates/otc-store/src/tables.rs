//! Column family names for each of the seven persisted tables in
//! spec.md §6.2, plus the internal `meta` family used for the schema
//! version (`otc-store::version`).

pub const DEALS: &str = "deals";
pub const TOKENS: &str = "tokens";
pub const PARTY_DETAILS: &str = "party_details";
pub const DEPOSITS: &str = "deposits";
pub const QUEUE: &str = "queue";
pub const ORACLE_QUOTES: &str = "oracle_quotes";
pub const WATCHER_CURSORS: &str = "watcher_cursors";

pub const ALL: &[&str] =
    &[crate::version::META_CF, DEALS, TOKENS, PARTY_DETAILS, DEPOSITS, QUEUE, ORACLE_QUOTES, WATCHER_CURSORS];

/// Tables whose absence on an already-existing database is a fatal
/// startup condition (spec.md §9: the source's silent "accept any
/// token" fallback on a missing `tokens` table is a bug, not a
/// feature).
pub const REQUIRED_ON_EXISTING_DB: &[&str] = &[TOKENS];
