//! SQL schema for a per-security SQLite store.
//!
//! Executed every time a store is opened. `PRAGMA user_version` records the
//! schema revision; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS basic_info (
    symbol        TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    industry      TEXT NOT NULL,
    area          TEXT NOT NULL,
    market        TEXT NOT NULL,
    listing_date  TEXT NOT NULL,   -- provider's own format
    updated_at    TEXT NOT NULL    -- RFC 3339 UTC, fixed width; write time
);

CREATE TABLE IF NOT EXISTS daily_price (
    symbol      TEXT NOT NULL,
    trade_date  TEXT NOT NULL,     -- YYYY-MM-DD
    open        REAL NOT NULL,
    high        REAL NOT NULL,
    low         REAL NOT NULL,
    close       REAL NOT NULL,
    volume      REAL NOT NULL,
    amount      REAL NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (symbol, trade_date)
);

CREATE TABLE IF NOT EXISTS financial_metric (
    symbol        TEXT NOT NULL,
    report_date   TEXT NOT NULL,   -- YYYY-MM-DD
    roe           REAL NOT NULL,
    net_margin    REAL NOT NULL,
    gross_margin  REAL NOT NULL,
    eps           REAL NOT NULL,
    net_profit    REAL NOT NULL,
    revenue       REAL NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (symbol, report_date)
);

CREATE TABLE IF NOT EXISTS insider_trade (
    symbol          TEXT NOT NULL,
    holder_name     TEXT NOT NULL,
    change_date     TEXT NOT NULL, -- YYYY-MM-DD
    change_type     TEXT NOT NULL,
    shares_changed  REAL NOT NULL,
    price           REAL NOT NULL,
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (symbol, holder_name, change_date)
);

-- Rolling 30-day window on published_at.
CREATE TABLE IF NOT EXISTS news_item (
    symbol        TEXT NOT NULL,
    title         TEXT NOT NULL,
    published_at  TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    source        TEXT NOT NULL,
    url           TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (symbol, title, published_at)
);

-- Rolling 30-day window on updated_at.
CREATE TABLE IF NOT EXISTS valuation_snapshot (
    symbol              TEXT NOT NULL,
    snapshot_date       TEXT NOT NULL, -- YYYY-MM-DD
    market_cap          REAL NOT NULL,
    total_shares        REAL NOT NULL,
    outstanding_shares  REAL NOT NULL,
    pe_ratio            REAL NOT NULL,
    pb_ratio            REAL NOT NULL,
    updated_at          TEXT NOT NULL,
    PRIMARY KEY (symbol, snapshot_date)
);

-- Last successful refresh per collection, empty or not.
CREATE TABLE IF NOT EXISTS sync_state (
    symbol     TEXT NOT NULL,
    kind       TEXT NOT NULL,      -- entity kind, snake_case
    synced_at  TEXT NOT NULL,      -- RFC 3339 UTC, fixed width
    PRIMARY KEY (symbol, kind)
);

CREATE INDEX IF NOT EXISTS news_item_published_idx   ON news_item(published_at);
CREATE INDEX IF NOT EXISTS valuation_updated_idx     ON valuation_snapshot(updated_at);

PRAGMA user_version = 2;
";
