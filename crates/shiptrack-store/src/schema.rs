//! Shipment store database schema.

/// SQL to create the shipments table.
pub const CREATE_SHIPMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS shipments (
    id              UUID PRIMARY KEY,
    tracking_number VARCHAR(32) NOT NULL UNIQUE,
    revision        BIGINT NOT NULL,
    document        JSONB NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_shipments_created_at
    ON shipments (created_at DESC);
";
