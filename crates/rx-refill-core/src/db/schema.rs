//! SQLite schema definition.

/// Complete database schema for rx-refill.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Prescriptions
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    image_url TEXT,
    status TEXT NOT NULL DEFAULT 'PENDING'
        CHECK (status IN ('PENDING', 'APPROVED', 'REJECTED', 'REQUIRES_CLARIFICATION')),
    review_notes TEXT,
    uploaded_at TEXT NOT NULL,
    reviewed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id);

-- A rejected prescription never changes again
CREATE TRIGGER IF NOT EXISTS prescriptions_rejected_final BEFORE UPDATE OF status ON prescriptions
WHEN old.status = 'REJECTED' AND new.status <> old.status
BEGIN
    SELECT RAISE(ABORT, 'Rejected prescriptions are immutable');
END;

-- ============================================================================
-- Inventory
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventory (
    medicine_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    stock_quantity INTEGER NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
    low_stock_threshold INTEGER NOT NULL DEFAULT 10,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Refill Requests
-- ============================================================================

CREATE TABLE IF NOT EXISTS refill_requests (
    id TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    patient_id TEXT NOT NULL,
    pharmacist_id TEXT,
    address_line1 TEXT NOT NULL,
    address_line2 TEXT,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    pincode TEXT NOT NULL,
    phone TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING'
        CHECK (status IN ('PENDING', 'APPROVED', 'REJECTED', 'FILLED', 'DISPATCHED')),
    requested_at TEXT NOT NULL,
    actioned_at TEXT,
    rejection_reason TEXT
);

-- One refill request per prescription, ever
CREATE UNIQUE INDEX IF NOT EXISTS idx_refill_requests_prescription
    ON refill_requests(prescription_id);
CREATE INDEX IF NOT EXISTS idx_refill_requests_patient ON refill_requests(patient_id);
CREATE INDEX IF NOT EXISTS idx_refill_requests_status ON refill_requests(status);

CREATE TRIGGER IF NOT EXISTS refill_requests_terminal BEFORE UPDATE OF status ON refill_requests
WHEN old.status IN ('REJECTED', 'DISPATCHED') AND new.status <> old.status
BEGIN
    SELECT RAISE(ABORT, 'Refill request is in a terminal state');
END;

-- ============================================================================
-- Fill History
-- ============================================================================

CREATE TABLE IF NOT EXISTS fill_history (
    id TEXT PRIMARY KEY,
    refill_request_id TEXT NOT NULL REFERENCES refill_requests(id),
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    patient_id TEXT NOT NULL,
    pharmacist_id TEXT NOT NULL,
    medicines TEXT NOT NULL DEFAULT '[]',        -- JSON array of FilledMedicine
    status TEXT NOT NULL DEFAULT 'FILLED' CHECK (status IN ('FILLED', 'DISPATCHED')),
    fill_date TEXT NOT NULL,
    refill_reminder_date TEXT                    -- YYYY-MM-DD
);

CREATE INDEX IF NOT EXISTS idx_fill_history_prescription ON fill_history(prescription_id);

-- ============================================================================
-- Refill Reminders
-- ============================================================================

CREATE TABLE IF NOT EXISTS refill_reminders (
    id TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    patient_id TEXT NOT NULL,
    days_until_refill INTEGER NOT NULL,
    reminder_date TEXT NOT NULL,                 -- YYYY-MM-DD
    enabled INTEGER NOT NULL DEFAULT 1,
    sent INTEGER NOT NULL DEFAULT 0,
    sent_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reminders_due ON refill_reminders(reminder_date, enabled, sent);
CREATE INDEX IF NOT EXISTS idx_reminders_patient ON refill_reminders(patient_id);

-- Absent row means reminders are on
CREATE TABLE IF NOT EXISTS reminder_settings (
    patient_id TEXT PRIMARY KEY,
    enabled INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

-- ============================================================================
-- Tracking Events (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS tracking_events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,       -- insertion order
    id TEXT NOT NULL UNIQUE,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    status TEXT NOT NULL CHECK (status IN (
        'UPLOADED', 'APPROVED', 'REFILL_REQUESTED', 'REFILL_APPROVED',
        'FILLING', 'FILLED', 'DISPATCHED', 'DELIVERED'
    )),
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tracking_prescription ON tracking_events(prescription_id, seq);

CREATE TRIGGER IF NOT EXISTS tracking_events_append_only BEFORE UPDATE ON tracking_events
BEGIN
    SELECT RAISE(ABORT, 'Tracking events are append-only');
END;
"#;
