//! Row types for the device storage tables.

pub struct DeviceRow {
    pub id: String,
    pub created_at: String,
    pub last_seen_at: String,
}

pub struct StorageItemRow {
    pub device_id: String,
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
