//! Flash-backed record store. One full image per load/save so a reader can
//! never observe a torn mix of old and new fields.

use embedded_storage::{ReadStorage, Storage};

use super::record::{ConnectionRecord, RECORD_LEN, RECORD_MAGIC};

pub struct RecordStore<S> {
    storage: S,
    offset: u32,
}

impl<S> RecordStore<S>
where
    S: ReadStorage + Storage,
{
    pub fn new(storage: S, offset: u32) -> Self {
        Self { storage, offset }
    }

    /// Reads the fixed-size region and reports whether the marker matched.
    /// An unreadable or uninitialized region is a zeroed, invalid record;
    /// startup then simply takes the slow path.
    pub fn load(&mut self) -> (ConnectionRecord, bool) {
        let mut buf = [0u8; RECORD_LEN];
        if self.storage.read(self.offset, &mut buf).is_err() {
            return (ConnectionRecord::zeroed(), false);
        }
        let record = ConnectionRecord::decode(&buf);
        let valid = record.is_valid();
        (record, valid)
    }

    /// Stamps the marker and writes the whole image. Best-effort: a failed
    /// write only costs the next boot its fast path.
    pub fn save(&mut self, record: &ConnectionRecord) -> bool {
        let mut image = *record;
        image.magic = RECORD_MAGIC;
        let mut buf = [0u8; RECORD_LEN];
        image.encode(&mut buf);
        self.storage.write(self.offset, &buf).is_ok()
    }
}
