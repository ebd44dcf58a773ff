//! # DAB Service List Parser
//!
//! Decodes the GET_DIGITAL_SERVICE_LIST reply:
//!
//! ```text
//! Byte 4-5:   LIST_SIZE (u16 le)
//! Byte 6-7:   VERSION (u16 le)
//! Byte 8:     NUM_SERVICES
//! Byte 9-11:  padding
//! Byte 12...: service records
//!
//! Service record (24 + 4 * components bytes):
//!   +0   SERVICE_ID (u32 le)
//!   +5   NUM_COMPONENTS (low nibble)
//!   +8   LABEL (16 bytes)
//!   +24  COMPONENT_ID (u16 le), one every 4 bytes
//! ```
//!
//! Parsing is best effort: a record that does not fit the buffer or the
//! list capacity ends the parse and marks the list truncated.

use tracing::{debug, warn};

use crate::error::{Result, Si46xxError};
use crate::protocol::decoder::decode_label;

/// Largest number of services kept from one list
pub const MAX_SERVICES: usize = 32;

/// Component count is a 4-bit field
pub const MAX_COMPONENTS: usize = 15;

const LIST_HEADER_LEN: usize = 6;
const LIST_FIELDS_LEN: usize = 9;
const RECORDS_OFFSET: usize = 12;
const RECORD_HEADER_LEN: usize = 24;
const COMPONENT_STRIDE: usize = 4;
const LABEL_OFFSET: usize = 8;
const LABEL_LEN: usize = 16;

/// One broadcast service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceListEntry {
    pub service_id: u32,
    /// Raw label bytes as broadcast
    pub label: [u8; LABEL_LEN],
    pub component_ids: Vec<u16>,
}

impl ServiceListEntry {
    /// Label up to its first NUL, trailing blanks removed
    pub fn label(&self) -> String {
        decode_label(&self.label)
    }

    /// First component, the one started by index
    pub fn primary_component(&self) -> Option<u16> {
        self.component_ids.first().copied()
    }
}

/// Decoded service directory of the current ensemble
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceList {
    pub list_size: u16,
    pub version: u16,
    /// Service count declared by the chip
    pub num_services: u8,
    /// Decoded services, ascending by service id
    pub entries: Vec<ServiceListEntry>,
    /// True if declared records were dropped for lack of data or capacity
    pub truncated: bool,
}

impl ServiceList {
    /// Decode a service list reply, best effort
    ///
    /// # Arguments
    ///
    /// * `buf` - Full dynamic reply, header included
    ///
    /// # Returns
    ///
    /// * `ServiceList` - Every record that fit; replies under 6 bytes give
    ///   an empty list
    pub fn parse(buf: &[u8]) -> ServiceList {
        let mut list = ServiceList::default();

        if buf.len() < LIST_HEADER_LEN {
            return list;
        }
        if buf.len() >= LIST_FIELDS_LEN {
            list.list_size = u16::from_le_bytes([buf[4], buf[5]]);
            list.version = u16::from_le_bytes([buf[6], buf[7]]);
            list.num_services = buf[8];
        }

        let mut pos = RECORDS_OFFSET;
        for index in 0..list.num_services as usize {
            if index >= MAX_SERVICES {
                warn!(
                    "Service list declares {} services, keeping {}",
                    list.num_services, MAX_SERVICES
                );
                list.truncated = true;
                break;
            }

            match parse_record(buf, pos) {
                Some((entry, next)) => {
                    list.entries.push(entry);
                    pos = next;
                }
                None => {
                    warn!(
                        "Service record {} at offset {} runs past {} byte reply",
                        index,
                        pos,
                        buf.len()
                    );
                    list.truncated = true;
                    break;
                }
            }
        }

        // stable: equal ids keep their broadcast order
        list.entries.sort_by_key(|e| e.service_id);

        debug!(
            "Service list v{}: {} of {} services",
            list.version,
            list.entries.len(),
            list.num_services
        );
        list
    }

    /// Decode a service list reply, rejecting truncated input
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if any declared record could not be decoded
    pub fn parse_strict(buf: &[u8]) -> Result<ServiceList> {
        let list = Self::parse(buf);
        if list.truncated {
            return Err(Si46xxError::Truncated(format!(
                "service list: {} of {} records decoded",
                list.entries.len(),
                list.num_services
            )));
        }
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ServiceListEntry> {
        self.entries.get(index)
    }

    pub fn find(&self, service_id: u32) -> Option<&ServiceListEntry> {
        self.entries.iter().find(|e| e.service_id == service_id)
    }
}

/// Decode the record at `pos`, returning it with the next record's offset
fn parse_record(buf: &[u8], pos: usize) -> Option<(ServiceListEntry, usize)> {
    let header = buf.get(pos..pos + RECORD_HEADER_LEN)?;

    let service_id = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let count = (header[5] & 0x0F) as usize;

    let mut label = [0u8; LABEL_LEN];
    label.copy_from_slice(&header[LABEL_OFFSET..LABEL_OFFSET + LABEL_LEN]);

    let mut component_ids = Vec::with_capacity(count.min(MAX_COMPONENTS));
    for i in 0..count {
        let at = pos + RECORD_HEADER_LEN + i * COMPONENT_STRIDE;
        let raw = buf.get(at..at + 2)?;
        component_ids.push(u16::from_le_bytes([raw[0], raw[1]]));
    }

    let next = pos + RECORD_HEADER_LEN + count * COMPONENT_STRIDE;
    Some((
        ServiceListEntry {
            service_id,
            label,
            component_ids,
        },
        next,
    ))
}
