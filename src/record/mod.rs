pub mod schema;

use crate::errors::Error;
use crate::pages::slotted_page::TOMBSTONE_LIVE;
use crate::pages::{PageId, SlotId};
use crate::types::Value;
use anyhow::{bail, ensure, Result};
use schema::Schema;

/// Page and slot locating a record inside its table.
pub type RecordId = (PageId, SlotId);

/// A materialized record: exactly `schema.record_size()` bytes, byte 0 the
/// tombstone, the attributes behind it in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Option<RecordId>,
    data: Box<[u8]>,
}

impl Record {
    pub fn new(values: Vec<Value>, schema: &Schema) -> Result<Self> {
        ensure!(
            values.len() == schema.attrs.len(),
            "schema has {} attributes, got {} values",
            schema.attrs.len(),
            values.len()
        );

        let mut data = vec![0u8; schema.record_size()];
        data[0] = TOMBSTONE_LIVE;

        for (i, (value, attr)) in values.iter().zip(schema.attrs.iter()).enumerate() {
            if value.dtype() != attr.dtype {
                bail!(Error::TypeMismatch(
                    attr.dtype.to_string(),
                    value.dtype().to_string()
                ));
            }
            let offset = schema.attr_offset(i);
            data[offset..offset + attr.size()].copy_from_slice(&value.to_bytes(attr.len));
        }

        Ok(Self {
            id: None,
            data: data.into_boxed_slice(),
        })
    }

    /// Rebuilds a record from raw slot bytes (tombstone included).
    pub fn from_bytes(id: RecordId, bytes: &[u8]) -> Self {
        Self {
            id: Some(id),
            data: bytes.to_vec().into_boxed_slice(),
        }
    }

    /// Decodes attribute `i` into a fresh [`Value`].
    pub fn get_attr(&self, i: usize, schema: &Schema) -> Result<Value> {
        ensure!(i < schema.attrs.len(), "attribute index {i} out of bounds");

        let attr = &schema.attrs[i];
        let offset = schema.attr_offset(i);
        Ok(Value::from_bytes(
            attr.dtype,
            &self.data[offset..offset + attr.size()],
        ))
    }

    pub fn set_attr(&mut self, i: usize, schema: &Schema, value: &Value) -> Result<()> {
        ensure!(i < schema.attrs.len(), "attribute index {i} out of bounds");

        let attr = &schema.attrs[i];
        if value.dtype() != attr.dtype {
            bail!(Error::TypeMismatch(
                attr.dtype.to_string(),
                value.dtype().to_string()
            ));
        }

        let offset = schema.attr_offset(i);
        self.data[offset..offset + attr.size()].copy_from_slice(&value.to_bytes(attr.len));
        Ok(())
    }

    pub fn values(&self, schema: &Schema) -> Result<Vec<Value>> {
        (0..schema.attrs.len())
            .map(|i| self.get_attr(i, schema))
            .collect()
    }

    /// The attribute bytes, tombstone excluded.
    pub fn attr_bytes(&self) -> &[u8] {
        &self.data[1..]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
