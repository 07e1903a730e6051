use crate::rdb::{
    encoding::{read_length, read_string, Cursor},
    RdbError,
};

const METADATA_OPCODE: u8 = 0xFA;
const RESIZE_DB_OPCODE: u8 = 0xFB;
const EXPIRATION_MILLISECONDS_OPCODE: u8 = 0xFC;
const EXPIRATION_SECONDS_OPCODE: u8 = 0xFD;
const DATABASE_OPCODE: u8 = 0xFE;
const END_OF_FILE_OPCODE: u8 = 0xFF;
const STRING_VALUE_TYPE: u8 = 0x00;

#[derive(Debug, PartialEq)]
pub enum Section {
    Metadata {
        key: String,
        value: String,
    },
    ResizeDb {
        hash_table_size: usize,
        expiry_hash_table_size: usize,
    },
    Database(usize),
    Entry {
        key: String,
        value: String,
        /// Unix milliseconds.
        expires_at: Option<i64>,
    },
    EndOfFile {
        checksum: Option<[u8; 8]>,
    },
}

/// Reads the section starting at the cursor, opcode included.
pub fn read_section(cursor: &mut Cursor) -> Result<Section, RdbError> {
    match cursor.take_byte()? {
        METADATA_OPCODE => Ok(Section::Metadata {
            key: read_string(cursor)?,
            value: read_string(cursor)?,
        }),
        RESIZE_DB_OPCODE => Ok(Section::ResizeDb {
            hash_table_size: read_length(cursor)?,
            expiry_hash_table_size: read_length(cursor)?,
        }),
        DATABASE_OPCODE => Ok(Section::Database(read_length(cursor)?)),
        EXPIRATION_MILLISECONDS_OPCODE => {
            let expires_at = u64::from_le_bytes(cursor.take_array()?) as i64;
            let value_type = cursor.take_byte()?;

            read_entry(cursor, value_type, Some(expires_at))
        }
        EXPIRATION_SECONDS_OPCODE => {
            let expires_at = u32::from_le_bytes(cursor.take_array()?) as i64 * 1000;
            let value_type = cursor.take_byte()?;

            read_entry(cursor, value_type, Some(expires_at))
        }
        // Older versions end without a checksum.
        END_OF_FILE_OPCODE if cursor.is_empty() => Ok(Section::EndOfFile { checksum: None }),
        END_OF_FILE_OPCODE => Ok(Section::EndOfFile {
            checksum: Some(cursor.take_array()?),
        }),
        value_type => read_entry(cursor, value_type, None),
    }
}

fn read_entry(
    cursor: &mut Cursor,
    value_type: u8,
    expires_at: Option<i64>,
) -> Result<Section, RdbError> {
    if value_type != STRING_VALUE_TYPE {
        return Err(RdbError::UnsupportedValueType(value_type));
    }

    Ok(Section::Entry {
        key: read_string(cursor)?,
        value: read_string(cursor)?,
        expires_at,
    })
}
