//! Row codec for the single user table.
//!
//! A row is the fixed-size value stored under each key: an id plus two
//! zero-terminated text columns. Rows never cross page boundaries, so the
//! on-disk image is a flat 293-byte blob with every field at a fixed offset.

use crate::errors::Error;
use std::fmt;

pub const COLUMN_USERNAME_SIZE: usize = 32;
pub const COLUMN_EMAIL_SIZE: usize = 255;

pub const ID_SIZE: usize = std::mem::size_of::<u32>();
/// The additional byte (+1) holds the terminating null.
pub const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE + 1;
pub const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE + 1;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Total size of a serialized row (293 bytes).
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// Copies a string into a null-padded fixed-size buffer, truncating
/// anything past the capacity.
pub fn str_to_fixed_bytes<const N: usize>(input: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = input.as_bytes();
    let len = bytes.len().min(N);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; USERNAME_SIZE],
    pub email: [u8; EMAIL_SIZE],
}

impl Row {
    pub fn new(id: u32, username: &str, email: &str) -> Self {
        Row {
            id,
            username: str_to_fixed_bytes(username),
            email: str_to_fixed_bytes(email),
        }
    }

    /// Writes the row image into `dest`, field by field at its fixed offset.
    /// Padding bytes are copied as-is so a round trip reproduces the exact
    /// on-disk image.
    pub fn serialize(&self, dest: &mut [u8]) -> Result<(), Error> {
        if dest.len() < ROW_SIZE {
            return Err(err!(
                Storage,
                "Row destination too small (expected={}, got={})",
                ROW_SIZE,
                dest.len()
            ));
        }
        dest[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        dest[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].copy_from_slice(&self.username);
        dest[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].copy_from_slice(&self.email);
        Ok(())
    }

    /// Reads a row image back out of `source`.
    pub fn deserialize(source: &[u8]) -> Result<Row, Error> {
        if source.len() < ROW_SIZE {
            return Err(err!(
                Storage,
                "Row source too small (expected={}, got={})",
                ROW_SIZE,
                source.len()
            ));
        }
        let id = u32::from_le_bytes(
            source[ID_OFFSET..ID_OFFSET + ID_SIZE]
                .try_into()
                .map_err(|e| err!(Storage, "Failed to decode row id: {:?}", e))?,
        );
        let mut username = [0u8; USERNAME_SIZE];
        username.copy_from_slice(&source[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let mut email = [0u8; EMAIL_SIZE];
        email.copy_from_slice(&source[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);
        Ok(Row {
            id,
            username,
            email,
        })
    }

    pub fn username(&self) -> String {
        String::from_utf8_lossy(&self.username)
            .trim_end_matches('\0')
            .to_string()
    }

    pub fn email(&self) -> String {
        String::from_utf8_lossy(&self.email)
            .trim_end_matches('\0')
            .to_string()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.username(), self.email())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_row() {
        let row = Row::new(42, "alice", "alice@example.com");
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf).unwrap();
        let decoded = Row::deserialize(&buf).unwrap();
        assert_eq!(decoded, row);
        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.username(), "alice");
        assert_eq!(decoded.email(), "alice@example.com");
    }

    #[test]
    fn round_trips_the_exact_byte_image() {
        // Garbage past the terminator must survive a decode/encode cycle.
        let mut row = Row::new(7, "bob", "bob@example.com");
        row.username[10] = 0xAB;
        row.email[100] = 0xCD;

        let mut image = [0u8; ROW_SIZE];
        row.serialize(&mut image).unwrap();
        let mut image_again = [0u8; ROW_SIZE];
        Row::deserialize(&image)
            .unwrap()
            .serialize(&mut image_again)
            .unwrap();
        assert_eq!(image_again, image);
    }

    #[test]
    fn display_is_space_separated() {
        let row = Row::new(1, "user1", "person1@example.com");
        assert_eq!(row.to_string(), "1 user1 person1@example.com");
    }

    #[test]
    fn fixed_bytes_truncate_and_pad() {
        let buf: [u8; 4] = str_to_fixed_bytes("abcdef");
        assert_eq!(&buf, b"abcd");
        let buf: [u8; 6] = str_to_fixed_bytes("ab");
        assert_eq!(&buf, b"ab\0\0\0\0");
    }

    #[test]
    fn rejects_short_buffers() {
        let row = Row::new(1, "a", "b");
        let mut buf = [0u8; ROW_SIZE - 1];
        assert!(row.serialize(&mut buf).is_err());
        assert!(Row::deserialize(&buf).is_err());
    }

    #[test]
    fn layout_totals() {
        assert_eq!(ROW_SIZE, 293);
        assert_eq!(USERNAME_OFFSET, 4);
        assert_eq!(EMAIL_OFFSET, 37);
    }
}
