//! HART device addressing.
//!
//! HART knows two addressing modes: the short polling address (a 4-bit slot
//! number used before a device's unique address is known) and the long unique
//! address (manufacturer id, device type and a 3-byte device identification
//! number). Both share a byte serialization and an incremental fill used by
//! the frame parser.

use crate::error::HartError;

/// A HART device address, short (polling) or long (unique).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Short {
        polling: u8,
    },
    Long {
        manufacturer_id: u8,
        device_type: u8,
        device_id: [u8; 3],
    },
}

impl Address {
    /// Creates a short polling address. Valid polling addresses are 0-15.
    pub fn short(polling: u8) -> Result<Self, HartError> {
        if polling > 15 {
            return Err(HartError::InvalidPollingAddress(polling));
        }
        Ok(Address::Short { polling })
    }

    /// Creates a long unique address.
    pub fn long(manufacturer_id: u8, device_type: u8, device_id: [u8; 3]) -> Self {
        Address::Long {
            manufacturer_id,
            device_type,
            device_id,
        }
    }

    /// Creates a long address from a device identification byte slice.
    /// The slice must be exactly 3 bytes.
    pub fn long_from_bytes(
        manufacturer_id: u8,
        device_type: u8,
        device_id: &[u8],
    ) -> Result<Self, HartError> {
        let device_id: [u8; 3] = device_id
            .try_into()
            .map_err(|_| HartError::InvalidDeviceIdLength(device_id.len()))?;
        Ok(Address::long(manufacturer_id, device_type, device_id))
    }

    /// Serialized length on the wire: 1 byte short, 5 bytes long.
    pub fn byte_len(&self) -> usize {
        match self {
            Address::Short { .. } => 1,
            Address::Long { .. } => 5,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Address::Long { .. })
    }

    /// Serializes the address to its wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Address::Short { polling } => vec![*polling],
            Address::Long {
                manufacturer_id,
                device_type,
                device_id,
            } => vec![
                *manufacturer_id,
                *device_type,
                device_id[0],
                device_id[1],
                device_id[2],
            ],
        }
    }

    /// An all-zero placeholder the parser fills byte-by-byte.
    pub(crate) fn empty_short() -> Self {
        Address::Short { polling: 0 }
    }

    /// An all-zero placeholder the parser fills byte-by-byte.
    pub(crate) fn empty_long() -> Self {
        Address::Long {
            manufacturer_id: 0,
            device_type: 0,
            device_id: [0; 3],
        }
    }

    /// Stores the next received address byte at `index`. Indexes past the
    /// variant's length are ignored, mirroring the incremental parse.
    pub(crate) fn set_byte(&mut self, index: usize, value: u8) {
        match self {
            Address::Short { polling } => {
                if index == 0 {
                    *polling = value;
                }
            }
            Address::Long {
                manufacturer_id,
                device_type,
                device_id,
            } => match index {
                0 => *manufacturer_id = value,
                1 => *device_type = value,
                2..=4 => device_id[index - 2] = value,
                _ => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_serializes_to_one_byte() {
        let address = Address::short(5).unwrap();
        assert_eq!(address.to_bytes(), vec![5]);
    }

    #[test]
    fn long_address_serializes_to_five_bytes() {
        let address = Address::long(0x26, 0x06, [0x12, 0x34, 0x56]);
        assert_eq!(address.to_bytes(), vec![0x26, 0x06, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn polling_address_above_15_is_rejected() {
        assert!(matches!(
            Address::short(16),
            Err(HartError::InvalidPollingAddress(16))
        ));
    }

    #[test]
    fn long_address_requires_three_device_id_bytes() {
        assert!(matches!(
            Address::long_from_bytes(0x26, 0x06, &[1, 2]),
            Err(HartError::InvalidDeviceIdLength(2))
        ));
        assert!(Address::long_from_bytes(0x26, 0x06, &[1, 2, 3]).is_ok());
    }

    #[test]
    fn set_byte_fills_long_address_in_order() {
        let mut address = Address::empty_long();
        for (i, b) in [0x26, 0x06, 0xAA, 0xBB, 0xCC].iter().enumerate() {
            address.set_byte(i, *b);
        }
        assert_eq!(address, Address::long(0x26, 0x06, [0xAA, 0xBB, 0xCC]));
    }
}
