//! HART frame delimiter.
//!
//! The delimiter is a single byte encoding the address type, the number of
//! expansion bytes, the physical layer type and the frame type. It is modeled
//! as a bit-field view over the raw byte, with no independent storage.

use crate::constants::{
    DELIMITER_MASK_ADDRESS_TYPE, DELIMITER_MASK_EXPANSION_BYTES, DELIMITER_MASK_FRAME_TYPE,
    DELIMITER_MASK_PHYSICAL_LAYER,
};

/// Address variant selected by the delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Polling,
    Unique,
}

/// Physical layer variant selected by the delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalLayerType {
    Asynchronous,
    Synchronous,
}

/// Frame direction/kind encoded in the low three delimiter bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Burst,
    MasterToFieldDevice,
    FieldDeviceToMaster,
}

/// Bit-field view over a HART delimiter byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter(u8);

impl Delimiter {
    pub fn new(byte: u8) -> Self {
        Delimiter(byte)
    }

    /// The canonical request delimiter for the given address type
    /// (0x02 polling, 0x82 unique).
    pub fn request(address_type: AddressType) -> Self {
        match address_type {
            AddressType::Polling => Delimiter(0x02),
            AddressType::Unique => Delimiter(0x82),
        }
    }

    /// The canonical response delimiter for the given address type
    /// (0x06 polling, 0x86 unique).
    pub fn response(address_type: AddressType) -> Self {
        match address_type {
            AddressType::Polling => Delimiter(0x06),
            AddressType::Unique => Delimiter(0x86),
        }
    }

    pub fn byte(&self) -> u8 {
        self.0
    }

    pub fn address_type(&self) -> AddressType {
        if self.0 & DELIMITER_MASK_ADDRESS_TYPE == 0 {
            AddressType::Polling
        } else {
            AddressType::Unique
        }
    }

    pub fn expansion_bytes(&self) -> u8 {
        (self.0 & DELIMITER_MASK_EXPANSION_BYTES) >> 5
    }

    pub fn physical_layer_type(&self) -> PhysicalLayerType {
        if (self.0 & DELIMITER_MASK_PHYSICAL_LAYER) >> 3 == 0 {
            PhysicalLayerType::Asynchronous
        } else {
            PhysicalLayerType::Synchronous
        }
    }

    /// Frame type from the low three bits. Values other than the three
    /// defined codes are treated as field-device-to-master, which keeps the
    /// parser on the response layout for unknown codes.
    pub fn frame_type(&self) -> FrameType {
        match self.0 & DELIMITER_MASK_FRAME_TYPE {
            1 => FrameType::Burst,
            2 => FrameType::MasterToFieldDevice,
            _ => FrameType::FieldDeviceToMaster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_delimiter_bits() {
        let delimiter = Delimiter::new(0x82);
        assert_eq!(delimiter.address_type(), AddressType::Unique);
        assert_eq!(delimiter.frame_type(), FrameType::MasterToFieldDevice);
        assert_eq!(delimiter.physical_layer_type(), PhysicalLayerType::Asynchronous);
        assert_eq!(delimiter.expansion_bytes(), 0);
    }

    #[test]
    fn response_delimiter_bits() {
        let delimiter = Delimiter::new(0x06);
        assert_eq!(delimiter.address_type(), AddressType::Polling);
        assert_eq!(delimiter.frame_type(), FrameType::FieldDeviceToMaster);
    }

    #[test]
    fn canonical_constructors() {
        assert_eq!(Delimiter::request(AddressType::Polling).byte(), 0x02);
        assert_eq!(Delimiter::request(AddressType::Unique).byte(), 0x82);
        assert_eq!(Delimiter::response(AddressType::Polling).byte(), 0x06);
        assert_eq!(Delimiter::response(AddressType::Unique).byte(), 0x86);
    }
}
