//! Offset and alignment planning for the container data area
//!
//! Operates purely on sizes and alignments; nothing here touches payload bytes.

use crate::error::{ContainerError, Result};
use crate::lz_header::LZ_HEADER_SIZE;
use log::debug;

/// Round `value` up to a multiple of the power-of-two `align`
pub fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Bytes needed to pad `len` up to a 4-byte boundary
pub fn padding_len(len: usize) -> usize {
    align_up(len, 4) - len
}

/// Validate an alignment given in bytes and return its log2
pub fn alignment_exponent(alignment: u32) -> Result<u8> {
    if !alignment.is_power_of_two() {
        return Err(ContainerError::InvalidAlignment(alignment.into()));
    }
    Ok(alignment.trailing_zeros() as u8)
}

/// Default reserved size for a component: payload padded to 4, plus auth data,
/// rounded up to `align`
pub fn region_size(data_len: usize, auth_len: usize, align: usize) -> Result<u32> {
    let size = align_up(align_up(data_len, 4) + auth_len, align);
    u32::try_from(size).map_err(|_| {
        ContainerError::invalid_image_data(format!("Region size 0x{size:X} exceeds 32 bits"))
    })
}

/// One component region to place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Required alignment in bytes
    pub alignment: usize,
    /// Reserved region size in bytes
    pub size: u32,
}

/// Assign offsets, relative to the first placed region, in declaration order
///
/// `start` is the serialized header size. In monolithic signing mode a region
/// is pulled back by one blob header whenever the alignment gap can hold it,
/// so the payload behind the blob header lands on the alignment boundary.
pub fn place(start: usize, slots: &[Slot], mono_signing: bool) -> Result<Vec<u32>> {
    let mut cursor = start;
    let mut base = None;
    let mut offsets = Vec::with_capacity(slots.len());

    for (idx, slot) in slots.iter().enumerate() {
        let next = align_up(cursor, slot.alignment);
        cursor = if mono_signing && next - cursor >= LZ_HEADER_SIZE {
            debug!("slot {idx}: backing off 0x{LZ_HEADER_SIZE:X} from 0x{next:X}");
            next - LZ_HEADER_SIZE
        } else {
            next
        };

        let base = *base.get_or_insert(cursor);
        let offset = u32::try_from(cursor - base).map_err(|_| {
            ContainerError::invalid_image_data(format!(
                "Component offset 0x{:X} exceeds 32 bits",
                cursor - base
            ))
        })?;
        debug!("slot {idx}: offset 0x{offset:X} size 0x{:X}", slot.size);
        offsets.push(offset);
        cursor += slot.size as usize;
    }

    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(0x1001, 0x1000), 0x2000);
        assert_eq!(align_up(0x1000, 0x1000), 0x1000);
        assert_eq!(padding_len(5), 3);
        assert_eq!(padding_len(8), 0);
    }

    #[test]
    fn test_alignment_exponent() {
        assert_eq!(alignment_exponent(1).unwrap(), 0);
        assert_eq!(alignment_exponent(0x10).unwrap(), 4);
        assert_eq!(alignment_exponent(0x1000).unwrap(), 12);
        assert!(alignment_exponent(0).is_err());
        assert!(alignment_exponent(0x30).is_err());
    }

    #[test]
    fn test_region_size() {
        // 0x25 bytes of blob -> 0x28, + 532 auth -> 0x23C, aligned to 0x10
        assert_eq!(region_size(0x25, 532, 0x10).unwrap(), 0x240);
        assert_eq!(region_size(0x25, 0, 0x1000).unwrap(), 0x1000);
        assert_eq!(region_size(0, 0, 0x10).unwrap(), 0);
    }

    #[test]
    fn test_place_normal() {
        let slots = [
            Slot { alignment: 0x10, size: 0x30 },
            Slot { alignment: 0x1000, size: 0x1000 },
            Slot { alignment: 0x10, size: 0x20 },
        ];
        // header of 0x44 bytes: first region starts at 0x50
        let offsets = place(0x44, &slots, false).unwrap();
        assert_eq!(offsets, vec![0, 0x1000 - 0x50, 0x2000 - 0x50]);
    }

    #[test]
    fn test_place_mono_signing_backoff() {
        let slots = [
            Slot { alignment: 0x1000, size: 0x1000 },
            Slot { alignment: 0x1000, size: 0x1000 },
        ];
        // gap 0x1000 - 0x40 holds a blob header: pull back to 0xFF0
        let offsets = place(0x40, &slots, true).unwrap();
        assert_eq!(offsets, vec![0, 0x1000]);

        // gap smaller than a blob header: no back-off
        let offsets = place(0xFF8, &slots[..1], true).unwrap();
        assert_eq!(offsets, vec![0]);
    }

    #[test]
    fn test_place_mono_tight_gap() {
        let slots = [
            Slot { alignment: 0x100, size: 0xF0 },
            Slot { alignment: 0x100, size: 0x100 },
        ];
        // first at 0xF0; cursor 0x1E0 -> next 0x200, gap 0x20 -> 0x1F0
        let offsets = place(0x20, &slots, true).unwrap();
        assert_eq!(offsets, vec![0, 0x100]);
    }
}
