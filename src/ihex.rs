//! Intel HEX loader.
//!
//! Parses the classic `:LLAAAATT<DATA>CC` record format used to distribute
//! small firmware/monitor images. Only the two record types a ROM-less
//! bring-up actually needs are handled: `00` (data) and `01` (end-of-file);
//! extended segment/linear address records are rejected rather than
//! silently misinterpreted, since this loader only ever targets a single
//! 64KiB bank at a time.

use crate::error::IntelHexError;

/// One decoded data record: a destination offset and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    pub address: u16,
    pub data: Vec<u8>,
}

const RECORD_DATA: u8 = 0x00;
const RECORD_EOF: u8 = 0x01;

/// Parses an Intel HEX source into a flat list of data records, in file
/// order. Stops at the first `01` end-of-file record; anything after it is
/// ignored, matching how most HEX tooling treats trailing content.
pub fn parse(source: &str) -> Result<Vec<HexRecord>, IntelHexError> {
    let mut records = Vec::new();
    for (index, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;
        let bytes = decode_line(line, line_no)?;

        if bytes.len() < 5 {
            return Err(IntelHexError::TruncatedRecord { line: line_no });
        }
        let byte_count = bytes[0] as usize;
        let address = u16::from_be_bytes([bytes[1], bytes[2]]);
        let record_type = bytes[3];
        if bytes.len() != 5 + byte_count {
            return Err(IntelHexError::TruncatedRecord { line: line_no });
        }

        let checksum_expected = bytes[4 + byte_count];
        let checksum_actual = checksum(&bytes[..4 + byte_count]);
        if checksum_actual != checksum_expected {
            return Err(IntelHexError::ChecksumMismatch {
                line: line_no,
                expected: checksum_expected,
                actual: checksum_actual,
            });
        }

        match record_type {
            RECORD_DATA => {
                let data = bytes[4..4 + byte_count].to_vec();
                records.push(HexRecord { address, data });
            }
            RECORD_EOF => break,
            other => return Err(IntelHexError::UnsupportedRecordType { line: line_no, record_type: other }),
        }
    }
    Ok(records)
}

/// Decodes one line's hex digits (minus the leading `:`) into raw bytes.
fn decode_line(line: &str, line_no: usize) -> Result<Vec<u8>, IntelHexError> {
    let digits = line.strip_prefix(':').ok_or(IntelHexError::MissingColon { line: line_no })?;
    if digits.len() % 2 != 0 {
        return Err(IntelHexError::OddLength { line: line_no });
    }
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    let chars: Vec<char> = digits.chars().collect();
    for pair in chars.chunks(2) {
        let hi = hex_digit(pair[0], line_no)?;
        let lo = hex_digit(pair[1], line_no)?;
        bytes.push((hi << 4) | lo);
    }
    Ok(bytes)
}

fn hex_digit(c: char, line_no: usize) -> Result<u8, IntelHexError> {
    c.to_digit(16).map(|d| d as u8).ok_or(IntelHexError::BadHexDigit { line: line_no })
}

/// Two's-complement checksum over length/address/type/data, per the format.
fn checksum(bytes: &[u8]) -> u8 {
    let sum: u8 = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

/// Writes every record's bytes into `bank` of `bus`, honoring each record's
/// own address field. Used for loading a monitor/test image directly into
/// FPI RAM ahead of a reset.
pub fn load_into_bank(bus: &mut crate::bus::Bus, bank: u8, records: &[HexRecord]) {
    for record in records {
        let mut addr = record.address;
        for &byte in &record.data {
            bus.poke_byte(bank, addr, byte);
            addr = addr.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_data_record() {
        let records = parse(":03000000AABBCC4C\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, 0x0000);
        assert_eq!(records[0].data, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn stops_at_eof_record() {
        let records = parse(":00000001FF\n:03000000AABBCC4C\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn rejects_missing_colon() {
        assert_eq!(parse("03000000AABBCC4C"), Err(IntelHexError::MissingColon { line: 1 }));
    }

    #[test]
    fn rejects_odd_digit_count() {
        assert_eq!(parse(":0300000A"), Err(IntelHexError::OddLength { line: 1 }));
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = parse(":03000000AABBCC00").unwrap_err();
        assert!(matches!(err, IntelHexError::ChecksumMismatch { line: 1, .. }));
    }

    #[test]
    fn rejects_unsupported_record_type() {
        let err = parse(":0300000200AABBCC01").unwrap_err();
        assert!(matches!(err, IntelHexError::UnsupportedRecordType { line: 1, record_type: 0x02 }));
    }

    #[test]
    fn load_into_bank_writes_at_record_address() {
        let mut bus = crate::bus::Bus::new(&crate::config::MachineConfig::new()).unwrap();
        bus.load_rom(&vec![0u8; 0x20000]).unwrap();
        let records = parse(":02020000BEEF8D\n").unwrap();
        load_into_bank(&mut bus, 0x01, &records);
        assert_eq!(bus.peek_byte(0x01, 0x0200), 0xBE);
        assert_eq!(bus.peek_byte(0x01, 0x0201), 0xEF);
    }
}
