//! Tests for PageAddress and FillFactor

use cairn::page::{FillFactor, PageAddress, PAGE_ADDRESS_SIZE, PAGE_BODY_SIZE};

#[test]
fn test_empty_address() {
    assert!(PageAddress::EMPTY.is_empty());
    assert!(PageAddress::default().is_empty());
    assert!(!PageAddress::new(3, 0).is_empty());
    assert_eq!(PageAddress::EMPTY.to_string(), "(empty)");
}

#[test]
fn test_address_wire_form() {
    let address = PageAddress::new(0x0102_0304, 7);
    let bytes = address.to_bytes();

    assert_eq!(bytes.len(), PAGE_ADDRESS_SIZE);
    assert_eq!(&bytes[..4], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(bytes[4], 7);
    assert_eq!(&bytes[5..], &[0, 0, 0]);
    assert_eq!(PageAddress::decode(&bytes), address);
    assert_eq!(address.to_string(), "(16909060:7)");
}

#[test]
fn test_fill_factor_buckets() {
    assert_eq!(FillFactor::from_usage(0, 8000), FillFactor::Empty);
    assert_eq!(FillFactor::from_usage(100, 8000), FillFactor::Low);
    assert_eq!(FillFactor::from_usage(PAGE_BODY_SIZE / 2, 4000), FillFactor::Medium);
    assert_eq!(FillFactor::from_usage(PAGE_BODY_SIZE * 8 / 10, 1000), FillFactor::High);
    assert_eq!(FillFactor::from_usage(PAGE_BODY_SIZE, 0), FillFactor::Full);
    assert_eq!(FillFactor::from_usage(10, 32), FillFactor::Full);
}

#[test]
fn test_fill_factor_ordering_and_bytes() {
    assert!(FillFactor::Empty < FillFactor::Low);
    assert!(FillFactor::High < FillFactor::Full);

    for fill in [
        FillFactor::Empty,
        FillFactor::Low,
        FillFactor::Medium,
        FillFactor::High,
        FillFactor::Full,
    ] {
        assert_eq!(FillFactor::from_byte(fill.as_byte()).unwrap(), fill);
    }
    assert!(FillFactor::from_byte(9).is_err());
}
