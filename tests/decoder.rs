//! Decoding single objects into records.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wmi_client::memory::{MemoryObject, MemoryResultSet};
use wmi_client::{Decoder, DynamicObject, Variant, WmiDateTime, WmiError};

fn reason_of(err: &WmiError) -> String {
    match err {
        WmiError::FieldMismatch(m) => m.reason.clone(),
        other => panic!("expected a field mismatch, got {:?}", other),
    }
}

/// Fails the test if a named property is ever read.
#[derive(Debug)]
struct Poisoned {
    inner: MemoryObject,
    forbidden: &'static str,
}

impl DynamicObject for Poisoned {
    fn property(&self, name: &str) -> wmi_client::Result<Option<Variant>> {
        if name == self.forbidden {
            return Err(WmiError::Custom(format!("{} must not be fetched", name)));
        }
        self.inner.property(name)
    }

    fn property_names(&self) -> wmi_client::Result<Vec<String>> {
        self.inner.property_names()
    }
}

/// Counts how many times it is dropped.
#[derive(Debug)]
struct Counted {
    inner: MemoryObject,
    drops: Arc<AtomicUsize>,
}

impl DynamicObject for Counted {
    fn property(&self, name: &str) -> wmi_client::Result<Option<Variant>> {
        self.inner.property(name)
    }

    fn property_names(&self) -> wmi_client::Result<Vec<String>> {
        self.inner.property_names()
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Field binding ---

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ProcessId")]
    pid: u32,
    #[serde(skip)]
    cached: String,
    #[serde(rename = "Started")]
    started: bool,
}

#[test]
fn test_rename_and_skip() {
    let object = Poisoned {
        inner: MemoryObject::new("Win32_Service")
            .with("Name", "Spooler")
            .with("ProcessId", 1234u32)
            .with("Started", true),
        forbidden: "cached",
    };

    let service: Service = Decoder::new().decode(&object).unwrap();
    assert_eq!(service.name, "Spooler");
    assert_eq!(service.pid, 1234);
    assert!(service.started);
    assert!(service.cached.is_empty());
}

#[test]
fn test_field_name_is_property_name() {
    #[derive(Deserialize)]
    #[allow(non_snake_case)]
    struct Plain {
        Caption: String,
    }

    let object = MemoryObject::new("Win32_OperatingSystem").with("Caption", "Windows");
    let plain: Plain = Decoder::new().decode(&object).unwrap();
    assert_eq!(plain.Caption, "Windows");
}

#[test]
fn test_missing_property() {
    let object = MemoryObject::new("Win32_Service")
        .with("Name", "Spooler")
        .with("Started", false);

    let err = Decoder::new().decode::<Service>(&object).unwrap_err();
    match &err {
        WmiError::FieldMismatch(m) => {
            assert_eq!(m.property, "ProcessId");
            assert_eq!(m.field_type, "u32");
            assert_eq!(m.reason, "no such result field");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("ProcessId"));

    let decoder = Decoder::new().with_allow_missing_fields(true);
    let service: Service = decoder.decode(&object).unwrap();
    assert_eq!(service.pid, 0);
}

#[test]
fn test_decode_into_keeps_destination_on_failure() {
    let mut service = Service {
        name: "old".to_string(),
        pid: 1,
        cached: String::new(),
        started: false,
    };
    let object = MemoryObject::new("Win32_Service").with("Name", "new");

    assert!(Decoder::new().decode_into(&object, &mut service).is_err());
    assert_eq!(service.name, "old");
}

// --- Integer coercion ---

#[derive(Debug, Deserialize)]
struct Counters {
    small: u8,
    signed: i16,
    wide: u64,
}

fn counters(
    small: impl Into<Variant>,
    signed: impl Into<Variant>,
    wide: impl Into<Variant>,
) -> MemoryObject {
    MemoryObject::new("Counters")
        .with("small", small)
        .with("signed", signed)
        .with("wide", wide)
}

#[test]
fn test_integer_widths_and_signedness() {
    let decoded: Counters = Decoder::new()
        .decode(&counters(200i32, 5u8, 7i8))
        .unwrap();
    assert_eq!(decoded.small, 200);
    assert_eq!(decoded.signed, 5);
    assert_eq!(decoded.wide, 7);
}

#[test]
fn test_integer_strings_parse() {
    // uint64 properties arrive as strings.
    let decoded: Counters = Decoder::new()
        .decode(&counters("12", "-3", "18446744073709551615"))
        .unwrap();
    assert_eq!(decoded.small, 12);
    assert_eq!(decoded.signed, -3);
    assert_eq!(decoded.wide, u64::MAX);

    let err = Decoder::new()
        .decode::<Counters>(&counters("twelve", 0i32, 0i32))
        .unwrap_err();
    assert!(reason_of(&err).contains("twelve"));
}

#[test]
fn test_integer_out_of_range() {
    let err = Decoder::new()
        .decode::<Counters>(&counters(300i32, 0i32, 0i32))
        .unwrap_err();
    assert_eq!(reason_of(&err), "integer 300 is out of range");

    let err = Decoder::new()
        .decode::<Counters>(&counters(1i32, 0i32, -1i64))
        .unwrap_err();
    assert_eq!(reason_of(&err), "integer -1 is out of range");
}

#[test]
fn test_integer_rejects_other_kinds() {
    let err = Decoder::new()
        .decode::<Counters>(&counters(true, 0i32, 0i32))
        .unwrap_err();
    assert_eq!(reason_of(&err), "not an integer class");
}

proptest! {
    #[test]
    fn prop_integers_fit_when_in_range(value in any::<i64>()) {
        let object = MemoryObject::new("N").with("small", value).with("signed", value).with("wide", value);
        let result = Decoder::new().decode::<Counters>(&object);

        let fits = u8::try_from(value).is_ok() && i16::try_from(value).is_ok() && u64::try_from(value).is_ok();
        prop_assert_eq!(result.is_ok(), fits);
        if let Ok(decoded) = result {
            prop_assert_eq!(decoded.small as i64, value);
            prop_assert_eq!(decoded.signed as i64, value);
            prop_assert_eq!(decoded.wide as i64, value);
        }
    }

    #[test]
    fn prop_unsigned_into_signed(value in any::<u32>()) {
        let decoded: i64 = Decoder::new().decode_value("Value", Variant::UI4(value)).unwrap();
        prop_assert_eq!(decoded, i64::from(value));
    }
}

// --- Exact kinds ---

#[test]
fn test_exact_kind_fields() {
    #[derive(Debug, Deserialize)]
    struct Kinds {
        flag: bool,
        load: f32,
        text: String,
    }

    let object = MemoryObject::new("K")
        .with("flag", true)
        .with("load", 0.5f32)
        .with("text", "ok");
    let kinds: Kinds = Decoder::new().decode(&object).unwrap();
    assert!(kinds.flag);
    assert_eq!(kinds.load, 0.5);
    assert_eq!(kinds.text, "ok");

    let bad_bool = object.clone().with("flag", 1i32);
    let err = Decoder::new().decode::<Kinds>(&bad_bool).unwrap_err();
    assert_eq!(reason_of(&err), "not a bool");

    let bad_float = object.clone().with("load", 1i32);
    let err = Decoder::new().decode::<Kinds>(&bad_float).unwrap_err();
    assert_eq!(reason_of(&err), "not a float32");

    let bad_text = object.with("text", 3u32);
    let err = Decoder::new().decode::<Kinds>(&bad_text).unwrap_err();
    assert_eq!(reason_of(&err), "not a string");
}

#[test]
fn test_f64_is_not_supported() {
    let err = Decoder::new()
        .decode_value::<f64>("Load", Variant::R4(1.0))
        .unwrap_err();
    assert_eq!(reason_of(&err), "unsupported type (float32)");
}

#[test]
fn test_enum_by_name() {
    #[derive(Debug, Deserialize, PartialEq)]
    enum StartMode {
        Auto,
        Manual,
        Disabled,
    }

    #[derive(Debug, Deserialize)]
    struct Service {
        #[serde(rename = "StartMode")]
        mode: StartMode,
    }

    let object = MemoryObject::new("Win32_Service").with("StartMode", "Manual");
    let service: Service = Decoder::new().decode(&object).unwrap();
    assert_eq!(service.mode, StartMode::Manual);

    let object = MemoryObject::new("Win32_Service").with("StartMode", "Boot");
    assert!(Decoder::new().decode::<Service>(&object).is_err());
}

#[test]
fn test_byte_arrays() {
    #[derive(Debug, Deserialize)]
    struct Adapter {
        #[serde(rename = "MACAddressBytes")]
        mac: Vec<u8>,
    }

    let object = MemoryObject::new("Win32_NetworkAdapter")
        .with("MACAddressBytes", vec![0u8, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
    let adapter: Adapter = Decoder::new().decode(&object).unwrap();
    assert_eq!(adapter.mac, vec![0, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
}

// --- Null and "no value" ---

#[derive(Debug, Deserialize, PartialEq)]
struct Optional {
    count: u32,
    label: Option<String>,
    limit: Option<u32>,
}

#[test]
fn test_null_leaves_zero() {
    let object = MemoryObject::new("O")
        .with("count", Variant::Null)
        .with("label", Variant::Null)
        .with("limit", Some(5u32));

    let decoded: Optional = Decoder::new().decode(&object).unwrap();
    assert_eq!(
        decoded,
        Optional {
            count: 0,
            label: None,
            limit: Some(5),
        }
    );
}

#[test]
fn test_empty_value_modes() {
    let object = MemoryObject::new("O")
        .with("count", Variant::Empty)
        .with("label", Variant::Empty)
        .with("limit", Variant::Empty);

    let err = Decoder::new().decode::<Optional>(&object).unwrap_err();
    assert_eq!(reason_of(&err), "unsupported type (<nil>)");

    let zero = Decoder::new().with_non_ptr_zero(true);
    let decoded: Optional = zero.decode(&object).unwrap();
    assert_eq!(decoded.count, 0);
    assert_eq!(decoded.label, Some(String::new()));
    assert_eq!(decoded.limit, Some(0));

    let nil = zero.with_ptr_nil(true);
    let decoded: Optional = nil.decode(&object).unwrap();
    assert_eq!(decoded.label, None);
    assert_eq!(decoded.limit, None);
}

// --- Datetimes ---

#[derive(Debug, Deserialize)]
struct Process {
    #[serde(rename = "CreationDate")]
    created: WmiDateTime,
    #[serde(rename = "TerminationDate")]
    terminated: Option<WmiDateTime>,
}

#[test]
fn test_datetime_with_minute_offset() {
    let object = MemoryObject::new("Win32_Process")
        .with("CreationDate", "20240102030405.123456+060")
        .with("TerminationDate", Variant::Null);

    let process: Process = Decoder::new().decode(&object).unwrap();
    let expected = Utc.with_ymd_and_hms(2024, 1, 2, 2, 4, 5).unwrap()
        + chrono::Duration::microseconds(123_456);
    assert_eq!(process.created.to_utc(), expected);
    assert_eq!(process.created.offset().local_minus_utc(), 3600);
    assert!(process.terminated.is_none());
}

#[test]
fn test_invalid_datetime() {
    let object = MemoryObject::new("Win32_Process")
        .with("CreationDate", "yesterday")
        .with("TerminationDate", Variant::Null);

    let err = Decoder::new().decode::<Process>(&object).unwrap_err();
    match err {
        WmiError::FieldMismatch(m) => {
            assert_eq!(m.property, "CreationDate");
            assert_eq!(m.field_type, "WmiDateTime");
            assert!(m.reason.contains("yesterday"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

// --- Nested objects and arrays ---

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "DriveLetter")]
    letter: String,
    #[serde(rename = "Quota")]
    quota: Quota,
    #[serde(rename = "Owner")]
    owner: Option<Box<Quota>>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Quota {
    #[serde(rename = "Limit")]
    limit: u64,
}

fn quota(limit: u64) -> MemoryObject {
    MemoryObject::new("Win32_DiskQuota").with("Limit", limit)
}

#[test]
fn test_nested_records() {
    let object = MemoryObject::new("Win32_Volume")
        .with("DriveLetter", "C:")
        .with("Quota", quota(10))
        .with("Owner", quota(20));

    let volume: Volume = Decoder::new().decode(&object).unwrap();
    assert_eq!(volume.letter, "C:");
    assert_eq!(volume.quota, Quota { limit: 10 });
    assert_eq!(volume.owner, Some(Box::new(Quota { limit: 20 })));
}

#[test]
fn test_nested_failure_names_outer_property() {
    let object = MemoryObject::new("Win32_Volume")
        .with("DriveLetter", "C:")
        .with("Quota", MemoryObject::new("Win32_DiskQuota").with("Limit", "lots"))
        .with("Owner", Variant::Null);

    let err = Decoder::new().decode::<Volume>(&object).unwrap_err();
    match err {
        WmiError::FieldMismatch(m) => {
            assert_eq!(m.property, "Quota");
            assert!(m.reason.contains("Limit"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_string_into_struct() {
    let object = MemoryObject::new("Win32_Volume")
        .with("DriveLetter", "C:")
        .with("Quota", "10")
        .with("Owner", Variant::Null);

    let err = Decoder::new().decode::<Volume>(&object).unwrap_err();
    assert_eq!(
        reason_of(&err),
        "can't deserialize string into struct Quota"
    );
}

#[test]
fn test_arrays() {
    #[derive(Debug, Deserialize)]
    struct Adapter {
        #[serde(rename = "IPAddress")]
        addresses: Vec<String>,
        #[serde(rename = "IPSubnetBits")]
        bits: Vec<u16>,
        #[serde(rename = "Gateways")]
        gateways: Vec<String>,
    }

    let object = MemoryObject::new("Win32_NetworkAdapterConfiguration")
        .with("IPAddress", vec!["10.0.0.2", "fe80::1"])
        .with("IPSubnetBits", vec![24i32, 64])
        .with("Gateways", Variant::Null);

    let adapter: Adapter = Decoder::new().decode(&object).unwrap();
    assert_eq!(adapter.addresses, vec!["10.0.0.2", "fe80::1"]);
    assert_eq!(adapter.bits, vec![24, 64]);
    assert!(adapter.gateways.is_empty());

    let bad = object.with("IPSubnetBits", vec![Variant::from(24i32), Variant::from("x")]);
    let err = Decoder::new().decode::<Adapter>(&bad).unwrap_err();
    assert!(reason_of(&err).starts_with("unsupported slice type ("));
}

// --- Self-decoding destinations ---

#[derive(Deserialize)]
struct RawDisk {
    #[serde(rename = "Size")]
    size: u64,
    #[serde(rename = "FreeSpace")]
    free: u64,
}

#[derive(Debug, Deserialize)]
#[serde(from = "RawDisk")]
struct DiskUsage {
    used: u64,
}

impl From<RawDisk> for DiskUsage {
    fn from(raw: RawDisk) -> Self {
        DiskUsage {
            used: raw.size - raw.free,
        }
    }
}

#[test]
fn test_derived_fields() {
    let object = MemoryObject::new("Win32_LogicalDisk")
        .with("Size", "1000")
        .with("FreeSpace", "400");
    let usage: DiskUsage = Decoder::new().decode(&object).unwrap();
    assert_eq!(usage.used, 600);
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "RawDisk")]
struct Capacity {
    #[allow(dead_code)]
    ratio: u64,
}

impl TryFrom<RawDisk> for Capacity {
    type Error = String;

    fn try_from(raw: RawDisk) -> Result<Self, String> {
        if raw.size == 0 {
            return Err("disk reports zero capacity".to_string());
        }
        Ok(Capacity {
            ratio: raw.free * 100 / raw.size,
        })
    }
}

#[test]
fn test_self_decoding_error_is_returned_as_is() {
    let object = MemoryObject::new("Win32_LogicalDisk")
        .with("Size", 0u64)
        .with("FreeSpace", 0u64);
    let err = Decoder::new().decode::<Capacity>(&object).unwrap_err();
    assert!(matches!(err, WmiError::Custom(ref msg) if msg == "disk reports zero capacity"));
    assert!(!err.is_field_mismatch());
}

#[derive(Debug, Deserialize, PartialEq)]
struct DiskDrive {
    #[serde(rename = "Model")]
    model: String,
    #[serde(rename = "Size")]
    size: u64,
}

/// Variants are picked by class.
#[derive(Debug, Deserialize, PartialEq)]
enum Device {
    #[serde(rename = "Win32_DiskDrive")]
    Disk(DiskDrive),
    #[serde(rename = "Win32_NetworkAdapter")]
    Network {
        #[serde(rename = "Speed")]
        speed: u64,
        #[serde(rename = "MACAddress")]
        mac: Option<String>,
    },
    #[serde(rename = "Win32_Printer")]
    Printer,
}

fn disk(model: &str) -> MemoryObject {
    MemoryObject::new("Win32_DiskDrive")
        .with("__CLASS", "Win32_DiskDrive")
        .with("Model", model)
        .with("Size", 512u32)
}

#[test]
fn test_discriminated_shapes() {
    let network = MemoryObject::new("Win32_NetworkAdapter")
        .with("__CLASS", "Win32_NetworkAdapter")
        .with("Speed", 1_000_000u64)
        .with("MACAddress", "00:11:22:33:44:55");

    let decoder = Decoder::new();
    assert_eq!(
        decoder.decode::<Device>(&disk("SSD")).unwrap(),
        Device::Disk(DiskDrive {
            model: "SSD".to_string(),
            size: 512,
        })
    );
    assert_eq!(
        decoder.decode::<Device>(&network).unwrap(),
        Device::Network {
            speed: 1_000_000,
            mac: Some("00:11:22:33:44:55".to_string()),
        }
    );
    assert_eq!(
        decoder
            .decode::<Device>(&MemoryObject::new("Win32_Printer"))
            .unwrap(),
        Device::Printer
    );
}

#[test]
fn test_discriminated_shape_falls_back_to_class_name() {
    // No __CLASS property; the backend's class decides.
    let network = MemoryObject::new("Win32_NetworkAdapter").with("Speed", 10u8);
    assert_eq!(
        Decoder::new().decode::<Device>(&network).unwrap(),
        Device::Network {
            speed: 10,
            mac: None,
        }
    );
}

#[test]
fn test_discriminated_shape_follows_decoder_rules() {
    let network = MemoryObject::new("Win32_NetworkAdapter")
        .with("__CLASS", "Win32_NetworkAdapter")
        .with("Speed", "1000")
        .with("MACAddress", Variant::Null);
    assert_eq!(
        Decoder::new().decode::<Device>(&network).unwrap(),
        Device::Network {
            speed: 1000,
            mac: None,
        }
    );

    let sizeless = MemoryObject::new("Win32_DiskDrive").with("Model", "HDD");
    let err = Decoder::new().decode::<Device>(&sizeless).unwrap_err();
    assert!(err.is_field_mismatch());
    assert_eq!(reason_of(&err), "no such result field");

    let lenient = Decoder::new().with_allow_missing_fields(true);
    assert_eq!(
        lenient.decode::<Device>(&sizeless).unwrap(),
        Device::Disk(DiskDrive {
            model: "HDD".to_string(),
            size: 0,
        })
    );

    let empty = MemoryObject::new("Win32_DiskDrive")
        .with("Model", "HDD")
        .with("Size", Variant::Empty);
    assert!(Decoder::new().decode::<Device>(&empty).is_err());
    assert_eq!(
        Decoder::new()
            .with_non_ptr_zero(true)
            .decode::<Device>(&empty)
            .unwrap(),
        Device::Disk(DiskDrive {
            model: "HDD".to_string(),
            size: 0,
        })
    );
}

#[test]
fn test_discriminated_mismatch_skips_element() {
    let mut results = MemoryResultSet::new(vec![
        disk("first"),
        disk("broken").with("Size", "lots"),
        disk("third"),
    ]);
    let mut devices: Vec<Device> = Vec::new();

    let err = Decoder::new()
        .decode_all(&mut results, &mut devices)
        .unwrap_err();
    assert_eq!(err.field_mismatches().len(), 1);
    assert_eq!(err.field_mismatches()[0].property, "Size");
    assert_eq!(devices.len(), 2);
    assert_eq!(
        devices[1],
        Device::Disk(DiskDrive {
            model: "third".to_string(),
            size: 512,
        })
    );
}

#[test]
fn test_unknown_class_is_not_a_mismatch() {
    let fan = MemoryObject::new("Win32_Fan").with("__CLASS", "Win32_Fan");
    let err = Decoder::new().decode::<Device>(&fan).unwrap_err();
    assert!(!err.is_field_mismatch());
    assert!(err.to_string().contains("Win32_Fan"));
}

#[test]
fn test_nested_discriminated_shape() {
    #[derive(Debug, Deserialize)]
    struct Attached {
        #[serde(rename = "Dependent")]
        device: Device,
    }

    let event = MemoryObject::new("Win32_DeviceChangeEvent")
        .with("Dependent", disk("USB").with("Size", "2048"));
    let attached: Attached = Decoder::new().decode(&event).unwrap();
    assert_eq!(
        attached.device,
        Device::Disk(DiskDrive {
            model: "USB".to_string(),
            size: 2048,
        })
    );
}

/// Internally tagged enums are buffered by serde and see raw values only.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "__CLASS")]
enum Tagged {
    #[serde(rename = "Win32_NetworkAdapter")]
    Network {
        #[serde(rename = "Speed")]
        speed: u64,
    },
}

#[test]
fn test_internally_tagged_enum() {
    let network = MemoryObject::new("Win32_NetworkAdapter")
        .with("__CLASS", "Win32_NetworkAdapter")
        .with("Speed", 1_000_000u64);
    assert_eq!(
        Decoder::new().decode::<Tagged>(&network).unwrap(),
        Tagged::Network { speed: 1_000_000 }
    );
}

/// Collects every property name, whatever the object holds.
#[derive(Debug)]
struct PropertyNames(Vec<String>);

impl<'de> Deserialize<'de> for PropertyNames {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamesVisitor;

        impl<'de> Visitor<'de> for NamesVisitor {
            type Value = PropertyNames;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PropertyNames, A::Error> {
                let mut names = Vec::new();
                while let Some(name) = map.next_key::<String>()? {
                    map.next_value::<de::IgnoredAny>()?;
                    names.push(name);
                }
                Ok(PropertyNames(names))
            }
        }

        deserializer.deserialize_map(NamesVisitor)
    }
}

#[test]
fn test_hand_written_impl() {
    let object = MemoryObject::new("X").with("A", 1i32).with("B", "two");
    let names: PropertyNames = Decoder::new().decode(&object).unwrap();
    assert_eq!(names.0, vec!["A", "B"]);
}

#[test]
fn test_decode_into_json_value() {
    let object = MemoryObject::new("Win32_Volume")
        .with("DriveLetter", "C:")
        .with("BlockSize", 4096u32)
        .with("Label", Variant::Null)
        .with("Quota", quota(7))
        .with("Flags", vec![true, false]);

    let value: serde_json::Value = Decoder::new().decode(&object).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "DriveLetter": "C:",
            "BlockSize": 4096,
            "Label": null,
            "Quota": { "Limit": 7 },
            "Flags": [true, false],
        })
    );
}

// --- Duplicates, panics, release ---

#[test]
fn test_duplicate_property_first_field_wins() {
    #[derive(Debug, Deserialize)]
    struct Twice {
        #[serde(rename = "Name")]
        first: String,
        #[serde(rename = "Name", default)]
        second: String,
    }

    let object = MemoryObject::new("X").with("Name", "only");
    let twice: Twice = Decoder::new().decode(&object).unwrap();
    assert_eq!(twice.first, "only");
    assert_eq!(twice.second, "");
}

#[derive(Debug)]
struct Exploding;

impl DynamicObject for Exploding {
    fn property(&self, _name: &str) -> wmi_client::Result<Option<Variant>> {
        panic!("backend invariant violated");
    }

    fn property_names(&self) -> wmi_client::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_panic_is_contained() {
    let err = Decoder::new().decode::<Quota>(&Exploding).unwrap_err();
    match err {
        WmiError::Panic(message) => assert_eq!(message, "backend invariant violated"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_non_record_destination() {
    let object = MemoryObject::new("X").with("A", 1i32);
    let err = Decoder::new().decode::<u32>(&object).unwrap_err();
    assert!(matches!(err, WmiError::InvalidDestination(_)));
}

#[test]
fn test_nested_objects_are_released() {
    let drops = Arc::new(AtomicUsize::new(0));
    let nested = Counted {
        inner: quota(3),
        drops: Arc::clone(&drops),
    };
    let object = MemoryObject::new("Win32_Volume")
        .with("DriveLetter", "C:")
        .with("Quota", Variant::object(nested))
        .with("Owner", Variant::Null);

    let volume: Volume = Decoder::new().decode(&object).unwrap();
    assert_eq!(volume.quota.limit, 3);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(object);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}
