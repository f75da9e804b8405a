//! Field decoder: [`BlockTable`] → [`DecodedSpool`].
//!
//! Decoding is total. A field whose block is missing, or whose bytes do not
//! form a usable value (a non-finite float), is left out of the record.
//! Nothing here returns an error or panics on tag contents.
//!
//! Two rules sit on top of the plain table walk:
//! - **Production date**: `YYYY_MM_DD_HH_MM` becomes `YYYY-MM-DD HH:MM`;
//!   anything with fewer than five `_` tokens is kept verbatim.
//! - **Multicolor**: when block 16 starts with [`MULTICOLOR_MARKER`], bytes
//!   2..4 give the color count. A count of exactly 2 decodes the
//!   byte-reversed secondary color and appends it to the primary as
//!   `" / #RRGGBBAA"`. Without the marker the count is 1.

use std::collections::BTreeMap;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::layout::{field_spec, Field, FieldSpec, Scale, ValueType, FIELDS, MULTICOLOR_MARKER};
use crate::table::BlockTable;

// ── Value ────────────────────────────────────────────────────────────────────

/// A single decoded field, before it is placed in a [`DecodedSpool`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(u16),
    Float(f64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _              => None,
        }
    }

    pub fn as_int(&self) -> Option<u16> {
        match self {
            Value::Int(v) => Some(*v),
            _             => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v)   => Some(f64::from(*v)),
            _               => None,
        }
    }
}

// ── DecodedSpool ─────────────────────────────────────────────────────────────

/// Drying and printing temperatures from block 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Temperatures {
    #[serde(rename = "drying_temp_C")]
    pub drying_temp_c: u16,
    pub drying_time_h: u16,
    pub bed_temp_type: u16,
    #[serde(rename = "bed_temp_C")]
    pub bed_temp_c:    u16,
    #[serde(rename = "max_hotend_C")]
    pub max_hotend_c:  u16,
    #[serde(rename = "min_hotend_C")]
    pub min_hotend_c:  u16,
}

/// Filament attributes decoded from one tag. Every field is optional; an
/// absent field means its backing block was not available.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodedSpool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid:                    Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id:             Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_id:            Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_type:          Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_filament_type: Option<String>,
    /// `#RRGGBBAA`, or `#RRGGBBAA / #RRGGBBAA` for two-color filament.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_color:         Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_grams:           Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_diameter_mm:   Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperatures:           Option<Temperatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_cam_info_hex:         Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nozzle_diameter_mm:     Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tray_uid_hex:           Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_width_mm:         Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_date:        Option<String>,
    #[serde(rename = "unknown_date_1", skip_serializing_if = "Option::is_none")]
    pub unknown_date:           Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_length_m:      Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_color_count:   Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_color:        Option<String>,
}

impl DecodedSpool {
    /// Number of filament colors; 1 unless block 16 says otherwise.
    pub fn color_count(&self) -> u16 {
        self.filament_color_count.unwrap_or(1)
    }

    pub fn is_multicolor(&self) -> bool {
        self.color_count() > 1
    }

    /// Primary color alone, without any appended secondary.
    pub fn primary_color(&self) -> Option<&str> {
        self.filament_color
            .as_deref()
            .map(|c| c.split(" / ").next().unwrap_or(c))
    }

    /// `(label, rendered value)` pairs for display, with units.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        fn unit_of(field: Field) -> &'static str {
            field_spec(field).unit.map(|u| u.symbol()).unwrap_or("")
        }
        fn push<V: std::fmt::Display>(
            out:   &mut Vec<(&'static str, String)>,
            field: Field,
            value: Option<V>,
        ) {
            if let Some(v) = value {
                let unit = unit_of(field);
                let rendered = if unit.is_empty() { v.to_string() } else { format!("{v} {unit}") };
                out.push((field.label(), rendered));
            }
        }

        let mut out = Vec::new();
        push(&mut out, Field::Uid,                  self.uid.as_deref());
        push(&mut out, Field::FilamentType,         self.filament_type.as_deref());
        push(&mut out, Field::DetailedFilamentType, self.detailed_filament_type.as_deref());
        push(&mut out, Field::VariantId,            self.variant_id.as_deref());
        push(&mut out, Field::MaterialId,           self.material_id.as_deref());
        push(&mut out, Field::FilamentColor,        self.filament_color.as_deref());
        push(&mut out, Field::ColorCount,           self.filament_color_count);
        push(&mut out, Field::SpoolWeight,          self.weight_grams);
        push(&mut out, Field::FilamentDiameter,     self.filament_diameter_mm);
        push(&mut out, Field::FilamentLength,       self.filament_length_m);
        push(&mut out, Field::SpoolWidth,           self.spool_width_mm);
        push(&mut out, Field::NozzleDiameter,       self.nozzle_diameter_mm);
        if let Some(t) = &self.temperatures {
            push(&mut out, Field::DryingTemp,  Some(t.drying_temp_c));
            push(&mut out, Field::DryingTime,  Some(t.drying_time_h));
            push(&mut out, Field::BedTempType, Some(t.bed_temp_type));
            push(&mut out, Field::BedTemp,     Some(t.bed_temp_c));
            push(&mut out, Field::MinHotend,   Some(t.min_hotend_c));
            push(&mut out, Field::MaxHotend,   Some(t.max_hotend_c));
        }
        push(&mut out, Field::ProductionDate,       self.production_date.as_deref());
        push(&mut out, Field::UnknownDate,          self.unknown_date.as_deref());
        push(&mut out, Field::TrayUid,              self.tray_uid_hex.as_deref());
        push(&mut out, Field::XCamInfo,             self.x_cam_info_hex.as_deref());
        out
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────────

/// Decode every layout field whose block is present.
pub fn decode_fields(table: &BlockTable) -> BTreeMap<Field, Value> {
    FIELDS
        .iter()
        .filter_map(|s| {
            let data = table.get(s.block as usize)?;
            extract(s, s.slice(data)?).map(|v| (s.field, v))
        })
        .collect()
}

/// Decode a block table into a spool record.
pub fn decode(table: &BlockTable) -> DecodedSpool {
    let values = decode_fields(table);
    let text  = |f: Field| values.get(&f).and_then(Value::as_text).map(str::to_owned);
    let int   = |f: Field| values.get(&f).and_then(Value::as_int);
    let float = |f: Field| values.get(&f).and_then(Value::as_float);

    let mut spool = DecodedSpool {
        uid:                    text(Field::Uid),
        variant_id:             text(Field::VariantId),
        material_id:            text(Field::MaterialId),
        filament_type:          text(Field::FilamentType),
        detailed_filament_type: text(Field::DetailedFilamentType),
        filament_color:         text(Field::FilamentColor),
        weight_grams:           int(Field::SpoolWeight),
        filament_diameter_mm:   float(Field::FilamentDiameter),
        temperatures:           None,
        x_cam_info_hex:         text(Field::XCamInfo),
        nozzle_diameter_mm:     float(Field::NozzleDiameter),
        tray_uid_hex:           text(Field::TrayUid),
        spool_width_mm:         float(Field::SpoolWidth),
        production_date:        text(Field::ProductionDate),
        unknown_date:           text(Field::UnknownDate),
        filament_length_m:      int(Field::FilamentLength),
        filament_color_count:   None,
        secondary_color:        None,
    };

    spool.temperatures = (|| {
        Some(Temperatures {
            drying_temp_c: int(Field::DryingTemp)?,
            drying_time_h: int(Field::DryingTime)?,
            bed_temp_type: int(Field::BedTempType)?,
            bed_temp_c:    int(Field::BedTemp)?,
            max_hotend_c:  int(Field::MaxHotend)?,
            min_hotend_c:  int(Field::MinHotend)?,
        })
    })();

    if let Some(Value::Bytes(marker)) = values.get(&Field::MulticolorMarker) {
        let count = if marker[..] == MULTICOLOR_MARKER {
            int(Field::ColorCount).unwrap_or(1)
        } else {
            1
        };
        spool.filament_color_count = Some(count);
        if count == 2 {
            spool.secondary_color = text(Field::SecondaryColor);
            if let (Some(primary), Some(second)) = (&mut spool.filament_color, &spool.secondary_color) {
                primary.push_str(" / ");
                primary.push_str(second);
            }
        }
    }

    spool
}

fn extract(row: &FieldSpec, bytes: &[u8]) -> Option<Value> {
    let value = match row.value_type {
        ValueType::Ascii         => Value::Text(ascii_text(bytes)),
        ValueType::Hex           => Value::Text(hex::encode_upper(bytes)),
        ValueType::Color         => Value::Text(format!("#{}", hex::encode_upper(bytes))),
        ValueType::ReversedColor => {
            let reversed: Vec<u8> = bytes.iter().rev().copied().collect();
            Value::Text(format!("#{}", hex::encode_upper(reversed)))
        }
        ValueType::Date          => Value::Text(format_date(&ascii_text(bytes))),
        ValueType::Raw           => Value::Bytes(bytes.to_vec()),
        ValueType::U16           => {
            let raw = LittleEndian::read_u16(bytes);
            match row.scale {
                Scale::Identity  => Value::Int(raw),
                Scale::Divide(n) => Value::Float(f64::from(raw) / f64::from(n)),
                Scale::Round(_)  => Value::Float(f64::from(raw)),
            }
        }
        ValueType::F32           => {
            let raw = f64::from(LittleEndian::read_f32(bytes));
            if !raw.is_finite() {
                tracing::debug!(field = %row.field, "non-finite float dropped");
                return None;
            }
            Value::Float(match row.scale {
                Scale::Identity     => raw,
                Scale::Divide(n)    => raw / f64::from(n),
                Scale::Round(places) => round_to(raw, places),
            })
        }
    };
    Some(value)
}

/// ASCII text: non-ASCII bytes dropped, NUL read as space, outer whitespace trimmed.
fn ascii_text(bytes: &[u8]) -> String {
    let s: String = bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| if b == 0 { ' ' } else { b as char })
        .collect();
    s.trim().to_owned()
}

fn format_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.split('_').collect();
    if parts.len() >= 5 {
        format!("{}-{}-{} {}:{}", parts[0], parts[1], parts[2], parts[3], parts[4])
    } else {
        raw.to_owned()
    }
}

fn round_to(v: f64, places: u32) -> f64 {
    let p = 10f64.powi(places as i32);
    (v * p).round() / p
}
