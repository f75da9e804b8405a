//! Field layout: the frozen schema of the spool tag format.
//!
//! Every offset the decoder uses lives in [`FIELDS`]. Offsets are zero-based
//! byte positions inside a 16-byte block; `end` is exclusive.
//!
//! # Endianness
//! All integers and floats are little-endian. The secondary color is the
//! one field stored byte-reversed.

use std::fmt;

/// Block 16 bytes 0..2 must equal this for the multicolor fields to apply.
pub const MULTICOLOR_MARKER: [u8; 2] = [0x02, 0x00];

// ── Field ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Uid,
    VariantId,
    MaterialId,
    FilamentType,
    DetailedFilamentType,
    FilamentColor,
    SpoolWeight,
    FilamentDiameter,
    DryingTemp,
    DryingTime,
    BedTempType,
    BedTemp,
    MaxHotend,
    MinHotend,
    XCamInfo,
    NozzleDiameter,
    TrayUid,
    SpoolWidth,
    ProductionDate,
    UnknownDate,
    FilamentLength,
    MulticolorMarker,
    ColorCount,
    SecondaryColor,
}

impl Field {
    /// Key used in the serialized record.
    pub fn name(self) -> &'static str {
        match self {
            Field::Uid                  => "uid",
            Field::VariantId            => "variant_id",
            Field::MaterialId           => "material_id",
            Field::FilamentType         => "filament_type",
            Field::DetailedFilamentType => "detailed_filament_type",
            Field::FilamentColor        => "filament_color",
            Field::SpoolWeight          => "weight_grams",
            Field::FilamentDiameter     => "filament_diameter_mm",
            Field::DryingTemp           => "drying_temp_C",
            Field::DryingTime           => "drying_time_h",
            Field::BedTempType          => "bed_temp_type",
            Field::BedTemp              => "bed_temp_C",
            Field::MaxHotend            => "max_hotend_C",
            Field::MinHotend            => "min_hotend_C",
            Field::XCamInfo             => "x_cam_info_hex",
            Field::NozzleDiameter       => "nozzle_diameter_mm",
            Field::TrayUid              => "tray_uid_hex",
            Field::SpoolWidth           => "spool_width_mm",
            Field::ProductionDate       => "production_date",
            Field::UnknownDate          => "unknown_date_1",
            Field::FilamentLength       => "filament_length_m",
            Field::MulticolorMarker     => "multicolor_marker",
            Field::ColorCount           => "filament_color_count",
            Field::SecondaryColor       => "secondary_color",
        }
    }

    /// Human-readable label (display only).
    pub fn label(self) -> &'static str {
        match self {
            Field::Uid                  => "UID",
            Field::VariantId            => "Variant ID",
            Field::MaterialId           => "Material ID",
            Field::FilamentType         => "Filament type",
            Field::DetailedFilamentType => "Detailed type",
            Field::FilamentColor        => "Color",
            Field::SpoolWeight          => "Spool weight",
            Field::FilamentDiameter     => "Filament diameter",
            Field::DryingTemp           => "Drying temperature",
            Field::DryingTime           => "Drying time",
            Field::BedTempType          => "Bed temperature type",
            Field::BedTemp              => "Bed temperature",
            Field::MaxHotend            => "Max hotend temperature",
            Field::MinHotend            => "Min hotend temperature",
            Field::XCamInfo             => "X-cam info",
            Field::NozzleDiameter       => "Nozzle diameter",
            Field::TrayUid              => "Tray UID",
            Field::SpoolWidth           => "Spool width",
            Field::ProductionDate       => "Production date",
            Field::UnknownDate          => "Secondary date",
            Field::FilamentLength       => "Filament length",
            Field::MulticolorMarker     => "Multicolor marker",
            Field::ColorCount           => "Color count",
            Field::SecondaryColor       => "Secondary color",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Value types, scales, units ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// ASCII text; non-ASCII dropped, NUL as space, trimmed.
    Ascii,
    /// Upper-case hex passthrough.
    Hex,
    /// `#` + upper-case hex of the stored bytes.
    Color,
    /// `#` + upper-case hex of the bytes in reverse order.
    ReversedColor,
    /// Little-endian u16.
    U16,
    /// Little-endian IEEE-754 binary32.
    F32,
    /// ASCII `Y_M_D_H_M` reformatted, else verbatim.
    Date,
    /// Raw bytes, compared against a sentinel.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Identity,
    /// Stored value is in 1/n of the unit.
    Divide(u32),
    /// Round to this many decimal places.
    Round(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Grams,
    Millimetres,
    Metres,
    Celsius,
    Hours,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Grams       => "g",
            Unit::Millimetres => "mm",
            Unit::Metres      => "m",
            Unit::Celsius     => "°C",
            Unit::Hours       => "h",
        }
    }
}

// ── FieldSpec ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field:      Field,
    pub block:      u8,
    pub start:      usize,
    pub end:        usize,
    pub value_type: ValueType,
    pub scale:      Scale,
    pub unit:       Option<Unit>,
}

impl FieldSpec {
    /// Byte slice this field occupies in `data`, if it is long enough.
    pub fn slice<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        data.get(self.start..self.end)
    }
}

const fn row(
    field:      Field,
    block:      u8,
    start:      usize,
    end:        usize,
    value_type: ValueType,
    scale:      Scale,
    unit:       Option<Unit>,
) -> FieldSpec {
    FieldSpec { field, block, start, end, value_type, scale, unit }
}

use Field as F;
use Scale::{Divide, Identity, Round};
use ValueType as T;

const G:  Option<Unit> = Some(Unit::Grams);
const MM: Option<Unit> = Some(Unit::Millimetres);
const M:  Option<Unit> = Some(Unit::Metres);
const C:  Option<Unit> = Some(Unit::Celsius);
const H:  Option<Unit> = Some(Unit::Hours);

/// The tag layout, in block order.
pub static FIELDS: &[FieldSpec] = &[
    row(F::Uid,                   0,  0,  4, T::Hex,           Identity,   None),
    row(F::VariantId,             1,  0,  8, T::Ascii,         Identity,   None),
    row(F::MaterialId,            1,  8, 16, T::Ascii,         Identity,   None),
    row(F::FilamentType,          2,  0, 16, T::Ascii,         Identity,   None),
    row(F::DetailedFilamentType,  4,  0, 16, T::Ascii,         Identity,   None),
    row(F::FilamentColor,         5,  0,  4, T::Color,         Identity,   None),
    row(F::SpoolWeight,           5,  4,  6, T::U16,           Identity,   G),
    row(F::FilamentDiameter,      5,  8, 12, T::F32,           Round(3),   MM),
    row(F::DryingTemp,            6,  0,  2, T::U16,           Identity,   C),
    row(F::DryingTime,            6,  2,  4, T::U16,           Identity,   H),
    row(F::BedTempType,           6,  4,  6, T::U16,           Identity,   None),
    row(F::BedTemp,               6,  6,  8, T::U16,           Identity,   C),
    row(F::MaxHotend,             6,  8, 10, T::U16,           Identity,   C),
    row(F::MinHotend,             6, 10, 12, T::U16,           Identity,   C),
    row(F::XCamInfo,              8,  0, 12, T::Hex,           Identity,   None),
    row(F::NozzleDiameter,        8, 12, 16, T::F32,           Round(1),   MM),
    row(F::TrayUid,               9,  0, 16, T::Hex,           Identity,   None),
    row(F::SpoolWidth,           10,  4,  6, T::U16,           Divide(100), MM),
    row(F::ProductionDate,       12,  0, 16, T::Date,          Identity,   None),
    row(F::UnknownDate,          13,  0, 16, T::Ascii,         Identity,   None),
    row(F::FilamentLength,       14,  4,  6, T::U16,           Identity,   M),
    row(F::MulticolorMarker,     16,  0,  2, T::Raw,           Identity,   None),
    row(F::ColorCount,           16,  2,  4, T::U16,           Identity,   None),
    row(F::SecondaryColor,       16,  4,  8, T::ReversedColor, Identity,   None),
];

/// Layout entry for `field`.
pub fn field_spec(field: Field) -> &'static FieldSpec {
    FIELDS
        .iter()
        .find(|s| s.field == field)
        .unwrap_or_else(|| unreachable!("every Field has a layout row"))
}

/// Sorted, deduplicated block indices the layout reads.
pub fn referenced_blocks() -> Vec<usize> {
    let mut blocks: Vec<usize> = FIELDS.iter().map(|s| s.block as usize).collect();
    blocks.dedup();
    blocks
}
