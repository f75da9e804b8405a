//! Inventory payload: the shape a Spoolman-style service expects.
//!
//! Only the mapping lives here. Delivering the payload is left to the caller.

use serde::Serialize;

use crate::decode::DecodedSpool;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PayloadTemperatures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drying_temp_c:     Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drying_time_h:     Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_temp_c:        Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotend_temp_min_c: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotend_temp_max_c: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SpoolmanPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid:                    Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_type:          Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_filament_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_id:            Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id:             Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hex:              Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_weight_g:         Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_length_m:      Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament_diameter_mm:   Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_width_mm:         Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nozzle_diameter_mm:     Option<f64>,
    pub temperatures:           PayloadTemperatures,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_date:        Option<String>,
}

impl From<&DecodedSpool> for SpoolmanPayload {
    fn from(s: &DecodedSpool) -> Self {
        let t = s.temperatures;
        SpoolmanPayload {
            uid:                    s.uid.clone(),
            filament_type:          s.filament_type.clone(),
            detailed_filament_type: s.detailed_filament_type.clone(),
            material_id:            s.material_id.clone(),
            variant_id:             s.variant_id.clone(),
            color_hex:              s.filament_color.clone(),
            spool_weight_g:         s.weight_grams,
            filament_length_m:      s.filament_length_m,
            filament_diameter_mm:   s.filament_diameter_mm,
            spool_width_mm:         s.spool_width_mm,
            nozzle_diameter_mm:     s.nozzle_diameter_mm,
            temperatures: PayloadTemperatures {
                drying_temp_c:     t.map(|t| t.drying_temp_c),
                drying_time_h:     t.map(|t| t.drying_time_h),
                bed_temp_c:        t.map(|t| t.bed_temp_c),
                hotend_temp_min_c: t.map(|t| t.min_hotend_c),
                hotend_temp_max_c: t.map(|t| t.max_hotend_c),
            },
            production_date:        s.production_date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Temperatures;
    use serde_json::json;

    #[test]
    fn maps_field_names() {
        let spool = DecodedSpool {
            uid: Some("DEADBEEF".into()),
            filament_type: Some("PLA".into()),
            filament_color: Some("#AABBCC00 / #FF332211".into()),
            weight_grams: Some(1000),
            filament_diameter_mm: Some(1.75),
            temperatures: Some(Temperatures {
                drying_temp_c: 55,
                drying_time_h: 8,
                bed_temp_type: 1,
                bed_temp_c:    60,
                max_hotend_c:  230,
                min_hotend_c:  190,
            }),
            production_date: Some("2024-03-15 10:30".into()),
            ..Default::default()
        };
        let js = serde_json::to_value(SpoolmanPayload::from(&spool)).unwrap();
        assert_eq!(js, json!({
            "uid": "DEADBEEF",
            "filament_type": "PLA",
            "color_hex": "#AABBCC00 / #FF332211",
            "spool_weight_g": 1000,
            "filament_diameter_mm": 1.75,
            "temperatures": {
                "drying_temp_c": 55,
                "drying_time_h": 8,
                "bed_temp_c": 60,
                "hotend_temp_min_c": 190,
                "hotend_temp_max_c": 230
            },
            "production_date": "2024-03-15 10:30"
        }));
    }

    #[test]
    fn empty_record_keeps_temperature_object() {
        let js = serde_json::to_value(SpoolmanPayload::from(&DecodedSpool::default())).unwrap();
        assert_eq!(js, json!({ "temperatures": {} }));
    }
}
