//! # Value Information Field (VIF) Normalization
//!
//! Maps the primary VIF code of a data record to its unit, decimal scaling
//! exponent, and physical quantity. A record's raw value multiplied by the
//! exponent yields the value in the base unit (Wh, m³, m³/h, °C, ...).

use crate::error::MBusError;

/// Unit and scaling information carried by a VIF code.
#[derive(Debug, Clone, PartialEq)]
pub struct VifInfo {
    pub vif: u8,
    pub unit: &'static str,
    pub exponent: f64,
    pub quantity: &'static str,
}

fn pow10(exp: i32) -> f64 {
    10f64.powi(exp)
}

/// Looks up a primary VIF code (extension bit already stripped).
pub fn lookup_primary_vif(vif: u8) -> Option<VifInfo> {
    let n = i32::from(vif & 0x07);
    let (unit, exponent, quantity): (&'static str, f64, &'static str) = match vif {
        0x00..=0x07 => ("Wh", pow10(n - 3), "Energy"),
        0x08..=0x0F => ("J", pow10(n), "Energy"),
        0x10..=0x17 => ("m^3", pow10(n - 6), "Volume"),
        0x18..=0x1F => ("kg", pow10(n - 3), "Mass"),
        0x20..=0x27 => (
            match vif & 0x03 {
                0 => "s",
                1 => "min",
                2 => "h",
                _ => "days",
            },
            1.0,
            if vif <= 0x23 { "On time" } else { "Operating time" },
        ),
        0x28..=0x2F => ("W", pow10(n - 3), "Power"),
        0x30..=0x37 => ("J/h", pow10(n), "Power"),
        0x38..=0x3F => ("m^3/h", pow10(n - 6), "Volume flow"),
        0x40..=0x47 => ("m^3/min", pow10(n - 7), "Volume flow"),
        0x48..=0x4F => ("m^3/s", pow10(n - 9), "Volume flow"),
        0x50..=0x57 => ("kg/h", pow10(n - 3), "Mass flow"),
        0x58..=0x5B => ("°C", pow10((n & 3) - 3), "Flow temperature"),
        0x5C..=0x5F => ("°C", pow10((n & 3) - 3), "Return temperature"),
        0x60..=0x63 => ("K", pow10((n & 3) - 3), "Temperature difference"),
        0x64..=0x67 => ("°C", pow10((n & 3) - 3), "External temperature"),
        0x68..=0x6B => ("bar", pow10((n & 3) - 3), "Pressure"),
        0x6C => ("", 1.0, "Time point (date)"),
        0x6D => ("", 1.0, "Time point (date & time)"),
        0x6E => ("HCA units", 1.0, "H.C.A."),
        0x70..=0x77 => (
            match vif & 0x03 {
                0 => "s",
                1 => "min",
                2 => "h",
                _ => "days",
            },
            1.0,
            if vif <= 0x73 {
                "Averaging duration"
            } else {
                "Actuality duration"
            },
        ),
        0x78 => ("", 1.0, "Fabrication number"),
        0x79 => ("", 1.0, "Identification"),
        0x7A => ("", 1.0, "Bus address"),
        // Custom ASCII unit: the unit text rides in the record itself.
        0x7C => ("", 1.0, "Any VIF"),
        0x7F => ("", 1.0, "Manufacturer specific"),
        _ => return None,
    };
    Some(VifInfo {
        vif,
        unit,
        exponent,
        quantity,
    })
}

/// Normalizes a VIF code, failing on codes this driver does not model.
pub fn normalize_vif(vif: u8) -> Result<VifInfo, MBusError> {
    lookup_primary_vif(vif).ok_or(MBusError::UnknownVif(vif))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_exponents() {
        assert_eq!(lookup_primary_vif(0x03).unwrap().exponent, 1.0);
        assert_eq!(lookup_primary_vif(0x06).unwrap().exponent, 1000.0);
        assert_eq!(lookup_primary_vif(0x00).unwrap().exponent, 0.001);
    }

    #[test]
    fn volume_milli_cubic_metre() {
        let info = lookup_primary_vif(0x13).unwrap();
        assert_eq!(info.unit, "m^3");
        assert_eq!(info.exponent, 1e-3);
        assert_eq!(info.quantity, "Volume");
    }

    #[test]
    fn flow_and_temperatures() {
        assert_eq!(lookup_primary_vif(0x3B).unwrap().exponent, 1e-3);
        assert_eq!(lookup_primary_vif(0x3B).unwrap().unit, "m^3/h");
        assert_eq!(lookup_primary_vif(0x5B).unwrap().exponent, 1.0);
        assert_eq!(lookup_primary_vif(0x5F).unwrap().quantity, "Return temperature");
    }

    #[test]
    fn unknown_vif_is_an_error() {
        assert!(lookup_primary_vif(0x7B).is_none());
        assert!(matches!(normalize_vif(0x7B), Err(MBusError::UnknownVif(0x7B))));
    }

    #[test]
    fn custom_unit_vif_is_modeled() {
        let info = lookup_primary_vif(0x7C).unwrap();
        assert_eq!(info.unit, "");
        assert_eq!(info.exponent, 1.0);
    }
}
