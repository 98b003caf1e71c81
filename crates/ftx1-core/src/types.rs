//! Core types shared across the FTX-1 bridge.
//!
//! These types sit between the two protocol vocabularies: the Hamlib/rigctl
//! names spoken by network clients and the CAT codes spoken by the radio.
//! Conversions to and from both vocabularies live here so that the
//! translator and the CAT engine agree on one table.

use std::fmt;
use std::str::FromStr;

/// One of the radio's two VFOs.
///
/// VFO-A is the main receiver, VFO-B the sub receiver. On the Hamlib side
/// these are `VFOA` / `VFOB`; on the CAT side they appear as the digit `0`
/// or `1` embedded in per-VFO commands (`MD0`, `SM1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vfo {
    /// Main VFO (VFO-A).
    Main,
    /// Sub VFO (VFO-B).
    Sub,
}

impl Vfo {
    /// CAT digit for per-VFO commands (`0` for main, `1` for sub).
    pub fn cat_digit(&self) -> char {
        match self {
            Vfo::Main => '0',
            Vfo::Sub => '1',
        }
    }

    /// Hamlib VFO name (`VFOA` / `VFOB`).
    pub fn hamlib_name(&self) -> &'static str {
        match self {
            Vfo::Main => "VFOA",
            Vfo::Sub => "VFOB",
        }
    }
}

impl fmt::Display for Vfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hamlib_name())
    }
}

/// Error returned when a string cannot be parsed into one of the enums here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTypeError(pub String);

impl fmt::Display for ParseTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value: {}", self.0)
    }
}

impl std::error::Error for ParseTypeError {}

impl FromStr for Vfo {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VFOA" | "MAIN" | "A" | "CURRVFO" => Ok(Vfo::Main),
            "VFOB" | "SUB" | "B" => Ok(Vfo::Sub),
            _ => Err(ParseTypeError(s.to_string())),
        }
    }
}

/// Operating mode of the transceiver.
///
/// The variants mirror the FTX-1 CAT mode table exactly; the narrow modes
/// `FMN` and `AMN` exist only on the CAT side and collapse to `FM` / `AM`
/// when rendered for Hamlib clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Lower sideband voice.
    LSB,
    /// Upper sideband voice.
    USB,
    /// CW, upper sideband offset (Hamlib `CW`).
    CW,
    /// CW reverse (lower sideband offset).
    CWR,
    /// Amplitude modulation.
    AM,
    /// Frequency modulation.
    FM,
    /// Narrow FM (CAT only; renders as `FM` for Hamlib).
    FMN,
    /// Radio teletype, lower sideband (Hamlib `RTTY`; lower is canonical).
    RTTY,
    /// Radio teletype, upper sideband (Hamlib `RTTYR`).
    RTTYR,
    /// Data mode, lower sideband (Hamlib `PKTLSB`).
    DataLSB,
    /// Data mode, upper sideband (Hamlib `PKTUSB`).
    DataUSB,
    /// Data mode over FM (Hamlib `PKTFM`).
    DataFM,
    /// Narrow AM (CAT only; renders as `AM` for Hamlib).
    AMN,
}

impl Mode {
    /// The CAT mode code character (`MD` command payload).
    pub fn cat_code(&self) -> char {
        match self {
            Mode::LSB => '1',
            Mode::USB => '2',
            Mode::CW => '3',
            Mode::FM => '4',
            Mode::AM => '5',
            Mode::RTTY => '6',
            Mode::CWR => '7',
            Mode::DataLSB => '8',
            Mode::RTTYR => '9',
            Mode::DataFM => 'A',
            Mode::FMN => 'B',
            Mode::DataUSB => 'C',
            Mode::AMN => 'D',
        }
    }

    /// Parse a CAT mode code character. Code `E` (C4FM) is unsupported.
    pub fn from_cat_code(code: char) -> Option<Mode> {
        Some(match code {
            '1' => Mode::LSB,
            '2' => Mode::USB,
            '3' => Mode::CW,
            '4' => Mode::FM,
            '5' => Mode::AM,
            '6' => Mode::RTTY,
            '7' => Mode::CWR,
            '8' => Mode::DataLSB,
            '9' => Mode::RTTYR,
            'A' => Mode::DataFM,
            'B' => Mode::FMN,
            'C' => Mode::DataUSB,
            'D' => Mode::AMN,
            _ => return None,
        })
    }

    /// The Hamlib mode name sent to rigctl clients.
    ///
    /// The narrow modes collapse to their wide counterparts; everything in
    /// the bidirectional table round-trips through [`Mode::from_hamlib`].
    pub fn hamlib_name(&self) -> &'static str {
        match self {
            Mode::LSB => "LSB",
            Mode::USB => "USB",
            Mode::CW => "CW",
            Mode::CWR => "CWR",
            Mode::AM => "AM",
            Mode::FM => "FM",
            Mode::FMN => "FM",
            Mode::RTTY => "RTTY",
            Mode::RTTYR => "RTTYR",
            Mode::DataLSB => "PKTLSB",
            Mode::DataUSB => "PKTUSB",
            Mode::DataFM => "PKTFM",
            Mode::AMN => "AM",
        }
    }

    /// Parse a Hamlib mode name.
    ///
    /// Only the canonical bidirectional table is accepted: `CW` maps to the
    /// upper-sideband CW variant and `RTTY` to lower-sideband RTTY. The
    /// CAT-only narrow modes are never produced here.
    pub fn from_hamlib(name: &str) -> Option<Mode> {
        Some(match name.to_uppercase().as_str() {
            "LSB" => Mode::LSB,
            "USB" => Mode::USB,
            "CW" => Mode::CW,
            "CWR" => Mode::CWR,
            "AM" => Mode::AM,
            "FM" => Mode::FM,
            "RTTY" => Mode::RTTY,
            "RTTYR" => Mode::RTTYR,
            "PKTLSB" => Mode::DataLSB,
            "PKTUSB" => Mode::DataUSB,
            "PKTFM" => Mode::DataFM,
            _ => return None,
        })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hamlib_name())
    }
}

/// Physical head configuration of the FTX-1, discovered at connect time.
///
/// The head type governs the transmit power range (and therefore the
/// normalized RFPOWER scaling) and whether the internal antenna tuner
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadType {
    /// Field head running from its internal battery (0.5-6 W).
    FieldBattery,
    /// Field head on external 12 V (0.5-10 W).
    FieldDc,
    /// Optima head with the SPA-1 amplifier (5-100 W, internal tuner).
    Optima,
}

impl HeadType {
    /// Minimum transmit power in watts.
    pub fn min_power_watts(&self) -> f64 {
        match self {
            HeadType::FieldBattery | HeadType::FieldDc => 0.5,
            HeadType::Optima => 5.0,
        }
    }

    /// Maximum transmit power in watts.
    pub fn max_power_watts(&self) -> f64 {
        match self {
            HeadType::FieldBattery => 6.0,
            HeadType::FieldDc => 10.0,
            HeadType::Optima => 100.0,
        }
    }

    /// Minimum transmit power in milliwatts (dump_state TX range record).
    pub fn min_power_milliwatts(&self) -> u32 {
        (self.min_power_watts() * 1000.0) as u32
    }

    /// Maximum transmit power in milliwatts (dump_state TX range record).
    pub fn max_power_milliwatts(&self) -> u32 {
        (self.max_power_watts() * 1000.0) as u32
    }

    /// Whether this head has the internal antenna tuner (SPA-1 only).
    pub fn has_internal_tuner(&self) -> bool {
        matches!(self, HeadType::Optima)
    }

    /// Whether this is a Field head (either power source).
    pub fn is_field(&self) -> bool {
        !matches!(self, HeadType::Optima)
    }

    /// Human-readable head name for `get_info` / `dump_caps`.
    pub fn display_name(&self) -> &'static str {
        match self {
            HeadType::FieldBattery => "Field (battery)",
            HeadType::FieldDc => "Field (12V)",
            HeadType::Optima => "Optima (SPA-1)",
        }
    }
}

impl fmt::Display for HeadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// AGC time-constant setting (`GT` command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgcMode {
    /// AGC disabled.
    Off,
    /// Fast attack/release.
    Fast,
    /// Medium time constant.
    Mid,
    /// Slow time constant.
    Slow,
    /// Mode-dependent automatic selection.
    Auto,
}

impl AgcMode {
    /// The CAT digit for the `GT` command.
    pub fn cat_digit(&self) -> char {
        match self {
            AgcMode::Off => '0',
            AgcMode::Fast => '1',
            AgcMode::Mid => '2',
            AgcMode::Slow => '3',
            AgcMode::Auto => '4',
        }
    }

    /// Parse the CAT digit from a `GT` response.
    ///
    /// The radio reports `5`/`6` when AUTO has resolved to a concrete
    /// constant; those collapse back to [`AgcMode::Auto`].
    pub fn from_cat_digit(digit: char) -> Option<AgcMode> {
        Some(match digit {
            '0' => AgcMode::Off,
            '1' => AgcMode::Fast,
            '2' => AgcMode::Mid,
            '3' => AgcMode::Slow,
            '4' | '5' | '6' => AgcMode::Auto,
            _ => return None,
        })
    }

    /// Raw numeric value exchanged with Hamlib `l AGC` / `L AGC`.
    pub fn raw(&self) -> u8 {
        match self {
            AgcMode::Off => 0,
            AgcMode::Fast => 1,
            AgcMode::Mid => 2,
            AgcMode::Slow => 3,
            AgcMode::Auto => 4,
        }
    }

    /// Build from the raw Hamlib numeric value.
    pub fn from_raw(raw: u8) -> Option<AgcMode> {
        Some(match raw {
            0 => AgcMode::Off,
            1 => AgcMode::Fast,
            2 => AgcMode::Mid,
            3 => AgcMode::Slow,
            4 => AgcMode::Auto,
            _ => return None,
        })
    }
}

/// Selectable meter for the `RM` read command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterKind {
    /// Automatic level control.
    Alc,
    /// Standing wave ratio.
    Swr,
    /// Speech processor compression.
    Comp,
    /// Final stage drain current.
    Id,
    /// Final stage drain voltage.
    Vdd,
}

impl MeterKind {
    /// The CAT digit selecting this meter (`RM1;` .. `RM5;`).
    pub fn cat_digit(&self) -> char {
        match self {
            MeterKind::Alc => '1',
            MeterKind::Swr => '2',
            MeterKind::Comp => '3',
            MeterKind::Id => '4',
            MeterKind::Vdd => '5',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vfo_cat_digits() {
        assert_eq!(Vfo::Main.cat_digit(), '0');
        assert_eq!(Vfo::Sub.cat_digit(), '1');
    }

    #[test]
    fn vfo_display() {
        assert_eq!(Vfo::Main.to_string(), "VFOA");
        assert_eq!(Vfo::Sub.to_string(), "VFOB");
    }

    #[test]
    fn vfo_from_str_aliases() {
        assert_eq!("VFOA".parse::<Vfo>().unwrap(), Vfo::Main);
        assert_eq!("main".parse::<Vfo>().unwrap(), Vfo::Main);
        assert_eq!("A".parse::<Vfo>().unwrap(), Vfo::Main);
        assert_eq!("VFOB".parse::<Vfo>().unwrap(), Vfo::Sub);
        assert_eq!("sub".parse::<Vfo>().unwrap(), Vfo::Sub);
        assert!("VFOC".parse::<Vfo>().is_err());
    }

    #[test]
    fn mode_cat_round_trip() {
        let modes = [
            Mode::LSB,
            Mode::USB,
            Mode::CW,
            Mode::CWR,
            Mode::AM,
            Mode::FM,
            Mode::FMN,
            Mode::RTTY,
            Mode::RTTYR,
            Mode::DataLSB,
            Mode::DataUSB,
            Mode::DataFM,
            Mode::AMN,
        ];
        for mode in modes {
            let code = mode.cat_code();
            assert_eq!(Mode::from_cat_code(code), Some(mode), "failed for {mode:?}");
        }
    }

    #[test]
    fn mode_c4fm_unmapped() {
        assert_eq!(Mode::from_cat_code('E'), None);
        assert_eq!(Mode::from_cat_code('0'), None);
    }

    #[test]
    fn mode_hamlib_bidirectional_table() {
        // Everything the Hamlib parser accepts must render back to the same
        // name (the invariant that the mapping is one-to-one on the table).
        for name in [
            "LSB", "USB", "CW", "CWR", "AM", "FM", "RTTY", "RTTYR", "PKTLSB", "PKTUSB", "PKTFM",
        ] {
            let mode = Mode::from_hamlib(name).unwrap();
            assert_eq!(mode.hamlib_name(), name, "round-trip failed for {name}");
        }
    }

    #[test]
    fn mode_cw_is_upper_rtty_is_lower() {
        assert_eq!(Mode::from_hamlib("CW").unwrap().cat_code(), '3');
        assert_eq!(Mode::from_hamlib("RTTY").unwrap().cat_code(), '6');
        assert_eq!(Mode::from_hamlib("PKTUSB").unwrap().cat_code(), 'C');
    }

    #[test]
    fn mode_narrow_collapse() {
        assert_eq!(Mode::FMN.hamlib_name(), "FM");
        assert_eq!(Mode::AMN.hamlib_name(), "AM");
        // And the parser never produces the narrow variants.
        assert_eq!(Mode::from_hamlib("FM"), Some(Mode::FM));
        assert_eq!(Mode::from_hamlib("AM"), Some(Mode::AM));
    }

    #[test]
    fn mode_from_hamlib_case_insensitive() {
        assert_eq!(Mode::from_hamlib("pktusb"), Some(Mode::DataUSB));
        assert_eq!(Mode::from_hamlib("Usb"), Some(Mode::USB));
    }

    #[test]
    fn mode_from_hamlib_unknown() {
        assert_eq!(Mode::from_hamlib("C4FM"), None);
        assert_eq!(Mode::from_hamlib(""), None);
    }

    #[test]
    fn head_type_power_ranges() {
        assert_eq!(HeadType::FieldBattery.max_power_watts(), 6.0);
        assert_eq!(HeadType::FieldDc.max_power_watts(), 10.0);
        assert_eq!(HeadType::Optima.max_power_watts(), 100.0);
        assert_eq!(HeadType::FieldBattery.min_power_watts(), 0.5);
        assert_eq!(HeadType::Optima.min_power_watts(), 5.0);
    }

    #[test]
    fn head_type_milliwatts() {
        assert_eq!(HeadType::FieldDc.max_power_milliwatts(), 10_000);
        assert_eq!(HeadType::FieldDc.min_power_milliwatts(), 500);
        assert_eq!(HeadType::Optima.max_power_milliwatts(), 100_000);
    }

    #[test]
    fn head_type_tuner() {
        assert!(HeadType::Optima.has_internal_tuner());
        assert!(!HeadType::FieldBattery.has_internal_tuner());
        assert!(!HeadType::FieldDc.has_internal_tuner());
    }

    #[test]
    fn head_type_is_field() {
        assert!(HeadType::FieldBattery.is_field());
        assert!(HeadType::FieldDc.is_field());
        assert!(!HeadType::Optima.is_field());
    }

    #[test]
    fn agc_round_trip() {
        for agc in [
            AgcMode::Off,
            AgcMode::Fast,
            AgcMode::Mid,
            AgcMode::Slow,
            AgcMode::Auto,
        ] {
            assert_eq!(AgcMode::from_cat_digit(agc.cat_digit()), Some(agc));
            assert_eq!(AgcMode::from_raw(agc.raw()), Some(agc));
        }
    }

    #[test]
    fn agc_auto_aliases() {
        // 5 and 6 are the radio reporting AUTO resolved to fast/mid/slow.
        assert_eq!(AgcMode::from_cat_digit('5'), Some(AgcMode::Auto));
        assert_eq!(AgcMode::from_cat_digit('6'), Some(AgcMode::Auto));
        assert_eq!(AgcMode::from_cat_digit('7'), None);
    }

    #[test]
    fn meter_digits() {
        assert_eq!(MeterKind::Alc.cat_digit(), '1');
        assert_eq!(MeterKind::Swr.cat_digit(), '2');
        assert_eq!(MeterKind::Comp.cat_digit(), '3');
        assert_eq!(MeterKind::Id.cat_digit(), '4');
        assert_eq!(MeterKind::Vdd.cat_digit(), '5');
    }
}
