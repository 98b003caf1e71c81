//! FTX-1 CAT command builders and response parsers.
//!
//! All functions here are pure -- they produce or consume byte vectors and
//! string slices without performing any I/O. The link layer sends the bytes
//! and feeds received payloads back into the parsers.
//!
//! Frequencies are always 9 ASCII digits in hertz, zero-padded on the left.
//! Mode codes are single hex-digit characters (`1`-`D`). RIT and XIT are
//! set through `RC`/`TC`; the `RT`/`XT` commands of earlier Yaesu firmware
//! are rejected by the FTX-1 with `?;`.

use ftx1_core::{AgcMode, Error, HeadType, MeterKind, Mode, Result, Vfo};

use crate::protocol::encode_command;

/// The CAT identity reported by every FTX-1 variant (`ID;` response).
pub const FTX1_ID: &str = "0840";

/// Standard CTCSS tone table, in tenths of hertz, indexed by the CAT tone
/// number (`CN` command payload 00-49).
pub const CTCSS_TONES_DECIHZ: [u32; 50] = [
    670, 693, 719, 744, 770, 797, 825, 854, 885, 915, 948, 974, 1000, 1035, 1072, 1109, 1148,
    1188, 1230, 1273, 1318, 1365, 1413, 1462, 1514, 1567, 1598, 1622, 1655, 1679, 1713, 1738,
    1773, 1799, 1835, 1862, 1899, 1928, 1966, 1995, 2035, 2065, 2107, 2181, 2257, 2291, 2336,
    2418, 2503, 2541,
];

/// Standard DCS code table, indexed by the CAT code number (`CN` command
/// payload 000-103).
pub const DCS_CODES: [u16; 104] = [
    23, 25, 26, 31, 32, 36, 43, 47, 51, 53, 54, 65, 71, 72, 73, 74, 114, 115, 116, 122, 125, 131,
    132, 134, 143, 145, 152, 155, 156, 162, 165, 172, 174, 205, 212, 223, 225, 226, 243, 244,
    245, 246, 251, 252, 255, 261, 263, 265, 266, 271, 274, 306, 311, 315, 325, 331, 332, 343,
    346, 351, 356, 364, 365, 371, 411, 412, 413, 423, 431, 432, 445, 446, 452, 454, 455, 462,
    464, 465, 466, 503, 506, 516, 523, 526, 532, 546, 565, 606, 612, 624, 627, 631, 632, 654,
    662, 664, 703, 712, 723, 731, 732, 734, 743, 754,
];

// ---------------------------------------------------------------
// Identity / head detection
// ---------------------------------------------------------------

/// Build a "read radio identity" command (`ID;`).
pub fn cmd_read_id() -> Vec<u8> {
    encode_command("ID", "")
}

/// Parse an `ID` response and verify it identifies an FTX-1.
pub fn parse_id_response(data: &str) -> Result<()> {
    if data == FTX1_ID {
        Ok(())
    } else {
        Err(Error::Protocol(format!(
            "unexpected radio id {data:?}, expected {FTX1_ID}"
        )))
    }
}

/// Build the Field-head power-source probe (`PC10.8;`).
///
/// 8 W is above the battery ceiling (6 W) but inside the 12 V range
/// (10 W), so acceptance distinguishes the two supplies.
pub fn cmd_probe_field_power() -> Vec<u8> {
    encode_command("PC", "10.8")
}

// ---------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------

/// Build a "read VFO frequency" command (`FA;` / `FB;`).
pub fn cmd_read_frequency(vfo: Vfo) -> Vec<u8> {
    match vfo {
        Vfo::Main => encode_command("FA", ""),
        Vfo::Sub => encode_command("FB", ""),
    }
}

/// Build a "set VFO frequency" command (`FA{freq:09};` / `FB{freq:09};`).
pub fn cmd_set_frequency(vfo: Vfo, freq_hz: u64) -> Vec<u8> {
    let prefix = match vfo {
        Vfo::Main => "FA",
        Vfo::Sub => "FB",
    };
    encode_command(prefix, &format!("{freq_hz:09}"))
}

/// Parse a frequency response (`FA`/`FB` data: exactly 9 digits of hertz).
pub fn parse_frequency_response(data: &str) -> Result<u64> {
    if data.len() != 9 || !data.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!(
            "expected 9 digits for frequency, got {data:?}"
        )));
    }
    data.parse::<u64>()
        .map_err(|e| Error::Protocol(format!("invalid frequency digits: {data:?} ({e})")))
}

// ---------------------------------------------------------------
// Mode
// ---------------------------------------------------------------

/// Build a "read operating mode" command (`MD0;` / `MD1;`).
pub fn cmd_read_mode(vfo: Vfo) -> Vec<u8> {
    encode_command("MD", &vfo.cat_digit().to_string())
}

/// Build a "set operating mode" command (`MD0{code};` / `MD1{code};`).
pub fn cmd_set_mode(vfo: Vfo, mode: Mode) -> Vec<u8> {
    encode_command("MD", &format!("{}{}", vfo.cat_digit(), mode.cat_code()))
}

/// Parse a mode response (single CAT mode code character).
pub fn parse_mode_response(data: &str) -> Result<Mode> {
    let mut chars = data.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Mode::from_cat_code(c)
            .ok_or_else(|| Error::Protocol(format!("unknown mode code: {data:?}"))),
        _ => Err(Error::Protocol(format!(
            "expected single mode code, got {data:?}"
        ))),
    }
}

// ---------------------------------------------------------------
// PTT / active VFO / split
// ---------------------------------------------------------------

/// Build a "read PTT state" command (`TX;`).
pub fn cmd_read_ptt() -> Vec<u8> {
    encode_command("TX", "")
}

/// Build a "set PTT" command (`TX1;` keys, `TX0;` unkeys). No response.
pub fn cmd_set_ptt(on: bool) -> Vec<u8> {
    encode_command("TX", if on { "1" } else { "0" })
}

/// Parse a PTT response: `0` receive, `1` transmit (mic), `2` transmit (data).
pub fn parse_ptt_response(data: &str) -> Result<bool> {
    match data {
        "0" => Ok(false),
        "1" | "2" => Ok(true),
        _ => Err(Error::Protocol(format!("unexpected TX state: {data:?}"))),
    }
}

/// Build a "read active VFO" command (`VS;`).
pub fn cmd_read_active_vfo() -> Vec<u8> {
    encode_command("VS", "")
}

/// Build a "select active VFO" command (`VS0;` / `VS1;`). No response.
pub fn cmd_set_active_vfo(vfo: Vfo) -> Vec<u8> {
    encode_command("VS", &vfo.cat_digit().to_string())
}

/// Parse a `VS` response into the active VFO.
pub fn parse_active_vfo_response(data: &str) -> Result<Vfo> {
    match data {
        "0" => Ok(Vfo::Main),
        "1" => Ok(Vfo::Sub),
        _ => Err(Error::Protocol(format!("unexpected VFO digit: {data:?}"))),
    }
}

/// Build a "read split state" command (`ST;`).
pub fn cmd_read_split() -> Vec<u8> {
    encode_command("ST", "")
}

/// Build a "set split" command (`ST1;` / `ST0;`). No response.
pub fn cmd_set_split(on: bool) -> Vec<u8> {
    encode_command("ST", if on { "1" } else { "0" })
}

/// Parse a `0`/`1` on-off payload.
pub fn parse_on_off_response(data: &str) -> Result<bool> {
    match data {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(Error::Protocol(format!(
            "expected 0 or 1, got {data:?}"
        ))),
    }
}

// ---------------------------------------------------------------
// Power
// ---------------------------------------------------------------

/// Build a "read RF power" command (`PC;`).
pub fn cmd_read_power() -> Vec<u8> {
    encode_command("PC", "")
}

/// Build a "set RF power" command.
///
/// Field heads take decimal watts (`PC5.5;`); the Optima/SPA-1 takes the
/// classic 3-digit integer form (`PC050;`).
pub fn cmd_set_power(head: HeadType, watts: f64) -> Vec<u8> {
    if head.is_field() {
        encode_command("PC", &format!("{watts:.1}"))
    } else {
        encode_command("PC", &format!("{:03}", watts.round() as u32))
    }
}

/// Build a raw power restore command from a previously read `PC` payload.
pub fn cmd_restore_power(raw_payload: &str) -> Vec<u8> {
    encode_command("PC", raw_payload)
}

/// Parse a power response in watts. Accepts both the integer (`050`) and
/// decimal (`5.5`) payload forms.
pub fn parse_power_response(data: &str) -> Result<f64> {
    if data.is_empty() {
        return Err(Error::Protocol("empty power response".into()));
    }
    data.parse::<f64>()
        .map_err(|e| Error::Protocol(format!("invalid power value: {data:?} ({e})")))
}

// ---------------------------------------------------------------
// RIT / XIT (RC / TC -- the FTX-1 rejects RT/XT with `?;`)
// ---------------------------------------------------------------

/// Build a "read RIT offset" command (`RC;`).
pub fn cmd_read_rit() -> Vec<u8> {
    encode_command("RC", "")
}

/// Build a "set RIT offset" command (`RC+0050;` / `RC-0120;`). No response.
pub fn cmd_set_rit(offset_hz: i32) -> Vec<u8> {
    encode_command("RC", &format_signed_offset(offset_hz))
}

/// Build a "read XIT offset" command (`TC;`).
pub fn cmd_read_xit() -> Vec<u8> {
    encode_command("TC", "")
}

/// Build a "set XIT offset" command (`TC+0050;` / `TC-0120;`). No response.
pub fn cmd_set_xit(offset_hz: i32) -> Vec<u8> {
    encode_command("TC", &format_signed_offset(offset_hz))
}

fn format_signed_offset(offset_hz: i32) -> String {
    let clamped = offset_hz.clamp(-9999, 9999);
    format!("{}{:04}", if clamped < 0 { '-' } else { '+' }, clamped.abs())
}

/// Parse a signed offset payload (`+0050` / `-0120`).
pub fn parse_offset_response(data: &str) -> Result<i32> {
    if data.len() != 5 {
        return Err(Error::Protocol(format!(
            "expected signed 4-digit offset, got {data:?}"
        )));
    }
    let sign = match &data[0..1] {
        "+" => 1i32,
        "-" => -1i32,
        other => {
            return Err(Error::Protocol(format!(
                "expected + or - offset sign, got {other:?}"
            )));
        }
    };
    let digits = &data[1..5];
    let abs: i32 = digits
        .parse()
        .map_err(|e| Error::Protocol(format!("invalid offset digits: {digits:?} ({e})")))?;
    Ok(sign * abs)
}

// ---------------------------------------------------------------
// AGC / meters
// ---------------------------------------------------------------

/// Build a "read AGC" command (`GT0;` / `GT1;`).
pub fn cmd_read_agc(vfo: Vfo) -> Vec<u8> {
    encode_command("GT", &vfo.cat_digit().to_string())
}

/// Build a "set AGC" command (`GT0{0-4};`).
pub fn cmd_set_agc(vfo: Vfo, agc: AgcMode) -> Vec<u8> {
    encode_command("GT", &format!("{}{}", vfo.cat_digit(), agc.cat_digit()))
}

/// Parse a `GT` response into an AGC mode.
pub fn parse_agc_response(data: &str) -> Result<AgcMode> {
    let mut chars = data.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => AgcMode::from_cat_digit(c)
            .ok_or_else(|| Error::Protocol(format!("unknown AGC digit: {data:?}"))),
        _ => Err(Error::Protocol(format!(
            "expected single AGC digit, got {data:?}"
        ))),
    }
}

/// Build a "read meter" command (`RM1;` .. `RM5;`).
pub fn cmd_read_meter(kind: MeterKind) -> Vec<u8> {
    encode_command("RM", &kind.cat_digit().to_string())
}

/// Build a "read S-meter" command (`SM0;` / `SM1;`). Raw scale 0-255.
pub fn cmd_read_s_meter(vfo: Vfo) -> Vec<u8> {
    encode_command("SM", &vfo.cat_digit().to_string())
}

/// Parse a 3-digit meter payload (000-255).
pub fn parse_meter_response(data: &str) -> Result<u16> {
    if data.len() != 3 {
        return Err(Error::Protocol(format!(
            "expected 3 digits for meter, got {data:?}"
        )));
    }
    data.parse::<u16>()
        .map_err(|e| Error::Protocol(format!("invalid meter digits: {data:?} ({e})")))
}

// ---------------------------------------------------------------
// Gains and per-VFO levels
// ---------------------------------------------------------------

/// Build a "read AF gain" command (`AG0;`).
pub fn cmd_read_af_gain(vfo: Vfo) -> Vec<u8> {
    encode_command("AG", &vfo.cat_digit().to_string())
}

/// Build a "set AF gain" command (`AG0{0-255:03};`).
pub fn cmd_set_af_gain(vfo: Vfo, raw: u8) -> Vec<u8> {
    encode_command("AG", &format!("{}{raw:03}", vfo.cat_digit()))
}

/// Build a "read RF gain" command (`RG0;`).
pub fn cmd_read_rf_gain(vfo: Vfo) -> Vec<u8> {
    encode_command("RG", &vfo.cat_digit().to_string())
}

/// Build a "set RF gain" command (`RG0{0-255:03};`).
pub fn cmd_set_rf_gain(vfo: Vfo, raw: u8) -> Vec<u8> {
    encode_command("RG", &format!("{}{raw:03}", vfo.cat_digit()))
}

/// Build a "read squelch" command (`SQ0;`).
pub fn cmd_read_squelch(vfo: Vfo) -> Vec<u8> {
    encode_command("SQ", &vfo.cat_digit().to_string())
}

/// Build a "set squelch" command (`SQ0{0-100:03};`).
pub fn cmd_set_squelch(vfo: Vfo, raw: u8) -> Vec<u8> {
    encode_command("SQ", &format!("{}{raw:03}", vfo.cat_digit()))
}

/// Build a "read mic gain" command (`MG;`).
pub fn cmd_read_mic_gain() -> Vec<u8> {
    encode_command("MG", "")
}

/// Build a "set mic gain" command (`MG{0-100:03};`).
pub fn cmd_set_mic_gain(raw: u8) -> Vec<u8> {
    encode_command("MG", &format!("{raw:03}"))
}

/// Build a "read keyer speed" command (`KS;`).
pub fn cmd_read_keyer_speed() -> Vec<u8> {
    encode_command("KS", "")
}

/// Build a "set keyer speed" command (`KS{4-60:03};`).
pub fn cmd_set_keyer_speed(wpm: u8) -> Vec<u8> {
    encode_command("KS", &format!("{wpm:03}"))
}

/// Build a "read VOX gain" command (`VG;`).
pub fn cmd_read_vox_gain() -> Vec<u8> {
    encode_command("VG", "")
}

/// Build a "set VOX gain" command (`VG{0-100:03};`).
pub fn cmd_set_vox_gain(raw: u8) -> Vec<u8> {
    encode_command("VG", &format!("{raw:03}"))
}

/// Build a "read VOX delay" command (`VD;`).
pub fn cmd_read_vox_delay() -> Vec<u8> {
    encode_command("VD", "")
}

/// Build a "set VOX delay" command (`VD{ms:04};`).
pub fn cmd_set_vox_delay(ms: u16) -> Vec<u8> {
    encode_command("VD", &format!("{ms:04}"))
}

/// Build a "read break-in delay" command (`SD;`).
pub fn cmd_read_break_in_delay() -> Vec<u8> {
    encode_command("SD", "")
}

/// Build a "set break-in delay" command (`SD{ms:04};`).
pub fn cmd_set_break_in_delay(ms: u16) -> Vec<u8> {
    encode_command("SD", &format!("{ms:04}"))
}

/// Build a "read noise-reduction level" command (`RL0;`).
pub fn cmd_read_nr_level(vfo: Vfo) -> Vec<u8> {
    encode_command("RL", &vfo.cat_digit().to_string())
}

/// Build a "set noise-reduction level" command (`RL0{0-15:02};`).
pub fn cmd_set_nr_level(vfo: Vfo, level: u8) -> Vec<u8> {
    encode_command("RL", &format!("{}{level:02}", vfo.cat_digit()))
}

/// Build a "read noise-blanker level" command (`NL0;`).
pub fn cmd_read_nb_level(vfo: Vfo) -> Vec<u8> {
    encode_command("NL", &vfo.cat_digit().to_string())
}

/// Build a "set noise-blanker level" command (`NL0{0-15:02};`).
pub fn cmd_set_nb_level(vfo: Vfo, level: u8) -> Vec<u8> {
    encode_command("NL", &format!("{}{level:02}", vfo.cat_digit()))
}

/// Build a "read monitor level" command (`ML1;`).
pub fn cmd_read_monitor_level() -> Vec<u8> {
    encode_command("ML", "1")
}

/// Build a "set monitor level" command (`ML1{0-100:03};`).
pub fn cmd_set_monitor_level(raw: u8) -> Vec<u8> {
    encode_command("ML", &format!("1{raw:03}"))
}

/// Parse a fixed-width unsigned numeric payload of `len` digits.
pub fn parse_numeric_response(data: &str, len: usize) -> Result<u16> {
    if data.len() != len {
        return Err(Error::Protocol(format!(
            "expected {len} digits, got {data:?}"
        )));
    }
    data.parse::<u16>()
        .map_err(|e| Error::Protocol(format!("invalid digits: {data:?} ({e})")))
}

// ---------------------------------------------------------------
// Preamp / attenuator / manual notch
// ---------------------------------------------------------------

/// Build a "read preamp" command (`PA0;`). Response 0=IPO, 1=AMP1, 2=AMP2.
pub fn cmd_read_preamp(vfo: Vfo) -> Vec<u8> {
    encode_command("PA", &vfo.cat_digit().to_string())
}

/// Build a "set preamp" command (`PA0{0-2};`).
pub fn cmd_set_preamp(vfo: Vfo, level: u8) -> Vec<u8> {
    encode_command("PA", &format!("{}{level}", vfo.cat_digit()))
}

/// Build a "read attenuator" command (`RA0;`). Response 0=off, 1=12 dB.
pub fn cmd_read_attenuator(vfo: Vfo) -> Vec<u8> {
    encode_command("RA", &vfo.cat_digit().to_string())
}

/// Build a "set attenuator" command (`RA0{0|1};`).
pub fn cmd_set_attenuator(vfo: Vfo, on: bool) -> Vec<u8> {
    encode_command(
        "RA",
        &format!("{}{}", vfo.cat_digit(), if on { '1' } else { '0' }),
    )
}

/// Build a "read manual notch frequency" command (`BP01;`).
pub fn cmd_read_notch_freq(vfo: Vfo) -> Vec<u8> {
    encode_command("BP", &format!("{}1", vfo.cat_digit()))
}

/// Build a "set manual notch frequency" command (`BP01{hz/10:03};`).
///
/// The radio positions the notch in 10 Hz steps.
pub fn cmd_set_notch_freq(vfo: Vfo, hz: u16) -> Vec<u8> {
    encode_command("BP", &format!("{}1{:03}", vfo.cat_digit(), hz / 10))
}

/// Parse a `BP` notch-position payload back into hertz.
pub fn parse_notch_freq_response(data: &str) -> Result<u16> {
    // Payload is `1NNN` after the prefix split (`BP0` absorbs the VFO digit).
    let digits = data
        .strip_prefix('1')
        .ok_or_else(|| Error::Protocol(format!("unexpected notch payload: {data:?}")))?;
    Ok(parse_numeric_response(digits, 3)? * 10)
}

// ---------------------------------------------------------------
// On/off functions
// ---------------------------------------------------------------

/// Build a "read noise blanker on/off" command (`NB0;`).
pub fn cmd_read_nb(vfo: Vfo) -> Vec<u8> {
    encode_command("NB", &vfo.cat_digit().to_string())
}

/// Build a "set noise blanker on/off" command (`NB0{0|1};`).
pub fn cmd_set_nb(vfo: Vfo, on: bool) -> Vec<u8> {
    encode_command(
        "NB",
        &format!("{}{}", vfo.cat_digit(), if on { '1' } else { '0' }),
    )
}

/// Build a "read noise reduction on/off" command (`NR0;`).
pub fn cmd_read_nr(vfo: Vfo) -> Vec<u8> {
    encode_command("NR", &vfo.cat_digit().to_string())
}

/// Build a "set noise reduction on/off" command (`NR0{0|1};`).
pub fn cmd_set_nr(vfo: Vfo, on: bool) -> Vec<u8> {
    encode_command(
        "NR",
        &format!("{}{}", vfo.cat_digit(), if on { '1' } else { '0' }),
    )
}

/// Build a "read auto-notch on/off" command (`BC0;`).
pub fn cmd_read_auto_notch(vfo: Vfo) -> Vec<u8> {
    encode_command("BC", &vfo.cat_digit().to_string())
}

/// Build a "set auto-notch on/off" command (`BC0{0|1};`).
pub fn cmd_set_auto_notch(vfo: Vfo, on: bool) -> Vec<u8> {
    encode_command(
        "BC",
        &format!("{}{}", vfo.cat_digit(), if on { '1' } else { '0' }),
    )
}

/// Build a "read APF on/off" command (`CO02;`).
pub fn cmd_read_apf(vfo: Vfo) -> Vec<u8> {
    encode_command("CO", &format!("{}2", vfo.cat_digit()))
}

/// Build a "set APF on/off" command (`CO02000{0|1};`).
pub fn cmd_set_apf(vfo: Vfo, on: bool) -> Vec<u8> {
    encode_command(
        "CO",
        &format!("{}2000{}", vfo.cat_digit(), if on { '1' } else { '0' }),
    )
}

/// Parse a `CO` APF payload (`2000{0|1}` after the prefix split).
pub fn parse_apf_response(data: &str) -> Result<bool> {
    match data {
        "20000" => Ok(false),
        "20001" => Ok(true),
        _ => Err(Error::Protocol(format!(
            "unexpected APF payload: {data:?}"
        ))),
    }
}

/// Build a "read speech processor on/off" command (`PR0;`).
pub fn cmd_read_processor() -> Vec<u8> {
    encode_command("PR", "0")
}

/// Build a "set speech processor on/off" command (`PR0{0|1};`).
pub fn cmd_set_processor(on: bool) -> Vec<u8> {
    encode_command("PR", if on { "01" } else { "00" })
}

/// Build a "read VOX on/off" command (`VX;`).
pub fn cmd_read_vox() -> Vec<u8> {
    encode_command("VX", "")
}

/// Build a "set VOX on/off" command (`VX{0|1};`).
pub fn cmd_set_vox(on: bool) -> Vec<u8> {
    encode_command("VX", if on { "1" } else { "0" })
}

/// Build a "read dial lock" command (`LK;`).
pub fn cmd_read_lock() -> Vec<u8> {
    encode_command("LK", "")
}

/// Build a "set dial lock" command (`LK{0|1};`).
pub fn cmd_set_lock(on: bool) -> Vec<u8> {
    encode_command("LK", if on { "1" } else { "0" })
}

/// Build a "read CW break-in" command (`BI;`).
pub fn cmd_read_break_in() -> Vec<u8> {
    encode_command("BI", "")
}

/// Build a "set CW break-in" command (`BI{0|1};`).
pub fn cmd_set_break_in(on: bool) -> Vec<u8> {
    encode_command("BI", if on { "1" } else { "0" })
}

/// Build a "read internal tuner state" command (`AC;`). SPA-1 only.
pub fn cmd_read_tuner() -> Vec<u8> {
    encode_command("AC", "")
}

/// Build a "set internal tuner" command (`AC00{0|1};`). SPA-1 only.
pub fn cmd_set_tuner(on: bool) -> Vec<u8> {
    encode_command("AC", if on { "001" } else { "000" })
}

/// Parse an `AC` tuner response (`00{0|1|2}`; `2` means tuning in progress).
pub fn parse_tuner_response(data: &str) -> Result<bool> {
    match data {
        "000" => Ok(false),
        "001" | "002" => Ok(true),
        _ => Err(Error::Protocol(format!(
            "unexpected tuner payload: {data:?}"
        ))),
    }
}

// ---------------------------------------------------------------
// CTCSS / DCS
// ---------------------------------------------------------------

/// Build a "read CTCSS tone number" command (`CN00;`).
pub fn cmd_read_ctcss_tone(vfo: Vfo) -> Vec<u8> {
    encode_command("CN", &format!("{}0", vfo.cat_digit()))
}

/// Build a "set CTCSS tone number" command (`CN00{idx:02};`).
pub fn cmd_set_ctcss_tone(vfo: Vfo, index: u8) -> Vec<u8> {
    encode_command("CN", &format!("{}0{index:02}", vfo.cat_digit()))
}

/// Build a "read DCS code number" command (`CN01;`).
pub fn cmd_read_dcs_code(vfo: Vfo) -> Vec<u8> {
    encode_command("CN", &format!("{}1", vfo.cat_digit()))
}

/// Build a "set DCS code number" command (`CN01{idx:03};`).
pub fn cmd_set_dcs_code(vfo: Vfo, index: u8) -> Vec<u8> {
    encode_command("CN", &format!("{}1{index:03}", vfo.cat_digit()))
}

/// Build a "read CTCSS/DCS mode" command (`CT0;`).
pub fn cmd_read_ctcss_mode(vfo: Vfo) -> Vec<u8> {
    encode_command("CT", &vfo.cat_digit().to_string())
}

/// Build a "set CTCSS/DCS mode" command (`CT0{0-3};`).
///
/// 0 = off, 1 = CTCSS encode, 2 = CTCSS encode/decode (tone squelch),
/// 3 = DCS.
pub fn cmd_set_ctcss_mode(vfo: Vfo, mode: u8) -> Vec<u8> {
    encode_command("CT", &format!("{}{mode}", vfo.cat_digit()))
}

/// Look up the CTCSS tone for a CAT tone number, in tenths of hertz.
pub fn ctcss_index_to_decihz(index: u8) -> Result<u32> {
    CTCSS_TONES_DECIHZ
        .get(index as usize)
        .copied()
        .ok_or_else(|| Error::InvalidArgument(format!("CTCSS tone index {index} out of range")))
}

/// Find the CAT tone number for a CTCSS tone in tenths of hertz.
pub fn ctcss_decihz_to_index(decihz: u32) -> Result<u8> {
    CTCSS_TONES_DECIHZ
        .iter()
        .position(|&t| t == decihz)
        .map(|i| i as u8)
        .ok_or_else(|| Error::InvalidArgument(format!("no CTCSS tone at {decihz} deci-Hz")))
}

/// Look up the DCS code for a CAT code number.
pub fn dcs_index_to_code(index: u8) -> Result<u16> {
    DCS_CODES
        .get(index as usize)
        .copied()
        .ok_or_else(|| Error::InvalidArgument(format!("DCS code index {index} out of range")))
}

/// Find the CAT code number for a DCS code.
pub fn dcs_code_to_index(code: u16) -> Result<u8> {
    DCS_CODES
        .iter()
        .position(|&c| c == code)
        .map(|i| i as u8)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown DCS code {code:03}")))
}

// ---------------------------------------------------------------
// Memory
// ---------------------------------------------------------------

/// Build a "read memory channel number" command (`MC;`).
pub fn cmd_read_memory_channel() -> Vec<u8> {
    encode_command("MC", "")
}

/// Build a "select memory channel" command (`MC{ch:03};`).
pub fn cmd_set_memory_channel(channel: u16) -> Vec<u8> {
    encode_command("MC", &format!("{channel:03}"))
}

/// Build a "read memory channel contents" command (`MR{ch:03};`).
pub fn cmd_read_channel(channel: u16) -> Vec<u8> {
    encode_command("MR", &format!("{channel:03}"))
}

// ---------------------------------------------------------------
// CW message / voice memory
// ---------------------------------------------------------------

/// Build a "send CW message" command (`KY {text};`).
///
/// The keyer buffer takes at most 24 characters; longer text is truncated.
pub fn cmd_send_morse(text: &str) -> Vec<u8> {
    let truncated: String = text.chars().take(24).collect();
    encode_command("KY", &format!(" {truncated}"))
}

/// Build a "stop CW message" command (`KY` with a blank 24-character
/// payload, which flushes the keyer buffer).
pub fn cmd_stop_morse() -> Vec<u8> {
    encode_command("KY", &" ".repeat(25))
}

/// Build a "play voice memory" command (`PB{1-5};`). No response.
pub fn cmd_play_voice_memory(slot: u8) -> Vec<u8> {
    encode_command("PB", &slot.to_string())
}

// ---------------------------------------------------------------
// Auto Information / menu
// ---------------------------------------------------------------

/// Build a "set Auto Information mode" command.
///
/// `AI1;` enables unsolicited state pushes; `AI0;` disables them.
pub fn cmd_set_auto_info(on: bool) -> Vec<u8> {
    encode_command("AI", if on { "1" } else { "0" })
}

/// Build a "read SSB tuning step" menu query (`EX0306;`).
pub fn cmd_read_tuning_step_menu() -> Vec<u8> {
    encode_command("EX", "0306")
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Identity / probe
    // ---------------------------------------------------------------

    #[test]
    fn cmd_read_id_bytes() {
        assert_eq!(cmd_read_id(), b"ID;");
    }

    #[test]
    fn parse_id_accepts_ftx1() {
        assert!(parse_id_response("0840").is_ok());
    }

    #[test]
    fn parse_id_rejects_other_radios() {
        assert!(parse_id_response("0670").is_err());
        assert!(parse_id_response("").is_err());
    }

    #[test]
    fn probe_command_bytes() {
        assert_eq!(cmd_probe_field_power(), b"PC10.8;");
    }

    // ---------------------------------------------------------------
    // Frequency
    // ---------------------------------------------------------------

    #[test]
    fn cmd_read_frequency_bytes() {
        assert_eq!(cmd_read_frequency(Vfo::Main), b"FA;");
        assert_eq!(cmd_read_frequency(Vfo::Sub), b"FB;");
    }

    #[test]
    fn cmd_set_frequency_zero_padded() {
        assert_eq!(cmd_set_frequency(Vfo::Main, 14_074_000), b"FA014074000;");
        assert_eq!(cmd_set_frequency(Vfo::Sub, 7_074_000), b"FB007074000;");
        assert_eq!(cmd_set_frequency(Vfo::Main, 1_800_000), b"FA001800000;");
        assert_eq!(cmd_set_frequency(Vfo::Main, 446_000_000), b"FA446000000;");
    }

    #[test]
    fn parse_frequency_ok() {
        assert_eq!(parse_frequency_response("014074000").unwrap(), 14_074_000);
        assert_eq!(parse_frequency_response("146520000").unwrap(), 146_520_000);
        assert_eq!(parse_frequency_response("000000000").unwrap(), 0);
    }

    #[test]
    fn parse_frequency_bad() {
        assert!(parse_frequency_response("0140740").is_err());
        assert!(parse_frequency_response("0140740000").is_err());
        assert!(parse_frequency_response("01407400A").is_err());
        assert!(parse_frequency_response("").is_err());
    }

    // ---------------------------------------------------------------
    // Mode
    // ---------------------------------------------------------------

    #[test]
    fn cmd_mode_bytes() {
        assert_eq!(cmd_read_mode(Vfo::Main), b"MD0;");
        assert_eq!(cmd_read_mode(Vfo::Sub), b"MD1;");
        assert_eq!(cmd_set_mode(Vfo::Main, Mode::USB), b"MD02;");
        assert_eq!(cmd_set_mode(Vfo::Main, Mode::DataUSB), b"MD0C;");
        assert_eq!(cmd_set_mode(Vfo::Sub, Mode::CW), b"MD13;");
        assert_eq!(cmd_set_mode(Vfo::Main, Mode::RTTY), b"MD06;");
    }

    #[test]
    fn parse_mode_all_codes() {
        assert_eq!(parse_mode_response("1").unwrap(), Mode::LSB);
        assert_eq!(parse_mode_response("7").unwrap(), Mode::CWR);
        assert_eq!(parse_mode_response("A").unwrap(), Mode::DataFM);
        assert_eq!(parse_mode_response("B").unwrap(), Mode::FMN);
        assert_eq!(parse_mode_response("D").unwrap(), Mode::AMN);
    }

    #[test]
    fn parse_mode_bad() {
        assert!(parse_mode_response("E").is_err());
        assert!(parse_mode_response("").is_err());
        assert!(parse_mode_response("12").is_err());
    }

    // ---------------------------------------------------------------
    // PTT / VFO / split
    // ---------------------------------------------------------------

    #[test]
    fn ptt_bytes_and_parse() {
        assert_eq!(cmd_read_ptt(), b"TX;");
        assert_eq!(cmd_set_ptt(true), b"TX1;");
        assert_eq!(cmd_set_ptt(false), b"TX0;");
        assert!(!parse_ptt_response("0").unwrap());
        assert!(parse_ptt_response("1").unwrap());
        assert!(parse_ptt_response("2").unwrap());
        assert!(parse_ptt_response("3").is_err());
    }

    #[test]
    fn active_vfo_bytes_and_parse() {
        assert_eq!(cmd_read_active_vfo(), b"VS;");
        assert_eq!(cmd_set_active_vfo(Vfo::Main), b"VS0;");
        assert_eq!(cmd_set_active_vfo(Vfo::Sub), b"VS1;");
        assert_eq!(parse_active_vfo_response("0").unwrap(), Vfo::Main);
        assert_eq!(parse_active_vfo_response("1").unwrap(), Vfo::Sub);
        assert!(parse_active_vfo_response("2").is_err());
    }

    #[test]
    fn split_bytes() {
        assert_eq!(cmd_read_split(), b"ST;");
        assert_eq!(cmd_set_split(true), b"ST1;");
        assert_eq!(cmd_set_split(false), b"ST0;");
    }

    // ---------------------------------------------------------------
    // Power
    // ---------------------------------------------------------------

    #[test]
    fn power_field_decimal_format() {
        assert_eq!(cmd_set_power(HeadType::FieldBattery, 5.5), b"PC5.5;");
        assert_eq!(cmd_set_power(HeadType::FieldDc, 10.0), b"PC10.0;");
        assert_eq!(cmd_set_power(HeadType::FieldBattery, 0.5), b"PC0.5;");
    }

    #[test]
    fn power_optima_integer_format() {
        assert_eq!(cmd_set_power(HeadType::Optima, 50.0), b"PC050;");
        assert_eq!(cmd_set_power(HeadType::Optima, 100.0), b"PC100;");
        assert_eq!(cmd_set_power(HeadType::Optima, 5.4), b"PC005;");
    }

    #[test]
    fn parse_power_both_forms() {
        assert_eq!(parse_power_response("050").unwrap(), 50.0);
        assert_eq!(parse_power_response("5.5").unwrap(), 5.5);
        assert_eq!(parse_power_response("10.0").unwrap(), 10.0);
        assert!(parse_power_response("").is_err());
        assert!(parse_power_response("5O").is_err());
    }

    // ---------------------------------------------------------------
    // RIT / XIT
    // ---------------------------------------------------------------

    #[test]
    fn rit_xit_use_rc_tc() {
        assert_eq!(cmd_set_rit(50), b"RC+0050;");
        assert_eq!(cmd_set_rit(-120), b"RC-0120;");
        assert_eq!(cmd_set_rit(0), b"RC+0000;");
        assert_eq!(cmd_set_xit(500), b"TC+0500;");
        assert_eq!(cmd_set_xit(-9999), b"TC-9999;");
        assert_eq!(cmd_read_rit(), b"RC;");
        assert_eq!(cmd_read_xit(), b"TC;");
    }

    #[test]
    fn rit_offset_clamped() {
        assert_eq!(cmd_set_rit(20_000), b"RC+9999;");
        assert_eq!(cmd_set_rit(-20_000), b"RC-9999;");
    }

    #[test]
    fn parse_offset_ok() {
        assert_eq!(parse_offset_response("+0050").unwrap(), 50);
        assert_eq!(parse_offset_response("-0120").unwrap(), -120);
        assert_eq!(parse_offset_response("+0000").unwrap(), 0);
        assert_eq!(parse_offset_response("-0000").unwrap(), 0);
        assert_eq!(parse_offset_response("+9999").unwrap(), 9999);
    }

    #[test]
    fn parse_offset_bad() {
        assert!(parse_offset_response("0050").is_err());
        assert!(parse_offset_response("+050").is_err());
        assert!(parse_offset_response("*0050").is_err());
        assert!(parse_offset_response("+00A0").is_err());
    }

    // ---------------------------------------------------------------
    // AGC / meters
    // ---------------------------------------------------------------

    #[test]
    fn agc_bytes_and_parse() {
        assert_eq!(cmd_read_agc(Vfo::Main), b"GT0;");
        assert_eq!(cmd_set_agc(Vfo::Main, AgcMode::Slow), b"GT03;");
        assert_eq!(cmd_set_agc(Vfo::Sub, AgcMode::Auto), b"GT14;");
        assert_eq!(parse_agc_response("2").unwrap(), AgcMode::Mid);
        assert_eq!(parse_agc_response("5").unwrap(), AgcMode::Auto);
        assert!(parse_agc_response("9").is_err());
    }

    #[test]
    fn meter_bytes() {
        assert_eq!(cmd_read_meter(MeterKind::Alc), b"RM1;");
        assert_eq!(cmd_read_meter(MeterKind::Swr), b"RM2;");
        assert_eq!(cmd_read_meter(MeterKind::Vdd), b"RM5;");
        assert_eq!(cmd_read_s_meter(Vfo::Main), b"SM0;");
        assert_eq!(cmd_read_s_meter(Vfo::Sub), b"SM1;");
    }

    #[test]
    fn parse_meter_ok_and_bad() {
        assert_eq!(parse_meter_response("000").unwrap(), 0);
        assert_eq!(parse_meter_response("255").unwrap(), 255);
        assert_eq!(parse_meter_response("120").unwrap(), 120);
        assert!(parse_meter_response("12").is_err());
        assert!(parse_meter_response("1234").is_err());
        assert!(parse_meter_response("1B0").is_err());
    }

    // ---------------------------------------------------------------
    // Gains
    // ---------------------------------------------------------------

    #[test]
    fn gain_bytes() {
        assert_eq!(cmd_read_af_gain(Vfo::Main), b"AG0;");
        assert_eq!(cmd_set_af_gain(Vfo::Main, 128), b"AG0128;");
        assert_eq!(cmd_set_rf_gain(Vfo::Main, 255), b"RG0255;");
        assert_eq!(cmd_set_squelch(Vfo::Main, 50), b"SQ0050;");
        assert_eq!(cmd_set_mic_gain(75), b"MG075;");
        assert_eq!(cmd_set_keyer_speed(25), b"KS025;");
        assert_eq!(cmd_set_vox_gain(50), b"VG050;");
        assert_eq!(cmd_set_vox_delay(500), b"VD0500;");
        assert_eq!(cmd_set_break_in_delay(150), b"SD0150;");
        assert_eq!(cmd_set_nr_level(Vfo::Main, 8), b"RL008;");
        assert_eq!(cmd_set_nb_level(Vfo::Main, 15), b"NL015;");
        assert_eq!(cmd_set_monitor_level(50), b"ML1050;");
        assert_eq!(cmd_read_monitor_level(), b"ML1;");
    }

    #[test]
    fn parse_numeric_lengths() {
        assert_eq!(parse_numeric_response("128", 3).unwrap(), 128);
        assert_eq!(parse_numeric_response("08", 2).unwrap(), 8);
        assert_eq!(parse_numeric_response("0500", 4).unwrap(), 500);
        assert!(parse_numeric_response("128", 2).is_err());
        assert!(parse_numeric_response("1a8", 3).is_err());
    }

    // ---------------------------------------------------------------
    // Preamp / attenuator / notch
    // ---------------------------------------------------------------

    #[test]
    fn preamp_attenuator_bytes() {
        assert_eq!(cmd_read_preamp(Vfo::Main), b"PA0;");
        assert_eq!(cmd_set_preamp(Vfo::Main, 2), b"PA02;");
        assert_eq!(cmd_read_attenuator(Vfo::Main), b"RA0;");
        assert_eq!(cmd_set_attenuator(Vfo::Main, true), b"RA01;");
        assert_eq!(cmd_set_attenuator(Vfo::Main, false), b"RA00;");
    }

    #[test]
    fn notch_bytes_and_parse() {
        assert_eq!(cmd_read_notch_freq(Vfo::Main), b"BP01;");
        assert_eq!(cmd_set_notch_freq(Vfo::Main, 1500), b"BP01150;");
        assert_eq!(parse_notch_freq_response("1150").unwrap(), 1500);
        assert!(parse_notch_freq_response("0150").is_err());
    }

    // ---------------------------------------------------------------
    // Functions
    // ---------------------------------------------------------------

    #[test]
    fn function_bytes() {
        assert_eq!(cmd_set_nb(Vfo::Main, true), b"NB01;");
        assert_eq!(cmd_set_nr(Vfo::Main, false), b"NR00;");
        assert_eq!(cmd_set_auto_notch(Vfo::Main, true), b"BC01;");
        assert_eq!(cmd_set_processor(true), b"PR01;");
        assert_eq!(cmd_read_processor(), b"PR0;");
        assert_eq!(cmd_set_vox(true), b"VX1;");
        assert_eq!(cmd_set_lock(false), b"LK0;");
        assert_eq!(cmd_set_break_in(true), b"BI1;");
    }

    #[test]
    fn apf_bytes_and_parse() {
        assert_eq!(cmd_read_apf(Vfo::Main), b"CO02;");
        assert_eq!(cmd_set_apf(Vfo::Main, true), b"CO020001;");
        assert_eq!(cmd_set_apf(Vfo::Main, false), b"CO020000;");
        assert!(parse_apf_response("20001").unwrap());
        assert!(!parse_apf_response("20000").unwrap());
        assert!(parse_apf_response("20002").is_err());
    }

    #[test]
    fn tuner_bytes_and_parse() {
        assert_eq!(cmd_read_tuner(), b"AC;");
        assert_eq!(cmd_set_tuner(true), b"AC001;");
        assert_eq!(cmd_set_tuner(false), b"AC000;");
        assert!(!parse_tuner_response("000").unwrap());
        assert!(parse_tuner_response("001").unwrap());
        assert!(parse_tuner_response("002").unwrap());
        assert!(parse_tuner_response("010").is_err());
    }

    // ---------------------------------------------------------------
    // CTCSS / DCS
    // ---------------------------------------------------------------

    #[test]
    fn ctcss_bytes() {
        assert_eq!(cmd_read_ctcss_tone(Vfo::Main), b"CN00;");
        assert_eq!(cmd_set_ctcss_tone(Vfo::Main, 12), b"CN0012;");
        assert_eq!(cmd_read_dcs_code(Vfo::Main), b"CN01;");
        assert_eq!(cmd_set_dcs_code(Vfo::Main, 5), b"CN01005;");
        assert_eq!(cmd_set_ctcss_mode(Vfo::Main, 2), b"CT02;");
    }

    #[test]
    fn ctcss_table_round_trip() {
        // 100.0 Hz is index 12 in the standard table.
        assert_eq!(ctcss_index_to_decihz(12).unwrap(), 1000);
        assert_eq!(ctcss_decihz_to_index(1000).unwrap(), 12);
        // 67.0 Hz is the first tone.
        assert_eq!(ctcss_index_to_decihz(0).unwrap(), 670);
        // 254.1 Hz is the last.
        assert_eq!(ctcss_index_to_decihz(49).unwrap(), 2541);
        assert!(ctcss_index_to_decihz(50).is_err());
        assert!(ctcss_decihz_to_index(999).is_err());
    }

    #[test]
    fn dcs_table_round_trip() {
        assert_eq!(dcs_index_to_code(0).unwrap(), 23);
        assert_eq!(dcs_code_to_index(23).unwrap(), 0);
        assert_eq!(dcs_index_to_code(103).unwrap(), 754);
        assert!(dcs_index_to_code(104).is_err());
        assert!(dcs_code_to_index(999).is_err());
    }

    // ---------------------------------------------------------------
    // Memory / CW / AI
    // ---------------------------------------------------------------

    #[test]
    fn memory_bytes() {
        assert_eq!(cmd_read_memory_channel(), b"MC;");
        assert_eq!(cmd_set_memory_channel(17), b"MC017;");
        assert_eq!(cmd_read_channel(5), b"MR005;");
    }

    #[test]
    fn morse_bytes() {
        assert_eq!(cmd_send_morse("CQ TEST"), b"KY CQ TEST;");
        let long = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        assert_eq!(cmd_send_morse(long), b"KY ABCDEFGHIJKLMNOPQRSTUVWX;");
        let stop = cmd_stop_morse();
        assert_eq!(stop.len(), 28);
        assert!(stop.starts_with(b"KY "));
        assert!(stop[2..27].iter().all(|&b| b == b' '));
    }

    #[test]
    fn voice_memory_bytes() {
        assert_eq!(cmd_play_voice_memory(1), b"PB1;");
        assert_eq!(cmd_play_voice_memory(5), b"PB5;");
    }

    #[test]
    fn auto_info_uses_ai1() {
        assert_eq!(cmd_set_auto_info(true), b"AI1;");
        assert_eq!(cmd_set_auto_info(false), b"AI0;");
    }

    #[test]
    fn tuning_step_menu_bytes() {
        assert_eq!(cmd_read_tuning_step_menu(), b"EX0306;");
    }
}
