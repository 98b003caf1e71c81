//! rigctl verb translation.
//!
//! One request line in, one response string out. Verbs are parsed into a
//! sum type at the boundary; level and function names likewise. Handlers
//! call into [`Radio`] and render the Hamlib wire format: value lines for
//! queries, `RPRT <code>` for commands.
//!
//! The caller (the session loop) holds the rig lock across
//! [`handle_line`], so a multi-command handler like `set_split_freq_mode`
//! is atomic with respect to other clients.

use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use ftx1_cat::Radio;
use ftx1_core::error::{Error, Result};
use ftx1_core::types::{AgcMode, MeterKind, Mode, Vfo};

/// Hamlib result codes used on this interface.
pub const RPRT_OK: i32 = 0;
/// Invalid argument (malformed verb, bad numeric, unknown level name).
pub const RPRT_EINVAL: i32 = -1;
/// Protocol error (radio rejected the command or the reply was malformed).
pub const RPRT_EPROTO: i32 = -2;
/// Feature not available on this head configuration.
pub const RPRT_ENAVAIL: i32 = -11;

fn rprt(code: i32) -> String {
    format!("RPRT {code}\n")
}

/// Map an error to the RPRT code the client sees.
///
/// CAT-level failures (rejection, timeout, malformed reply) surface as
/// `-2` and the session lives on; a dead serial link also answers `-2`
/// for the in-flight command, but [`Handled::link_closed`] tells the
/// session to hang up afterwards.
fn rprt_for_error(e: &Error) -> i32 {
    match e {
        Error::InvalidArgument(_) => RPRT_EINVAL,
        Error::NotAvailable(_) => RPRT_ENAVAIL,
        _ => RPRT_EPROTO,
    }
}

/// Outcome of handling one request line.
#[derive(Debug)]
pub struct Handled {
    /// Response text to write back, always ending in `\n`.
    pub reply: String,
    /// The serial link to the radio is gone: this reply is the last one,
    /// and the session must close after writing it.
    pub link_closed: bool,
}

impl Handled {
    fn ok(reply: String) -> Handled {
        Handled {
            reply,
            link_closed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Verbs
// ---------------------------------------------------------------------------

/// Every rigctl verb this server dispatches. Raw verb strings do not
/// travel past [`Verb::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    GetFreq,
    SetFreq,
    GetMode,
    SetMode,
    GetPtt,
    SetPtt,
    GetVfo,
    SetVfo,
    GetRit,
    SetRit,
    GetXit,
    SetXit,
    GetMem,
    SetMem,
    GetChannel,
    SetChannel,
    GetCtcssTone,
    SetCtcssTone,
    GetDcsCode,
    SetDcsCode,
    GetTs,
    SetTs,
    GetLevel,
    SetLevel,
    GetFunc,
    SetFunc,
    GetSplitVfo,
    SetSplitVfo,
    SendCmd,
    GetInfo,
    DumpCaps,
    Help,
    Quit,
    DumpState,
    GetPowerstat,
    SetPowerstat,
    ChkVfo,
    GetVfoInfo,
    GetRigInfo,
    GetSplitMode,
    SetSplitMode,
    GetSplitFreq,
    SetSplitFreq,
    GetSplitFreqMode,
    SetSplitFreqMode,
    GetClock,
    SetClock,
    GetLockMode,
    SetLockMode,
    SendMorse,
    StopMorse,
    WaitMorse,
    SendVoiceMem,
    Halt,
    Pause,
}

impl Verb {
    /// Parse a verb token. Extended verbs are accepted with or without
    /// their leading backslash.
    fn parse(token: &str) -> Option<Verb> {
        let token = token.strip_prefix('\\').unwrap_or(token);
        Some(match token {
            "f" | "get_freq" => Verb::GetFreq,
            "F" | "set_freq" => Verb::SetFreq,
            "m" | "get_mode" => Verb::GetMode,
            "M" | "set_mode" => Verb::SetMode,
            "t" | "get_ptt" => Verb::GetPtt,
            "T" | "set_ptt" => Verb::SetPtt,
            "v" | "get_vfo" => Verb::GetVfo,
            "V" | "set_vfo" => Verb::SetVfo,
            "j" | "get_rit" => Verb::GetRit,
            "J" | "set_rit" => Verb::SetRit,
            "z" | "get_xit" => Verb::GetXit,
            "Z" | "set_xit" => Verb::SetXit,
            "e" | "get_mem" => Verb::GetMem,
            "E" | "set_mem" => Verb::SetMem,
            "h" | "get_channel" => Verb::GetChannel,
            "H" | "set_channel" => Verb::SetChannel,
            "c" | "get_ctcss_tone" => Verb::GetCtcssTone,
            "C" | "set_ctcss_tone" => Verb::SetCtcssTone,
            "d" | "get_dcs_code" => Verb::GetDcsCode,
            "D" | "set_dcs_code" => Verb::SetDcsCode,
            "n" | "get_ts" => Verb::GetTs,
            "N" | "set_ts" => Verb::SetTs,
            "l" | "get_level" => Verb::GetLevel,
            "L" | "set_level" => Verb::SetLevel,
            "u" | "get_func" => Verb::GetFunc,
            "U" | "set_func" => Verb::SetFunc,
            "s" | "get_split_vfo" => Verb::GetSplitVfo,
            "S" | "set_split_vfo" => Verb::SetSplitVfo,
            "w" | "send_cmd" => Verb::SendCmd,
            "_" | "get_info" => Verb::GetInfo,
            "1" | "dump_caps" => Verb::DumpCaps,
            "?" | "help" => Verb::Help,
            "q" | "quit" | "exit" => Verb::Quit,
            "dump_state" => Verb::DumpState,
            "get_powerstat" => Verb::GetPowerstat,
            "set_powerstat" => Verb::SetPowerstat,
            "chk_vfo" => Verb::ChkVfo,
            "get_vfo_info" => Verb::GetVfoInfo,
            "get_rig_info" => Verb::GetRigInfo,
            "get_split_mode" => Verb::GetSplitMode,
            "set_split_mode" => Verb::SetSplitMode,
            "get_split_freq" => Verb::GetSplitFreq,
            "set_split_freq" => Verb::SetSplitFreq,
            "get_split_freq_mode" => Verb::GetSplitFreqMode,
            "set_split_freq_mode" => Verb::SetSplitFreqMode,
            "get_clock" => Verb::GetClock,
            "set_clock" => Verb::SetClock,
            "get_lock_mode" => Verb::GetLockMode,
            "set_lock_mode" => Verb::SetLockMode,
            "send_morse" => Verb::SendMorse,
            "stop_morse" => Verb::StopMorse,
            "wait_morse" => Verb::WaitMorse,
            "send_voice_mem" => Verb::SendVoiceMem,
            "halt" => Verb::Halt,
            "pause" => Verb::Pause,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Levels and functions
// ---------------------------------------------------------------------------

/// The level taxonomy exposed on `l` / `L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelKind {
    RfPower,
    Af,
    Rf,
    Sql,
    MicGain,
    VoxGain,
    Nr,
    Nb,
    MonitorGain,
    Strength,
    Swr,
    Alc,
    Comp,
    KeySpd,
    VoxDelay,
    Bkindl,
    NotchF,
    Agc,
    Att,
    Preamp,
}

impl FromStr for LevelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<LevelKind> {
        Ok(match s.to_uppercase().as_str() {
            "RFPOWER" => LevelKind::RfPower,
            "AF" => LevelKind::Af,
            "RF" => LevelKind::Rf,
            "SQL" => LevelKind::Sql,
            "MICGAIN" => LevelKind::MicGain,
            "VOXGAIN" => LevelKind::VoxGain,
            "NR" => LevelKind::Nr,
            "NB" => LevelKind::Nb,
            "MONITOR_GAIN" => LevelKind::MonitorGain,
            "STRENGTH" | "S" => LevelKind::Strength,
            "SWR" => LevelKind::Swr,
            "ALC" => LevelKind::Alc,
            "COMP" => LevelKind::Comp,
            "KEYSPD" => LevelKind::KeySpd,
            "VOXDELAY" => LevelKind::VoxDelay,
            "BKINDL" => LevelKind::Bkindl,
            "NOTCHF" => LevelKind::NotchF,
            "AGC" => LevelKind::Agc,
            "ATT" => LevelKind::Att,
            "PREAMP" => LevelKind::Preamp,
            _ => return Err(Error::InvalidArgument(format!("unknown level: {s}"))),
        })
    }
}

/// The function taxonomy exposed on `u` / `U`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FuncKind {
    Tuner,
    Lock,
    Comp,
    Vox,
    Tone,
    Tsql,
    Nb,
    Nr,
    Anf,
    Apf,
    Mon,
    Rit,
    Xit,
    Sbkin,
    Fbkin,
}

impl FromStr for FuncKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<FuncKind> {
        Ok(match s.to_uppercase().as_str() {
            "TUNER" => FuncKind::Tuner,
            "LOCK" => FuncKind::Lock,
            "COMP" => FuncKind::Comp,
            "VOX" => FuncKind::Vox,
            "TONE" => FuncKind::Tone,
            "TSQL" => FuncKind::Tsql,
            "NB" => FuncKind::Nb,
            "NR" => FuncKind::Nr,
            "ANF" => FuncKind::Anf,
            "APF" => FuncKind::Apf,
            "MON" | "MN" => FuncKind::Mon,
            "RIT" => FuncKind::Rit,
            "XIT" => FuncKind::Xit,
            "SBKIN" => FuncKind::Sbkin,
            "FBKIN" => FuncKind::Fbkin,
            _ => return Err(Error::InvalidArgument(format!("unknown function: {s}"))),
        })
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Handle one rigctl request line.
///
/// Always produces a reply ending in `\n` (either value lines or an
/// `RPRT` code). A dead serial link additionally sets
/// [`Handled::link_closed`] so the session loop can hang up.
pub async fn handle_line(radio: &Radio, line: &str) -> Handled {
    let line = line.trim();
    if line.is_empty() {
        return Handled::ok(rprt(RPRT_EINVAL));
    }

    let (verb_token, args) = match line.split_once(char::is_whitespace) {
        Some((v, rest)) => (v, rest.trim()),
        None => (line, ""),
    };

    let verb = match Verb::parse(verb_token) {
        Some(v) => v,
        None => {
            debug!(verb = verb_token, "unknown rigctl verb");
            return Handled::ok(rprt(RPRT_EINVAL));
        }
    };

    match dispatch(radio, verb, args).await {
        Ok(response) => Handled::ok(response),
        Err(e) => {
            debug!(?verb, error = %e, "rigctl command failed");
            Handled {
                reply: rprt(rprt_for_error(&e)),
                link_closed: e.is_link_fatal(),
            }
        }
    }
}

async fn dispatch(radio: &Radio, verb: Verb, args: &str) -> Result<String> {
    match verb {
        Verb::GetFreq => {
            let freq = radio.get_frequency(Vfo::Main).await?;
            Ok(format!("{freq}\n"))
        }
        Verb::SetFreq => {
            let freq = parse_freq_arg(args)?;
            radio.set_frequency(Vfo::Main, freq).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetMode => {
            let mode = radio.get_mode(Vfo::Main).await?;
            Ok(format!("{}\n0\n", mode.hamlib_name()))
        }
        Verb::SetMode => {
            let mode = parse_mode_arg(args)?;
            radio.set_mode(Vfo::Main, mode).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetPtt => {
            let ptt = radio.get_ptt().await?;
            Ok(format!("{}\n", ptt as u8))
        }
        Verb::SetPtt => {
            let value: i32 = parse_int_arg(args)?;
            radio.set_ptt(value > 0).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetVfo => {
            let vfo = radio.get_active_vfo().await?;
            Ok(format!("{}\n", vfo.hamlib_name()))
        }
        Verb::SetVfo => {
            let vfo = parse_vfo_arg(args)?;
            radio.set_active_vfo(vfo).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetRit => {
            let rit = radio.get_rit().await?;
            Ok(format!("{rit}\n"))
        }
        Verb::SetRit => {
            let offset: i32 = parse_int_arg(args)?;
            radio.set_rit(offset).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetXit => {
            let xit = radio.get_xit().await?;
            Ok(format!("{xit}\n"))
        }
        Verb::SetXit => {
            let offset: i32 = parse_int_arg(args)?;
            radio.set_xit(offset).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetMem => {
            let channel = radio.get_memory_channel().await?;
            Ok(format!("{channel}\n"))
        }
        Verb::SetMem => {
            let channel: u16 = parse_int_arg(args)?;
            radio.set_memory_channel(channel).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetChannel => {
            let channel: u16 = parse_int_arg(args)?;
            let data = radio.read_channel(channel).await?;
            Ok(format!("{data}\n"))
        }
        // Full memory channel write is not exposed over CAT.
        Verb::SetChannel => Ok(rprt(RPRT_ENAVAIL)),
        Verb::GetCtcssTone => {
            let decihz = radio.get_ctcss_tone_decihz(Vfo::Main).await?;
            Ok(format!("{decihz}\n"))
        }
        Verb::SetCtcssTone => {
            let decihz: u32 = parse_int_arg(args)?;
            radio.set_ctcss_tone_decihz(Vfo::Main, decihz).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetDcsCode => {
            let code = radio.get_dcs_code(Vfo::Main).await?;
            Ok(format!("{code}\n"))
        }
        Verb::SetDcsCode => {
            let code: u16 = parse_int_arg(args)?;
            radio.set_dcs_code(Vfo::Main, code).await?;
            Ok(rprt(RPRT_OK))
        }
        // The radio's actual step is mode-dependent (EX0306 menu item);
        // a fixed 10 Hz keeps clients that poll `n` satisfied.
        Verb::GetTs => Ok("10\n".to_string()),
        Verb::SetTs => Ok(rprt(RPRT_OK)),
        Verb::GetLevel => get_level(radio, args).await,
        Verb::SetLevel => set_level(radio, args).await,
        Verb::GetFunc => get_func(radio, args).await,
        Verb::SetFunc => set_func(radio, args).await,
        Verb::GetSplitVfo => {
            let split = radio.get_split().await?;
            Ok(format!("{}\nVFOB\n", split as u8))
        }
        Verb::SetSplitVfo => {
            let first = args
                .split_whitespace()
                .next()
                .ok_or_else(|| Error::InvalidArgument("missing split argument".into()))?;
            let split: i32 = first
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad split value: {first}")))?;
            radio.set_split(split > 0).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::SendCmd => send_cmd(radio, args).await,
        Verb::GetInfo => Ok(format!("FTX-1 {}\n", radio.head().display_name())),
        Verb::DumpCaps => Ok(dump_caps(radio)),
        Verb::Help => Ok(help_text()),
        Verb::Quit => Ok(rprt(RPRT_OK)),
        Verb::DumpState => Ok(dump_state(radio)),
        // We are connected over CAT, so the radio is on.
        Verb::GetPowerstat => Ok("1\n".to_string()),
        // Remote power control is not possible; accept and ignore.
        Verb::SetPowerstat => Ok(rprt(RPRT_OK)),
        // 0 = targetable VFOA/VFOB mode.
        Verb::ChkVfo => Ok("0\n".to_string()),
        Verb::GetVfoInfo => get_vfo_info(radio, args).await,
        Verb::GetRigInfo => Ok(get_rig_info(radio)),
        Verb::GetSplitMode => {
            let mode = radio.get_mode(Vfo::Sub).await?;
            Ok(format!("{}\n0\n", mode.hamlib_name()))
        }
        Verb::SetSplitMode => {
            let mode = parse_mode_arg(args)?;
            radio.set_mode(Vfo::Sub, mode).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetSplitFreq => {
            let freq = radio.get_frequency(Vfo::Sub).await?;
            Ok(format!("{freq}\n"))
        }
        Verb::SetSplitFreq => {
            let freq = parse_freq_arg(args)?;
            radio.set_frequency(Vfo::Sub, freq).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetSplitFreqMode => {
            let freq = radio.get_frequency(Vfo::Sub).await?;
            let mode = radio.get_mode(Vfo::Sub).await?;
            Ok(format!("{freq}\n{}\n0\n", mode.hamlib_name()))
        }
        Verb::SetSplitFreqMode => {
            let mut parts = args.split_whitespace();
            let freq_str = parts
                .next()
                .ok_or_else(|| Error::InvalidArgument("missing frequency".into()))?;
            let mode_str = parts
                .next()
                .ok_or_else(|| Error::InvalidArgument("missing mode".into()))?;
            let freq = parse_freq_arg(freq_str)?;
            let mode = Mode::from_hamlib(mode_str)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown mode: {mode_str}")))?;
            radio.set_frequency(Vfo::Sub, freq).await?;
            radio.set_mode(Vfo::Sub, mode).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::GetClock => Ok(format!("{}\n", utc_now_iso8601())),
        // The radio clock is not settable over CAT; accept and ignore.
        Verb::SetClock => Ok(rprt(RPRT_OK)),
        Verb::GetLockMode => {
            let locked = radio.get_lock().await?;
            Ok(format!("{}\n", locked as u8))
        }
        Verb::SetLockMode => {
            let value: i32 = parse_int_arg(args)?;
            radio.set_lock(value > 0).await?;
            Ok(rprt(RPRT_OK))
        }
        Verb::SendMorse => {
            if args.is_empty() {
                return Err(Error::InvalidArgument("missing morse text".into()));
            }
            match radio.send_morse(args).await {
                Ok(()) => Ok(rprt(RPRT_OK)),
                Err(_) => Ok(rprt(RPRT_ENAVAIL)),
            }
        }
        Verb::StopMorse => match radio.stop_morse().await {
            Ok(()) => Ok(rprt(RPRT_OK)),
            Err(_) => Ok(rprt(RPRT_ENAVAIL)),
        },
        Verb::WaitMorse => Ok(rprt(RPRT_OK)),
        Verb::SendVoiceMem => {
            let slot: u8 = parse_int_arg(args)?;
            match radio.play_voice_memory(slot).await {
                Ok(()) => Ok(rprt(RPRT_OK)),
                Err(Error::InvalidArgument(msg)) => Err(Error::InvalidArgument(msg)),
                Err(_) => Ok(rprt(RPRT_ENAVAIL)),
            }
        }
        Verb::Halt => {
            // Emergency stop: drop out of transmit, best effort.
            let _ = radio.set_ptt(false).await;
            Ok(rprt(RPRT_OK))
        }
        Verb::Pause => {
            if !args.is_empty() {
                let ms: u64 = parse_int_arg(args)?;
                tokio::time::sleep(Duration::from_millis(ms.min(5000))).await;
            }
            Ok(rprt(RPRT_OK))
        }
    }
}

// ---------------------------------------------------------------------------
// Argument parsing helpers
// ---------------------------------------------------------------------------

/// Parse a frequency argument. Clients send floating point
/// (`28074055.000000`); the wire value is integer hertz, rounded.
fn parse_freq_arg(args: &str) -> Result<u64> {
    let token = args
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing frequency".into()))?;
    let value: f64 = token
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("bad frequency: {token}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidArgument(format!("bad frequency: {token}")));
    }
    Ok(value.round() as u64)
}

fn parse_mode_arg(args: &str) -> Result<Mode> {
    let token = args
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing mode".into()))?;
    Mode::from_hamlib(token)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown mode: {token}")))
}

fn parse_vfo_arg(args: &str) -> Result<Vfo> {
    let token = args
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing VFO".into()))?;
    token
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("unknown VFO: {token}")))
}

fn parse_int_arg<T: FromStr>(args: &str) -> Result<T> {
    let token = args
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing argument".into()))?;
    token
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("bad number: {token}")))
}

fn parse_float_arg(token: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("bad number: {token}")))
}

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Convert a raw S-meter reading (0-255) to dB relative to S9.
///
/// Reading 120 corresponds to S9; 0..120 spans S0..S9 (six S-units of
/// ~6 dB each below S9), 120..255 spans S9..S9+60.
fn s_meter_to_db(raw: u16) -> i32 {
    let raw = raw as f64;
    let db = if raw <= 120.0 {
        (raw / 120.0) * 54.0 - 54.0
    } else {
        (raw - 120.0) / 135.0 * 60.0
    };
    db.round() as i32
}

async fn get_level(radio: &Radio, args: &str) -> Result<String> {
    let name = args
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing level name".into()))?;
    let level: LevelKind = name.parse()?;

    let out = match level {
        LevelKind::RfPower => {
            let watts = radio.get_power().await?;
            format!("{:.2}\n", watts / radio.max_power_watts())
        }
        LevelKind::Af => {
            let raw = radio.get_af_gain(Vfo::Main).await?;
            format!("{:.2}\n", raw as f64 / 255.0)
        }
        LevelKind::Rf => {
            let raw = radio.get_rf_gain(Vfo::Main).await?;
            format!("{:.2}\n", raw as f64 / 255.0)
        }
        LevelKind::Sql => {
            let raw = radio.get_squelch(Vfo::Main).await?;
            format!("{:.2}\n", raw as f64 / 100.0)
        }
        LevelKind::MicGain => {
            let raw = radio.get_mic_gain().await?;
            format!("{:.2}\n", raw as f64 / 100.0)
        }
        LevelKind::VoxGain => {
            let raw = radio.get_vox_gain().await?;
            format!("{:.2}\n", raw as f64 / 100.0)
        }
        LevelKind::Nr => {
            let raw = radio.get_nr_level(Vfo::Main).await?;
            format!("{:.2}\n", raw as f64 / 15.0)
        }
        LevelKind::Nb => {
            let raw = radio.get_nb_level(Vfo::Main).await?;
            format!("{:.2}\n", raw as f64 / 15.0)
        }
        LevelKind::MonitorGain => {
            let raw = radio.get_monitor_level().await?;
            format!("{:.2}\n", raw as f64 / 100.0)
        }
        LevelKind::Strength => {
            let raw = radio.read_s_meter(Vfo::Main).await?;
            format!("{}\n", s_meter_to_db(raw))
        }
        LevelKind::Swr => {
            let raw = radio.read_meter(MeterKind::Swr).await?;
            format!("{:.1}\n", raw as f64 / 10.0)
        }
        LevelKind::Alc => {
            let raw = radio.read_meter(MeterKind::Alc).await?;
            format!("{raw}\n")
        }
        LevelKind::Comp => {
            let raw = radio.read_meter(MeterKind::Comp).await?;
            format!("{raw}\n")
        }
        LevelKind::KeySpd => {
            let wpm = radio.get_keyer_speed().await?;
            format!("{wpm}\n")
        }
        LevelKind::VoxDelay => {
            let ms = radio.get_vox_delay().await?;
            format!("{ms}\n")
        }
        LevelKind::Bkindl => {
            let ms = radio.get_break_in_delay().await?;
            format!("{ms}\n")
        }
        LevelKind::NotchF => {
            let hz = radio.get_notch_freq(Vfo::Main).await?;
            format!("{hz}\n")
        }
        LevelKind::Agc => {
            let agc = radio.get_agc(Vfo::Main).await?;
            format!("{}\n", agc.raw())
        }
        LevelKind::Att => {
            let on = radio.get_attenuator(Vfo::Main).await?;
            format!("{}\n", if on { 12 } else { 0 })
        }
        LevelKind::Preamp => {
            let raw = radio.get_preamp(Vfo::Main).await?;
            format!("{}\n", raw * 10)
        }
    };
    Ok(out)
}

async fn set_level(radio: &Radio, args: &str) -> Result<String> {
    let mut parts = args.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing level name".into()))?;
    let value = parts
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing level value".into()))?;
    let level: LevelKind = name.parse()?;

    match level {
        LevelKind::RfPower => {
            let norm = parse_float_arg(value)?;
            let watts = norm * radio.max_power_watts();
            radio.set_power(watts.max(radio.head().min_power_watts())).await?;
        }
        LevelKind::Af => {
            let norm = parse_float_arg(value)?;
            radio.set_af_gain(Vfo::Main, scale_norm(norm, 255.0)?).await?;
        }
        LevelKind::Rf => {
            let norm = parse_float_arg(value)?;
            radio.set_rf_gain(Vfo::Main, scale_norm(norm, 255.0)?).await?;
        }
        LevelKind::Sql => {
            let norm = parse_float_arg(value)?;
            radio.set_squelch(Vfo::Main, scale_norm(norm, 100.0)?).await?;
        }
        LevelKind::MicGain => {
            let norm = parse_float_arg(value)?;
            radio.set_mic_gain(scale_norm(norm, 100.0)?).await?;
        }
        LevelKind::VoxGain => {
            let norm = parse_float_arg(value)?;
            radio.set_vox_gain(scale_norm(norm, 100.0)?).await?;
        }
        LevelKind::Nr => {
            let norm = parse_float_arg(value)?;
            radio.set_nr_level(Vfo::Main, scale_norm(norm, 15.0)?).await?;
        }
        LevelKind::Nb => {
            let norm = parse_float_arg(value)?;
            radio.set_nb_level(Vfo::Main, scale_norm(norm, 15.0)?).await?;
        }
        LevelKind::MonitorGain => {
            let norm = parse_float_arg(value)?;
            radio.set_monitor_level(scale_norm(norm, 100.0)?).await?;
        }
        LevelKind::KeySpd => {
            let wpm: u8 = value
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad speed: {value}")))?;
            radio.set_keyer_speed(wpm).await?;
        }
        LevelKind::VoxDelay => {
            let ms: u16 = value
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad delay: {value}")))?;
            radio.set_vox_delay(ms).await?;
        }
        LevelKind::Bkindl => {
            let ms: u16 = value
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad delay: {value}")))?;
            radio.set_break_in_delay(ms).await?;
        }
        LevelKind::NotchF => {
            let hz: u16 = value
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad frequency: {value}")))?;
            radio.set_notch_freq(Vfo::Main, hz).await?;
        }
        LevelKind::Agc => {
            let raw: u8 = value
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad AGC value: {value}")))?;
            let agc = AgcMode::from_raw(raw)
                .ok_or_else(|| Error::InvalidArgument(format!("bad AGC value: {value}")))?;
            radio.set_agc(Vfo::Main, agc).await?;
        }
        LevelKind::Att => {
            let db: i32 = value
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad attenuation: {value}")))?;
            radio.set_attenuator(Vfo::Main, db > 0).await?;
        }
        LevelKind::Preamp => {
            let db: u8 = value
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("bad preamp: {value}")))?;
            radio.set_preamp(Vfo::Main, db / 10).await?;
        }
        LevelKind::Strength | LevelKind::Swr | LevelKind::Alc | LevelKind::Comp => {
            return Err(Error::InvalidArgument(format!(
                "level {name} is read-only"
            )));
        }
    }
    Ok(rprt(RPRT_OK))
}

/// Scale a normalized `[0.0, 1.0]` value to a raw integer range.
fn scale_norm(norm: f64, max: f64) -> Result<u8> {
    if !(0.0..=1.0).contains(&norm) {
        return Err(Error::InvalidArgument(format!(
            "value {norm} outside [0.0, 1.0]"
        )));
    }
    Ok((norm * max).round() as u8)
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

async fn get_func(radio: &Radio, args: &str) -> Result<String> {
    let name = args
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing function name".into()))?;
    let func: FuncKind = name.parse()?;

    let on = match func {
        FuncKind::Tuner => radio.get_tuner().await?,
        FuncKind::Lock => radio.get_lock().await?,
        FuncKind::Comp => radio.get_processor().await?,
        FuncKind::Vox => radio.get_vox().await?,
        FuncKind::Tone => radio.get_ctcss_mode(Vfo::Main).await? == 1,
        FuncKind::Tsql => radio.get_ctcss_mode(Vfo::Main).await? == 2,
        FuncKind::Nb => radio.get_nb(Vfo::Main).await?,
        FuncKind::Nr => radio.get_nr(Vfo::Main).await?,
        FuncKind::Anf => radio.get_auto_notch(Vfo::Main).await?,
        FuncKind::Apf => radio.get_apf(Vfo::Main).await?,
        FuncKind::Mon => radio.get_monitor_level().await? > 0,
        FuncKind::Rit => radio.get_rit().await? != 0,
        FuncKind::Xit => radio.get_xit().await? != 0,
        FuncKind::Sbkin => radio.get_break_in().await?,
        FuncKind::Fbkin => {
            return Err(Error::NotAvailable("full break-in not controllable".into()));
        }
    };
    Ok(format!("{}\n", on as u8))
}

async fn set_func(radio: &Radio, args: &str) -> Result<String> {
    let mut parts = args.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing function name".into()))?;
    let value = parts
        .next()
        .ok_or_else(|| Error::InvalidArgument("missing function value".into()))?;
    let func: FuncKind = name.parse()?;
    let on = value
        .parse::<i32>()
        .map_err(|_| Error::InvalidArgument(format!("bad value: {value}")))?
        > 0;

    match func {
        FuncKind::Tuner => radio.set_tuner(on).await?,
        FuncKind::Lock => radio.set_lock(on).await?,
        FuncKind::Comp => radio.set_processor(on).await?,
        FuncKind::Vox => radio.set_vox(on).await?,
        FuncKind::Tone => radio.set_ctcss_mode(Vfo::Main, if on { 1 } else { 0 }).await?,
        FuncKind::Tsql => radio.set_ctcss_mode(Vfo::Main, if on { 2 } else { 0 }).await?,
        // No clean 0/1 on the radio side: mid-scale when enabling.
        FuncKind::Nb => radio.set_nb_level(Vfo::Main, if on { 8 } else { 0 }).await?,
        FuncKind::Nr => radio.set_nr_level(Vfo::Main, if on { 8 } else { 0 }).await?,
        FuncKind::Anf => radio.set_auto_notch(Vfo::Main, on).await?,
        FuncKind::Apf => radio.set_apf(Vfo::Main, on).await?,
        FuncKind::Mon => radio.set_monitor_level(if on { 50 } else { 0 }).await?,
        // Off clears the offset; on is a no-op (the offset itself is the
        // enable on this firmware).
        FuncKind::Rit => {
            if !on {
                radio.set_rit(0).await?;
            }
        }
        FuncKind::Xit => {
            if !on {
                radio.set_xit(0).await?;
            }
        }
        FuncKind::Sbkin => radio.set_break_in(on).await?,
        FuncKind::Fbkin => {
            return Err(Error::NotAvailable("full break-in not controllable".into()));
        }
    }
    Ok(rprt(RPRT_OK))
}

// ---------------------------------------------------------------------------
// Raw passthrough
// ---------------------------------------------------------------------------

async fn send_cmd(radio: &Radio, args: &str) -> Result<String> {
    if args.is_empty() {
        return Err(Error::InvalidArgument("missing CAT command".into()));
    }

    let mut cmd = args.trim();
    if cmd.starts_with('"') && cmd.ends_with('"') && cmd.len() >= 2 {
        cmd = &cmd[1..cmd.len() - 1];
    }
    // Normalize: the link appends the terminator itself.
    let cmd = cmd.strip_suffix(';').unwrap_or(cmd);

    let response = radio.send_raw(cmd).await?;
    Ok(format!("{response}\n"))
}

// ---------------------------------------------------------------------------
// Info / capability dumps
// ---------------------------------------------------------------------------

fn dump_caps(radio: &Radio) -> String {
    let head = radio.head();
    let mut out = String::with_capacity(512);
    out.push_str("Caps dump for model: 1051\n");
    out.push_str("Model name:\tFTX-1\n");
    out.push_str("Mfg name:\tYaesu\n");
    out.push_str("Backend version:\t1.0\n");
    out.push_str("Backend status:\tBeta\n");
    out.push_str("Rig type:\tTransceiver\n");
    out.push_str("PTT type:\tRig capable\n");
    out.push_str("Port type:\tRS-232\n");
    out.push_str("Serial speed:\t38400\n");
    out.push_str(&format!("Head type:\t{}\n", head.display_name()));
    out.push_str(&format!("Min power:\t{}W\n", head.min_power_watts()));
    out.push_str(&format!("Max power:\t{}W\n", head.max_power_watts()));
    out.push_str(&format!(
        "Has tuner:\t{}\n",
        if head.has_internal_tuner() { "Y" } else { "N" }
    ));
    out
}

fn get_rig_info(radio: &Radio) -> String {
    let head = radio.head();
    format!(
        "Model=FTX-1\nMfg=Yaesu\nHeadType={}\nMinPower={}\nMaxPower={}\nHasTuner={}\n",
        head.display_name(),
        head.min_power_watts(),
        head.max_power_watts(),
        head.has_internal_tuner() as u8,
    )
}

async fn get_vfo_info(radio: &Radio, args: &str) -> Result<String> {
    let vfo = match args.split_whitespace().next() {
        Some(token) => token.parse().unwrap_or(Vfo::Main),
        None => Vfo::Main,
    };
    let freq = radio.get_frequency(vfo).await?;
    let mode = radio.get_mode(vfo).await?;
    Ok(format!(
        "Freq={freq}\nMode={}\nWidth=0\nVFO={}\n",
        mode.hamlib_name(),
        vfo.hamlib_name(),
    ))
}

/// The `dump_state` capability block WSJT-X parses at connect.
///
/// Structure: protocol version, rig model, ITU region, RX ranges, TX
/// ranges (power limits in milliwatts from the detected head), tuning
/// steps, filters, RIT/XIT/IF-shift maxima, announces, preamp and
/// attenuator lists, and the has_get/set func/level/parm bitmasks.
fn dump_state(radio: &Radio) -> String {
    let head = radio.head();
    const ALL_MODES: u32 = 0x8ff;
    const VFO_MASK: u32 = 0x3;
    const ANT_MASK: u32 = 0x1;
    let min_freq: u64 = 1_800_000;
    let max_freq: u64 = 54_000_000;

    let mut out = String::with_capacity(512);
    // Protocol version and rig model.
    out.push_str("0\n");
    out.push_str("1051\n");
    // ITU region (0 = any).
    out.push_str("0\n");
    // RX ranges: start end modes low_power high_power vfo ant.
    out.push_str(&format!(
        "{min_freq} {max_freq} 0x{ALL_MODES:x} -1 -1 0x{VFO_MASK:x} 0x{ANT_MASK:x}\n"
    ));
    out.push_str("0 0 0 0 0 0 0\n");
    // TX ranges with head-dependent power limits in milliwatts.
    out.push_str(&format!(
        "{min_freq} {max_freq} 0x{ALL_MODES:x} {} {} 0x{VFO_MASK:x} 0x{ANT_MASK:x}\n",
        head.min_power_milliwatts(),
        head.max_power_milliwatts(),
    ));
    out.push_str("0 0 0 0 0 0 0\n");
    // Tuning steps.
    out.push_str(&format!("0x{ALL_MODES:x} 1\n"));
    out.push_str(&format!("0x{ALL_MODES:x} 10\n"));
    out.push_str(&format!("0x{ALL_MODES:x} 100\n"));
    out.push_str(&format!("0x{ALL_MODES:x} 1000\n"));
    out.push_str("0 0\n");
    // Filters.
    out.push_str("0x3 2400\n");
    out.push_str("0xc 500\n");
    out.push_str("0x20 6000\n");
    out.push_str("0x40 12000\n");
    out.push_str("0 0\n");
    // Max RIT, XIT, IF shift.
    out.push_str("9999\n");
    out.push_str("9999\n");
    out.push_str("0\n");
    // Announces.
    out.push_str("0\n");
    // Preamp and attenuator lists.
    out.push_str("0\n");
    out.push_str("0\n");
    // has_get_func / has_set_func.
    out.push_str("0x0\n");
    out.push_str("0x0\n");
    // has_get_level: STRENGTH | RFPOWER | SWR.
    out.push_str(&format!("0x{:x}\n", 0x4u32 | 0x8 | 0x1000));
    // has_set_level: RFPOWER.
    out.push_str("0x8\n");
    // has_get_parm / has_set_parm.
    out.push_str("0\n");
    out.push_str("0\n");
    out
}

fn help_text() -> String {
    let mut out = String::new();
    out.push_str("Commands:\n");
    out.push_str("  f, get_freq          Get frequency (Hz)\n");
    out.push_str("  F, set_freq FREQ     Set frequency (Hz)\n");
    out.push_str("  m, get_mode          Get mode and passband\n");
    out.push_str("  M, set_mode MODE PB  Set mode and passband\n");
    out.push_str("  t, get_ptt           Get PTT status (0/1)\n");
    out.push_str("  T, set_ptt 0|1       Set PTT\n");
    out.push_str("  v, get_vfo           Get current VFO\n");
    out.push_str("  V, set_vfo VFOA|VFOB Set VFO\n");
    out.push_str("  j, get_rit           Get RIT offset (Hz)\n");
    out.push_str("  J, set_rit OFFSET    Set RIT offset (Hz)\n");
    out.push_str("  z, get_xit           Get XIT offset (Hz)\n");
    out.push_str("  Z, set_xit OFFSET    Set XIT offset (Hz)\n");
    out.push_str("  e, get_mem           Get memory channel\n");
    out.push_str("  E, set_mem CH        Set memory channel\n");
    out.push_str("  h, get_channel CH    Get channel data\n");
    out.push_str("  c, get_ctcss_tone    Get CTCSS tone (deci-Hz)\n");
    out.push_str("  C, set_ctcss_tone    Set CTCSS tone (deci-Hz)\n");
    out.push_str("  d, get_dcs_code      Get DCS code\n");
    out.push_str("  D, set_dcs_code      Set DCS code\n");
    out.push_str("  n, get_ts            Get tuning step\n");
    out.push_str("  N, set_ts STEP       Set tuning step\n");
    out.push_str("  s, get_split_vfo     Get split status\n");
    out.push_str("  S, set_split_vfo 0|1 Set split\n");
    out.push_str("  l, get_level LEVEL   Get level (RFPOWER, AF, SQL, STRENGTH, SWR)\n");
    out.push_str("  L, set_level LVL VAL Set level\n");
    out.push_str("  u, get_func FUNC     Get function (LOCK, COMP, VOX, ...)\n");
    out.push_str("  U, set_func FUNC 0|1 Set function\n");
    out.push_str("  w, send_cmd CMD      Send raw CAT command\n");
    out.push_str("  _, get_info          Get rig info\n");
    out.push_str("  1, dump_caps         Dump capabilities\n");
    out.push_str("  q, quit              Exit\n");
    out
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Current UTC time as ISO-8601 (`YYYY-MM-DDTHH:MM:SSZ`), computed from
/// the system clock without a calendar dependency.
fn utc_now_iso8601() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format_epoch_iso8601(secs)
}

fn format_epoch_iso8601(secs: u64) -> String {
    let days = (secs / 86_400) as i64;
    let tod = secs % 86_400;
    let (h, m, s) = (tod / 3600, (tod % 3600) / 60, tod % 60);

    // Civil-from-days (Howard Hinnant's algorithm), valid for the Unix era.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!("{year:04}-{month:02}-{d:02}T{h:02}:{m:02}:{s:02}Z")
}
