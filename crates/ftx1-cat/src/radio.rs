//! `Radio` -- the typed FTX-1 facade over the CAT link.
//!
//! This module ties the command builders and parsers to a [`CatLink`] to
//! produce the high-level radio API consumed by the rigctld front end. It
//! owns head-type detection (run once at connect) and applies head-specific
//! parameter formatting, most visibly for transmit power.
//!
//! All methods take `&self`; per-command exclusivity on the serial line is
//! provided by the link's command channel. Callers that need a multi-command
//! sequence to appear atomic across clients (the rigctld sessions) serialize
//! whole requests behind one `tokio::sync::Mutex<Radio>`.

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use ftx1_core::error::{Error, Result};
use ftx1_core::types::{AgcMode, HeadType, MeterKind, Mode, Vfo};

use crate::commands;
use crate::link::CatLink;
use crate::protocol::CatFrame;

/// A connected FTX-1.
#[derive(Debug)]
pub struct Radio {
    link: CatLink,
    head: HeadType,
}

impl Radio {
    /// Connect: verify the radio identity and detect the head type.
    ///
    /// Detection sequence:
    /// 1. `ID;` must answer `0840` (all FTX-1 variants).
    /// 2. `PC;` -- the first payload digit is `1` for a Field head and `2`
    ///    for the Optima/SPA-1.
    /// 3. Field heads only: probe the power source with `PC10.8;`. The
    ///    battery supply rejects it with `?;` (0.5-6 W range); external
    ///    12 V accepts it (0.5-10 W range). The prior power setting is
    ///    restored either way.
    pub async fn detect(link: CatLink) -> Result<Radio> {
        let id = link.transact(commands::cmd_read_id()).await?;
        commands::parse_id_response(&id.data)?;

        let pc = link.transact(commands::cmd_read_power()).await?;
        let payload = pc.data;
        let power_portion = payload.get(1..).unwrap_or("").to_string();

        let head = match payload.chars().next() {
            Some('1') => {
                let head = probe_field_power_source(&link).await?;
                // Restore whatever power was set before the probe.
                if !power_portion.is_empty() {
                    link.send(commands::cmd_restore_power(&power_portion))
                        .await?;
                }
                head
            }
            Some('2') => HeadType::Optima,
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected PC head digit: {other:?}"
                )));
            }
        };

        info!(head = %head, "FTX-1 connected");
        Ok(Radio { link, head })
    }

    /// Build a radio with a known head type, skipping detection.
    ///
    /// Used by tests and by tooling that already knows the configuration.
    pub fn with_head(link: CatLink, head: HeadType) -> Radio {
        Radio { link, head }
    }

    /// The detected head configuration.
    pub fn head(&self) -> HeadType {
        self.head
    }

    /// Maximum transmit power for the detected head, in watts.
    pub fn max_power_watts(&self) -> f64 {
        self.head.max_power_watts()
    }

    /// Subscribe to unsolicited AI frames.
    pub fn subscribe_ai(&self) -> broadcast::Receiver<CatFrame> {
        self.link.subscribe()
    }

    /// Watch that flips to `true` when the serial link is lost. Sessions
    /// use it to close even when they are idle at the moment of failure.
    pub fn link_down(&self) -> watch::Receiver<bool> {
        self.link.link_down()
    }

    /// Enable AI mode (the radio pushes state changes unsolicited).
    pub async fn enable_auto_info(&self) -> Result<()> {
        self.link.enable_auto_info().await
    }

    /// Disable AI mode.
    pub async fn disable_auto_info(&self) -> Result<()> {
        self.link.disable_auto_info().await
    }

    /// Raw CAT passthrough for the rigctl `w` verb.
    pub async fn send_raw(&self, text: &str) -> Result<String> {
        self.link.send_raw(text).await
    }

    // -----------------------------------------------------------------
    // Frequency / mode / PTT / VFO / split
    // -----------------------------------------------------------------

    /// Read a VFO frequency in hertz.
    pub async fn get_frequency(&self, vfo: Vfo) -> Result<u64> {
        let frame = self.link.transact(commands::cmd_read_frequency(vfo)).await?;
        commands::parse_frequency_response(&frame.data)
    }

    /// Set a VFO frequency in hertz.
    pub async fn set_frequency(&self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        if freq_hz > 999_999_999 {
            return Err(Error::InvalidArgument(format!(
                "frequency {freq_hz} Hz exceeds 9 digits"
            )));
        }
        debug!(%vfo, freq_hz, "setting frequency");
        self.link.send(commands::cmd_set_frequency(vfo, freq_hz)).await
    }

    /// Read a VFO operating mode.
    pub async fn get_mode(&self, vfo: Vfo) -> Result<Mode> {
        let frame = self.link.transact(commands::cmd_read_mode(vfo)).await?;
        commands::parse_mode_response(&frame.data)
    }

    /// Set a VFO operating mode.
    pub async fn set_mode(&self, vfo: Vfo, mode: Mode) -> Result<()> {
        debug!(%vfo, %mode, "setting mode");
        self.link.send(commands::cmd_set_mode(vfo, mode)).await
    }

    /// Read the PTT state (`true` while transmitting).
    pub async fn get_ptt(&self) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_ptt()).await?;
        commands::parse_ptt_response(&frame.data)
    }

    /// Key or unkey the transmitter.
    pub async fn set_ptt(&self, on: bool) -> Result<()> {
        debug!(on, "setting PTT");
        self.link.send(commands::cmd_set_ptt(on)).await
    }

    /// Read the active VFO.
    pub async fn get_active_vfo(&self) -> Result<Vfo> {
        let frame = self.link.transact(commands::cmd_read_active_vfo()).await?;
        commands::parse_active_vfo_response(&frame.data)
    }

    /// Select the active VFO.
    pub async fn set_active_vfo(&self, vfo: Vfo) -> Result<()> {
        debug!(%vfo, "selecting VFO");
        self.link.send(commands::cmd_set_active_vfo(vfo)).await
    }

    /// Read the split state.
    pub async fn get_split(&self) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_split()).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Enable or disable split operation (TX on VFO-B).
    pub async fn set_split(&self, on: bool) -> Result<()> {
        debug!(on, "setting split");
        self.link.send(commands::cmd_set_split(on)).await
    }

    // -----------------------------------------------------------------
    // Power
    // -----------------------------------------------------------------

    /// Read the transmit power setting in watts.
    pub async fn get_power(&self) -> Result<f64> {
        let frame = self.link.transact(commands::cmd_read_power()).await?;
        // The PC payload leads with the head discriminator digit.
        let power = frame.data.get(1..).unwrap_or("");
        commands::parse_power_response(power)
    }

    /// Set the transmit power in watts, validated against the head range.
    pub async fn set_power(&self, watts: f64) -> Result<()> {
        let min = self.head.min_power_watts();
        let max = self.head.max_power_watts();
        if !(min..=max).contains(&watts) {
            return Err(Error::InvalidArgument(format!(
                "power {watts} W out of range {min}-{max} W"
            )));
        }
        debug!(watts, head = %self.head, "setting power");
        self.link.send(commands::cmd_set_power(self.head, watts)).await
    }

    // -----------------------------------------------------------------
    // RIT / XIT
    // -----------------------------------------------------------------

    /// Read the RIT offset in hertz.
    pub async fn get_rit(&self) -> Result<i32> {
        let frame = self.link.transact(commands::cmd_read_rit()).await?;
        commands::parse_offset_response(&frame.data)
    }

    /// Set the RIT offset in hertz (`RC`; the firmware rejects `RT`).
    pub async fn set_rit(&self, offset_hz: i32) -> Result<()> {
        debug!(offset_hz, "setting RIT");
        self.link.send(commands::cmd_set_rit(offset_hz)).await
    }

    /// Read the XIT offset in hertz.
    pub async fn get_xit(&self) -> Result<i32> {
        let frame = self.link.transact(commands::cmd_read_xit()).await?;
        commands::parse_offset_response(&frame.data)
    }

    /// Set the XIT offset in hertz (`TC`; the firmware rejects `XT`).
    pub async fn set_xit(&self, offset_hz: i32) -> Result<()> {
        debug!(offset_hz, "setting XIT");
        self.link.send(commands::cmd_set_xit(offset_hz)).await
    }

    // -----------------------------------------------------------------
    // AGC / meters
    // -----------------------------------------------------------------

    /// Read the AGC mode.
    pub async fn get_agc(&self, vfo: Vfo) -> Result<AgcMode> {
        let frame = self.link.transact(commands::cmd_read_agc(vfo)).await?;
        commands::parse_agc_response(&frame.data)
    }

    /// Set the AGC mode.
    pub async fn set_agc(&self, vfo: Vfo, agc: AgcMode) -> Result<()> {
        self.link.send(commands::cmd_set_agc(vfo, agc)).await
    }

    /// Read a transmit meter (raw 0-255).
    pub async fn read_meter(&self, kind: MeterKind) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_meter(kind)).await?;
        commands::parse_meter_response(&frame.data)
    }

    /// Read the S-meter (raw 0-255).
    pub async fn read_s_meter(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_s_meter(vfo)).await?;
        commands::parse_meter_response(&frame.data)
    }

    // -----------------------------------------------------------------
    // Gains and levels
    // -----------------------------------------------------------------

    /// Read the AF gain (raw 0-255).
    pub async fn get_af_gain(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_af_gain(vfo)).await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Set the AF gain (raw 0-255).
    pub async fn set_af_gain(&self, vfo: Vfo, raw: u8) -> Result<()> {
        self.link.send(commands::cmd_set_af_gain(vfo, raw)).await
    }

    /// Read the RF gain (raw 0-255).
    pub async fn get_rf_gain(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_rf_gain(vfo)).await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Set the RF gain (raw 0-255).
    pub async fn set_rf_gain(&self, vfo: Vfo, raw: u8) -> Result<()> {
        self.link.send(commands::cmd_set_rf_gain(vfo, raw)).await
    }

    /// Read the squelch level (raw 0-100).
    pub async fn get_squelch(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_squelch(vfo)).await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Set the squelch level (raw 0-100).
    pub async fn set_squelch(&self, vfo: Vfo, raw: u8) -> Result<()> {
        self.link.send(commands::cmd_set_squelch(vfo, raw)).await
    }

    /// Read the mic gain (raw 0-100).
    pub async fn get_mic_gain(&self) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_mic_gain()).await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Set the mic gain (raw 0-100).
    pub async fn set_mic_gain(&self, raw: u8) -> Result<()> {
        self.link.send(commands::cmd_set_mic_gain(raw)).await
    }

    /// Read the CW keyer speed in WPM.
    pub async fn get_keyer_speed(&self) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_keyer_speed()).await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Set the CW keyer speed in WPM.
    pub async fn set_keyer_speed(&self, wpm: u8) -> Result<()> {
        self.link.send(commands::cmd_set_keyer_speed(wpm)).await
    }

    /// Read the VOX gain (raw 0-100).
    pub async fn get_vox_gain(&self) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_vox_gain()).await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Set the VOX gain (raw 0-100).
    pub async fn set_vox_gain(&self, raw: u8) -> Result<()> {
        self.link.send(commands::cmd_set_vox_gain(raw)).await
    }

    /// Read the VOX delay in milliseconds.
    pub async fn get_vox_delay(&self) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_vox_delay()).await?;
        commands::parse_numeric_response(&frame.data, 4)
    }

    /// Set the VOX delay in milliseconds.
    pub async fn set_vox_delay(&self, ms: u16) -> Result<()> {
        self.link.send(commands::cmd_set_vox_delay(ms)).await
    }

    /// Read the CW break-in delay in milliseconds.
    pub async fn get_break_in_delay(&self) -> Result<u16> {
        let frame = self
            .link
            .transact(commands::cmd_read_break_in_delay())
            .await?;
        commands::parse_numeric_response(&frame.data, 4)
    }

    /// Set the CW break-in delay in milliseconds.
    pub async fn set_break_in_delay(&self, ms: u16) -> Result<()> {
        self.link.send(commands::cmd_set_break_in_delay(ms)).await
    }

    /// Read the noise-reduction level (0-15).
    pub async fn get_nr_level(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_nr_level(vfo)).await?;
        commands::parse_numeric_response(&frame.data, 2)
    }

    /// Set the noise-reduction level (0-15).
    pub async fn set_nr_level(&self, vfo: Vfo, level: u8) -> Result<()> {
        self.link.send(commands::cmd_set_nr_level(vfo, level)).await
    }

    /// Read the noise-blanker level (0-15).
    pub async fn get_nb_level(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_nb_level(vfo)).await?;
        commands::parse_numeric_response(&frame.data, 2)
    }

    /// Set the noise-blanker level (0-15).
    pub async fn set_nb_level(&self, vfo: Vfo, level: u8) -> Result<()> {
        self.link.send(commands::cmd_set_nb_level(vfo, level)).await
    }

    /// Read the TX monitor level (0-100).
    pub async fn get_monitor_level(&self) -> Result<u16> {
        let frame = self
            .link
            .transact(commands::cmd_read_monitor_level())
            .await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Set the TX monitor level (0-100).
    pub async fn set_monitor_level(&self, raw: u8) -> Result<()> {
        self.link.send(commands::cmd_set_monitor_level(raw)).await
    }

    /// Read the manual notch frequency in hertz.
    pub async fn get_notch_freq(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_notch_freq(vfo)).await?;
        commands::parse_notch_freq_response(&frame.data)
    }

    /// Set the manual notch frequency in hertz (10 Hz steps).
    pub async fn set_notch_freq(&self, vfo: Vfo, hz: u16) -> Result<()> {
        self.link.send(commands::cmd_set_notch_freq(vfo, hz)).await
    }

    /// Read the preamp setting (0 = IPO, 1 = AMP1, 2 = AMP2).
    pub async fn get_preamp(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_preamp(vfo)).await?;
        commands::parse_numeric_response(&frame.data, 1)
    }

    /// Set the preamp (0 = IPO, 1 = AMP1, 2 = AMP2).
    pub async fn set_preamp(&self, vfo: Vfo, level: u8) -> Result<()> {
        if level > 2 {
            return Err(Error::InvalidArgument(format!(
                "preamp level {level} out of range 0-2"
            )));
        }
        self.link.send(commands::cmd_set_preamp(vfo, level)).await
    }

    /// Read the attenuator state (12 dB pad).
    pub async fn get_attenuator(&self, vfo: Vfo) -> Result<bool> {
        let frame = self
            .link
            .transact(commands::cmd_read_attenuator(vfo))
            .await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Set the attenuator state.
    pub async fn set_attenuator(&self, vfo: Vfo, on: bool) -> Result<()> {
        self.link.send(commands::cmd_set_attenuator(vfo, on)).await
    }

    // -----------------------------------------------------------------
    // On/off functions
    // -----------------------------------------------------------------

    /// Read the noise blanker on/off state.
    pub async fn get_nb(&self, vfo: Vfo) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_nb(vfo)).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Read the noise reduction on/off state.
    pub async fn get_nr(&self, vfo: Vfo) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_nr(vfo)).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Read the auto-notch on/off state.
    pub async fn get_auto_notch(&self, vfo: Vfo) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_auto_notch(vfo)).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Set the auto-notch on/off state.
    pub async fn set_auto_notch(&self, vfo: Vfo, on: bool) -> Result<()> {
        self.link.send(commands::cmd_set_auto_notch(vfo, on)).await
    }

    /// Read the audio peak filter on/off state.
    pub async fn get_apf(&self, vfo: Vfo) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_apf(vfo)).await?;
        commands::parse_apf_response(&frame.data)
    }

    /// Set the audio peak filter on/off state.
    pub async fn set_apf(&self, vfo: Vfo, on: bool) -> Result<()> {
        self.link.send(commands::cmd_set_apf(vfo, on)).await
    }

    /// Read the speech processor on/off state.
    pub async fn get_processor(&self) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_processor()).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Set the speech processor on/off state.
    pub async fn set_processor(&self, on: bool) -> Result<()> {
        self.link.send(commands::cmd_set_processor(on)).await
    }

    /// Read the VOX on/off state.
    pub async fn get_vox(&self) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_vox()).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Set the VOX on/off state.
    pub async fn set_vox(&self, on: bool) -> Result<()> {
        self.link.send(commands::cmd_set_vox(on)).await
    }

    /// Read the dial lock state.
    pub async fn get_lock(&self) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_lock()).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Set the dial lock state.
    pub async fn set_lock(&self, on: bool) -> Result<()> {
        self.link.send(commands::cmd_set_lock(on)).await
    }

    /// Read the CW break-in state.
    pub async fn get_break_in(&self) -> Result<bool> {
        let frame = self.link.transact(commands::cmd_read_break_in()).await?;
        commands::parse_on_off_response(&frame.data)
    }

    /// Set the CW break-in state.
    pub async fn set_break_in(&self, on: bool) -> Result<()> {
        self.link.send(commands::cmd_set_break_in(on)).await
    }

    /// Read the internal tuner state. SPA-1 only.
    pub async fn get_tuner(&self) -> Result<bool> {
        self.require_tuner()?;
        let frame = self.link.transact(commands::cmd_read_tuner()).await?;
        commands::parse_tuner_response(&frame.data)
    }

    /// Set the internal tuner state. SPA-1 only.
    pub async fn set_tuner(&self, on: bool) -> Result<()> {
        self.require_tuner()?;
        self.link.send(commands::cmd_set_tuner(on)).await
    }

    fn require_tuner(&self) -> Result<()> {
        if self.head.has_internal_tuner() {
            Ok(())
        } else {
            Err(Error::NotAvailable(format!(
                "internal tuner not present on {} head",
                self.head
            )))
        }
    }

    // -----------------------------------------------------------------
    // CTCSS / DCS
    // -----------------------------------------------------------------

    /// Read the CTCSS tone in tenths of hertz.
    pub async fn get_ctcss_tone_decihz(&self, vfo: Vfo) -> Result<u32> {
        let frame = self.link.transact(commands::cmd_read_ctcss_tone(vfo)).await?;
        // Payload after the prefix split is `0NN` (selector + tone number).
        let digits = frame
            .data
            .strip_prefix('0')
            .ok_or_else(|| Error::Protocol(format!("unexpected CN payload: {:?}", frame.data)))?;
        let index = commands::parse_numeric_response(digits, 2)? as u8;
        commands::ctcss_index_to_decihz(index)
    }

    /// Set the CTCSS tone from tenths of hertz.
    pub async fn set_ctcss_tone_decihz(&self, vfo: Vfo, decihz: u32) -> Result<()> {
        let index = commands::ctcss_decihz_to_index(decihz)?;
        self.link.send(commands::cmd_set_ctcss_tone(vfo, index)).await
    }

    /// Read the DCS code (the standard three-digit code, e.g. 23, 754).
    pub async fn get_dcs_code(&self, vfo: Vfo) -> Result<u16> {
        let frame = self.link.transact(commands::cmd_read_dcs_code(vfo)).await?;
        // Payload after the prefix split is `1NNN` (selector + code number).
        let digits = frame
            .data
            .strip_prefix('1')
            .ok_or_else(|| Error::Protocol(format!("unexpected CN payload: {:?}", frame.data)))?;
        let index = commands::parse_numeric_response(digits, 3)? as u8;
        commands::dcs_index_to_code(index)
    }

    /// Set the DCS code (the standard three-digit code).
    pub async fn set_dcs_code(&self, vfo: Vfo, code: u16) -> Result<()> {
        let index = commands::dcs_code_to_index(code)?;
        self.link.send(commands::cmd_set_dcs_code(vfo, index)).await
    }

    /// Read the CTCSS/DCS mode (0 off, 1 encode, 2 tone squelch, 3 DCS).
    pub async fn get_ctcss_mode(&self, vfo: Vfo) -> Result<u8> {
        let frame = self.link.transact(commands::cmd_read_ctcss_mode(vfo)).await?;
        Ok(commands::parse_numeric_response(&frame.data, 1)? as u8)
    }

    /// Set the CTCSS/DCS mode.
    pub async fn set_ctcss_mode(&self, vfo: Vfo, mode: u8) -> Result<()> {
        if mode > 3 {
            return Err(Error::InvalidArgument(format!(
                "CTCSS mode {mode} out of range 0-3"
            )));
        }
        self.link.send(commands::cmd_set_ctcss_mode(vfo, mode)).await
    }

    // -----------------------------------------------------------------
    // Memory / CW / voice
    // -----------------------------------------------------------------

    /// Read the selected memory channel number.
    pub async fn get_memory_channel(&self) -> Result<u16> {
        let frame = self
            .link
            .transact(commands::cmd_read_memory_channel())
            .await?;
        commands::parse_numeric_response(&frame.data, 3)
    }

    /// Select a memory channel.
    pub async fn set_memory_channel(&self, channel: u16) -> Result<()> {
        if channel > 999 {
            return Err(Error::InvalidArgument(format!(
                "memory channel {channel} out of range"
            )));
        }
        self.link.send(commands::cmd_set_memory_channel(channel)).await
    }

    /// Read a memory channel's raw contents.
    pub async fn read_channel(&self, channel: u16) -> Result<String> {
        let frame = self.link.transact(commands::cmd_read_channel(channel)).await?;
        Ok(frame.data)
    }

    /// Send a CW message through the built-in keyer (max 24 characters).
    pub async fn send_morse(&self, text: &str) -> Result<()> {
        self.link.send(commands::cmd_send_morse(text)).await
    }

    /// Abort any CW message in progress.
    pub async fn stop_morse(&self) -> Result<()> {
        self.link.send(commands::cmd_stop_morse()).await
    }

    /// Play a voice memory slot (1-5).
    pub async fn play_voice_memory(&self, slot: u8) -> Result<()> {
        if !(1..=5).contains(&slot) {
            return Err(Error::InvalidArgument(format!(
                "voice memory slot {slot} out of range 1-5"
            )));
        }
        self.link.send(commands::cmd_play_voice_memory(slot)).await
    }
}

/// Probe whether a Field head runs on battery or external 12 V.
async fn probe_field_power_source(link: &CatLink) -> Result<HeadType> {
    match link.transact(commands::cmd_probe_field_power()).await {
        // Echoed back: the wide supply range is available.
        Ok(_) => Ok(HeadType::FieldDc),
        // Accepted silently: same conclusion.
        Err(Error::Timeout) => Ok(HeadType::FieldDc),
        // Rejected with `?;`: battery supply, 6 W ceiling.
        Err(Error::Protocol(_)) => Ok(HeadType::FieldBattery),
        Err(e) => Err(e),
    }
}
