//! # CRSF Packet Encoder
//!
//! Payload writers for every frame type this crate produces. The `write_*`
//! functions append a payload to a [`FrameWriter`] without allocating; the
//! `encode_*_frame` helpers wrap them into a complete, owned frame.

use super::buffer::FrameWriter;
use super::protocol::*;
use crate::error::FrameError;

/// Pack 16 channels (11 bits each) into the 22-byte RC payload
///
/// Channels are packed as a continuous bitstream, LSB first. Values above
/// 2047 are clamped.
///
/// ```text
/// Byte 0: Ch0[0:7]
/// Byte 1: Ch0[8:10] | Ch1[0:4]
/// Byte 2: Ch1[5:10] | Ch2[0:1]
/// ...
/// ```
pub fn encode_rc_channels_payload(channels: &RcChannels) -> [u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] {
    let mut payload = [0u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE];

    for (channel_index, &channel) in channels.iter().enumerate() {
        let value = u32::from(clamp_channel_value(channel));
        let bit = channel_index * 11;
        let byte = bit / 8;
        let shift = bit % 8;

        let bits = value << shift;
        payload[byte] |= bits as u8;
        payload[byte + 1] |= (bits >> 8) as u8;
        if shift > 5 {
            payload[byte + 2] |= (bits >> 16) as u8;
        }
    }

    payload
}

/// Clamp a channel value to the 11-bit range (0-2047)
pub fn clamp_channel_value(value: u16) -> u16 {
    value.min(CRSF_CHANNEL_VALUE_MAX)
}

/// Append a RC_CHANNELS_PACKED payload
pub fn write_rc_channels(writer: &mut FrameWriter, channels: &RcChannels) -> Result<(), FrameError> {
    writer.write_bytes(&encode_rc_channels_payload(channels))
}

/// Append a LINK_STATISTICS payload
pub fn write_link_statistics(
    writer: &mut FrameWriter,
    stats: &LinkStatistics,
) -> Result<(), FrameError> {
    writer.write_u8(stats.uplink_rssi_1)?;
    writer.write_u8(stats.uplink_rssi_2)?;
    writer.write_u8(stats.uplink_lq)?;
    writer.write_i8(stats.uplink_snr)?;
    writer.write_u8(stats.active_antenna)?;
    writer.write_u8(stats.rf_mode)?;
    writer.write_u8(stats.uplink_tx_power)?;
    writer.write_u8(stats.downlink_rssi)?;
    writer.write_u8(stats.downlink_lq)?;
    writer.write_i8(stats.downlink_snr)
}

/// Append a BATTERY_SENSOR payload
///
/// Voltage (u16), current (u16), capacity (u24), percent (u8), big-endian.
/// Capacity above 24 bits is truncated to its low 24 bits.
pub fn write_battery_sensor(
    writer: &mut FrameWriter,
    battery: &BatterySensor,
) -> Result<(), FrameError> {
    writer.write_u16(battery.voltage)?;
    writer.write_u16(battery.current)?;
    writer.write_u24(battery.capacity)?;
    writer.write_u8(battery.percent)
}

/// Append a CUSTOM_PAYLOAD payload (raw bytes)
pub fn write_custom_payload(
    writer: &mut FrameWriter,
    payload: &CustomPayload,
) -> Result<(), FrameError> {
    writer.write_bytes(payload.as_bytes())
}

/// Build a complete frame around the payload written by `write_payload`
fn encode_frame<F>(frame_type: FrameType, write_payload: F) -> Result<Vec<u8>, FrameError>
where
    F: FnOnce(&mut FrameWriter) -> Result<(), FrameError>,
{
    let mut writer = FrameWriter::new();
    writer.begin_frame(frame_type)?;
    write_payload(&mut writer)?;
    Ok(writer.finish_frame()?.to_vec())
}

/// Encode RC channels into a complete CRSF frame (26 bytes)
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::encoder::encode_rc_channels_frame;
///
/// let channels = [992u16; 16]; // All channels at center
/// let frame = encode_rc_channels_frame(&channels).unwrap();
/// assert_eq!(frame.len(), 26);
/// ```
pub fn encode_rc_channels_frame(channels: &RcChannels) -> Result<Vec<u8>, FrameError> {
    encode_frame(FrameType::RcChannelsPacked, |w| write_rc_channels(w, channels))
}

/// Encode link statistics into a complete CRSF frame (14 bytes)
pub fn encode_link_statistics_frame(stats: &LinkStatistics) -> Result<Vec<u8>, FrameError> {
    encode_frame(FrameType::LinkStatistics, |w| write_link_statistics(w, stats))
}

/// Encode battery telemetry into a complete CRSF frame (12 bytes)
pub fn encode_battery_sensor_frame(battery: &BatterySensor) -> Result<Vec<u8>, FrameError> {
    encode_frame(FrameType::BatterySensor, |w| write_battery_sensor(w, battery))
}

/// Encode a custom payload into a complete CRSF frame
pub fn encode_custom_payload_frame(payload: &CustomPayload) -> Result<Vec<u8>, FrameError> {
    encode_frame(FrameType::CustomPayload, |w| write_custom_payload(w, payload))
}
