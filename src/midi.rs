//! Decoded MIDI events, as handed to `Engine::process` by the host.
//!
//! Wire-level parsing (running status, SysEx framing, etc.) is the
//! host's job; this module only decomposes an already-framed status
//! byte plus its data bytes the way §4.6 of the spec requires.

/// One MIDI event at a sample-accurate offset within the current block.
#[derive(Debug, Clone)]
pub struct MidiEvent {
    pub frame_offset: i64,
    pub bytes: Vec<u8>,
}

impl MidiEvent {
    pub fn new(frame_offset: i64, bytes: Vec<u8>) -> Self {
        Self {
            frame_offset,
            bytes,
        }
    }

    fn status(&self) -> Option<u8> {
        self.bytes.first().map(|b| b >> 4)
    }

    fn channel(&self) -> Option<u8> {
        self.bytes.first().map(|b| b & 0x0F)
    }

    fn data(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }
}

/// A decoded MIDI message, after status-byte dispatch and malformed
/// events have been filtered out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    NoteOff { note: u8 },
    NoteOn { note: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    Aftertouch { pressure: u8 },
    PitchBend { raw14: u16 },
    Ignored,
}

/// Decodes `event`, or `None` if it is malformed (empty, or missing
/// the data bytes its status byte requires). Statuses 10 and 12 (poly
/// aftertouch and program change) decode to `Message::Ignored` rather
/// than `None` — they are recognized, just not acted on.
pub fn decode(event: &MidiEvent) -> Option<Message> {
    let status = event.status()?;
    let _channel = event.channel();

    let msg = match status {
        8 => Message::NoteOff {
            note: event.data(1)?,
        },
        9 => Message::NoteOn {
            note: event.data(1)?,
            velocity: event.data(2)?,
        },
        10 | 12 => Message::Ignored,
        11 => Message::ControlChange {
            controller: event.data(1)?,
            value: event.data(2)?,
        },
        13 => Message::Aftertouch {
            pressure: event.data(1)?,
        },
        14 => {
            let data1 = event.data(1)?;
            let data2 = event.data(2)?;
            let raw14 = ((data2 as u16 & 0x7F) << 7) | (data1 as u16 & 0x7F);
            Message::PitchBend { raw14 }
        }
        _ => Message::Ignored,
    };
    Some(msg)
}

/// Maps a 14-bit pitch-bend value in `[0, 16383]` to `[-1, 1]`, where
/// 8192 is centre.
pub fn bend_to_unit(raw14: u16) -> f32 {
    (raw14 as f32 / 8192.0 - 1.0).clamp(-1.0, 1.0)
}

pub const CC_MOD_WHEEL: u8 = 1;
pub const CC_EXPRESSION: u8 = 11;
pub const CC_SUSTAIN: u8 = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_note_on() {
        let e = MidiEvent::new(0, vec![0x90, 60, 100]);
        assert_eq!(
            decode(&e),
            Some(Message::NoteOn {
                note: 60,
                velocity: 100
            })
        );
    }

    #[test]
    fn decodes_note_off() {
        let e = MidiEvent::new(0, vec![0x80, 60, 0]);
        assert_eq!(decode(&e), Some(Message::NoteOff { note: 60 }));
    }

    #[test]
    fn decodes_cc() {
        let e = MidiEvent::new(0, vec![0xB0, CC_SUSTAIN, 127]);
        assert_eq!(
            decode(&e),
            Some(Message::ControlChange {
                controller: 64,
                value: 127
            })
        );
    }

    #[test]
    fn decodes_pitch_bend_centre() {
        // raw 8192 = 0x2000: data1 = 0x00, data2 = 0x40
        let e = MidiEvent::new(0, vec![0xE0, 0x00, 0x40]);
        let msg = decode(&e).unwrap();
        match msg {
            Message::PitchBend { raw14 } => {
                assert_eq!(raw14, 8192);
                assert!(bend_to_unit(raw14).abs() < 1e-6);
            }
            _ => panic!("expected pitch bend"),
        }
    }

    #[test]
    fn decodes_pitch_bend_full_positive() {
        let e = MidiEvent::new(0, vec![0xE0, 0x7F, 0x7F]);
        let msg = decode(&e).unwrap();
        match msg {
            Message::PitchBend { raw14 } => {
                assert_eq!(raw14, 16383);
                assert!((bend_to_unit(raw14) - 1.0).abs() < 1e-3);
            }
            _ => panic!("expected pitch bend"),
        }
    }

    #[test]
    fn empty_event_is_malformed() {
        let e = MidiEvent::new(0, vec![]);
        assert_eq!(decode(&e), None);
    }

    #[test]
    fn truncated_note_on_is_malformed() {
        let e = MidiEvent::new(0, vec![0x90, 60]);
        assert_eq!(decode(&e), None);
    }

    #[test]
    fn poly_aftertouch_and_program_change_are_ignored_not_malformed() {
        let e1 = MidiEvent::new(0, vec![0xA0, 60, 10]);
        let e2 = MidiEvent::new(0, vec![0xC0, 5]);
        assert_eq!(decode(&e1), Some(Message::Ignored));
        assert_eq!(decode(&e2), Some(Message::Ignored));
    }
}
