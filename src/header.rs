use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::wrap_seq::WrapSeq;

/// The kind of submessage carried by a packet, as decoded from the wire
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum MessageIdKind {
    SampleData = 0,
    InstanceRegistration = 1,
    UnregisterInstance = 2,
    DisposeInstance = 3,
    /// transport-level control traffic (handshake, NAK, NAK-ACK)
    TransportControl = 4,
}

/// The part of an inbound packet header that sequencing cares about. Decoding it (byte order,
///  framing etc.) is the header decoder's business.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SequencedHeader {
    pub sequence: WrapSeq,
    pub message_id_kind: MessageIdKind,
    pub is_control_message: bool,
}

impl SequencedHeader {
    pub fn data(sequence: WrapSeq) -> SequencedHeader {
        SequencedHeader {
            sequence,
            message_id_kind: MessageIdKind::SampleData,
            is_control_message: false,
        }
    }

    /// decodes the message id kind from its raw wire representation
    pub fn from_raw(sequence: i16, message_id_kind: u8, is_control_message: bool) -> anyhow::Result<SequencedHeader> {
        Ok(SequencedHeader {
            sequence: WrapSeq::from_raw(sequence),
            message_id_kind: MessageIdKind::try_from_primitive(message_id_kind)?,
            is_control_message,
        })
    }

    /// Control traffic is sent out-of-band and does not take part in gap detection
    pub fn counts_toward_sequencing(&self) -> bool {
        !self.is_control_message && self.message_id_kind != MessageIdKind::TransportControl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::data(0, false, true)]
    #[case::registration(1, false, true)]
    #[case::dispose(3, false, true)]
    #[case::control_kind(4, false, false)]
    #[case::control_flag(0, true, false)]
    fn test_counts_toward_sequencing(#[case] kind: u8, #[case] is_control: bool, #[case] expected: bool) {
        let header = SequencedHeader::from_raw(7, kind, is_control).unwrap();
        assert_eq!(header.sequence, WrapSeq::from_raw(7));
        assert_eq!(header.counts_toward_sequencing(), expected);
    }

    #[test]
    fn test_from_raw_invalid_kind() {
        assert!(SequencedHeader::from_raw(7, 99, false).is_err());
    }

    #[test]
    fn test_kind_into_primitive() {
        let raw: u8 = MessageIdKind::TransportControl.into();
        assert_eq!(raw, 4);
    }
}
