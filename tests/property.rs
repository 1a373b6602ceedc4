//! Property-based tests for the frame codec and message reassembly.

use bytes::BytesMut;
use proptest::prelude::*;
use wsprobe::Error;
use wsprobe::config::Limits;
use wsprobe::protocol::{AssembledMessage, Frame, MessageAssembler, OpCode, apply_mask};

const MAX: usize = 1 << 20;

fn control_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Close), Just(OpCode::Ping), Just(OpCode::Pong)]
}

proptest! {
    #[test]
    fn test_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Frame::parse(&data, MAX);
    }

    #[test]
    fn test_truncated_frame_is_incomplete(
        text in ".{0,300}",
        cut in any::<prop::sample::Index>(),
    ) {
        let mut buf = BytesMut::new();
        Frame::text(text).encode(&mut buf, Some([1, 2, 3, 4]));
        let cut = cut.index(buf.len());

        let incomplete = matches!(
            Frame::parse(&buf[..cut], MAX),
            Err(Error::IncompleteFrame { .. })
        );
        prop_assert!(incomplete);
    }

    #[test]
    fn test_masked_text_survives_the_wire(
        text in ".{0,2000}",
        mask in any::<[u8; 4]>(),
        trailing in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        let mut buf = BytesMut::new();
        Frame::text(text.clone()).encode(&mut buf, Some(mask));
        let wire_len = buf.len();
        buf.extend_from_slice(&trailing);

        let (frame, used) = Frame::parse(&buf, MAX).unwrap();
        prop_assert_eq!(used, wire_len);
        prop_assert_eq!(frame.opcode, OpCode::Text);
        prop_assert_eq!(frame.payload(), text.as_bytes());
    }

    #[test]
    fn test_oversized_payload_rejected(len in 65usize..2048) {
        let mut buf = BytesMut::new();
        Frame::new(true, OpCode::Binary, vec![0; len]).encode(&mut buf, None);

        let too_large = matches!(
            Frame::parse(&buf, 64),
            Err(Error::FrameTooLarge { max: 64, .. })
        );
        prop_assert!(too_large);
    }

    #[test]
    fn test_mask_is_an_involution(
        data in prop::collection::vec(any::<u8>(), 0..256),
        mask in any::<[u8; 4]>(),
    ) {
        let mut masked = data.clone();
        apply_mask(&mut masked, mask);
        apply_mask(&mut masked, mask);
        prop_assert_eq!(masked, data);
    }

    #[test]
    fn test_fragmented_text_reassembles(
        text in "[a-z ]{1,400}",
        splits in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
        ping_at in any::<prop::sample::Index>(),
    ) {
        let bytes = text.as_bytes();
        let mut cuts: Vec<usize> = splits.iter().map(|i| i.index(bytes.len())).collect();
        cuts.push(bytes.len());
        cuts.sort_unstable();
        cuts.dedup();

        let mut frames = Vec::new();
        let mut start = 0;
        for (n, &end) in cuts.iter().enumerate() {
            let opcode = if n == 0 { OpCode::Text } else { OpCode::Continuation };
            let fin = end == bytes.len();
            frames.push(Frame::new(fin, opcode, bytes[start..end].to_vec()));
            start = end;
        }
        // Control frames may be interleaved between fragments.
        let at = ping_at.index(frames.len());
        frames.insert(at + 1, Frame::new(true, OpCode::Ping, vec![]));

        let mut assembler = MessageAssembler::new(Limits::default());
        let mut assembled = None;
        for frame in frames {
            if let Some(msg) = assembler.push(frame).unwrap() {
                prop_assert!(assembled.is_none());
                assembled = Some(msg);
            }
        }
        prop_assert_eq!(assembled, Some(AssembledMessage::Text(text)));
    }

    #[test]
    fn test_fragmented_control_frame_rejected(
        opcode in control_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..125),
    ) {
        let mut buf = BytesMut::new();
        Frame::new(false, opcode, payload).encode(&mut buf, None);
        let invalid = matches!(Frame::parse(&buf, MAX), Err(Error::InvalidFrame(_)));
        prop_assert!(invalid);
    }
}
