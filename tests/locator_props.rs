//! Property tests for locator text handling.

use proptest::prelude::*;
use resource_vfs::locator::{contains_archive, has_archive_marker, percent_decode};

fn encode_every_byte(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("%{b:02X}")).collect()
}

proptest! {
    /// Fully percent-encoded text decodes back to the original bytes
    /// (rendered lossily, as the decoder does).
    #[test]
    fn percent_decode_inverts_full_encoding(
        bytes in proptest::collection::vec(any::<u8>(), 0..128)
    ) {
        let encoded = encode_every_byte(&bytes);
        prop_assert_eq!(
            percent_decode(&encoded),
            String::from_utf8_lossy(&bytes).into_owned()
        );
    }

    /// Text without escapes passes through untouched.
    #[test]
    fn decoding_plain_text_is_identity(s in "[a-zA-Z0-9 /._+-]{0,64}") {
        prop_assert_eq!(percent_decode(&s), s);
    }

    /// The segment-boundary marker is strictly stronger than the substring
    /// predicate the streamed fallback uses.
    #[test]
    fn archive_marker_implies_archive_substring(s in ".{0,64}") {
        if has_archive_marker(&s) {
            prop_assert!(contains_archive(&s));
        }
    }
}
