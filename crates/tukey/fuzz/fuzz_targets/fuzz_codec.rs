//! Fuzz target for model and state decoding.
//!
//! Stored blobs come from disk; truncated or corrupted bytes must decode to
//! an error. Anything that decodes must re-encode to a stable blob.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tukey::outlier::codec;

fuzz_target!(|data: &[u8]| {
    if let Ok(state) = codec::decode_state(data) {
        let blob = codec::encode_state(&state);
        let again = codec::decode_state(&blob).expect("re-encoded state must decode");
        assert_eq!(codec::encode_state(&again), blob);
    }
    if let Ok(model) = codec::decode_model(data) {
        let blob = codec::encode_model(&model);
        let again = codec::decode_model(&blob).expect("re-encoded model must decode");
        assert_eq!(codec::encode_model(&again), blob);
    }
});
