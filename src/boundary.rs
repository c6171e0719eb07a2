// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Multipart boundary generation: a fixed sentinel prefix plus a
//! cryptographically random suffix, unique per response and collision-
//! resistant against arbitrary file content appearing in a part's body.

use rand::RngCore;

const ENTROPY_BYTES: usize = 24;
const SENTINEL: &str = "----Boundary";

/// Generates a fresh multipart boundary token: a fixed sentinel prefix
/// followed by >= 24 bytes of hex-encoded CSPRNG output.
pub fn generate() -> String {
    let mut bytes = [0u8; ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut s = String::with_capacity(SENTINEL.len() + ENTROPY_BYTES * 2);
    s.push_str(SENTINEL);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_unique_and_prefixed() {
        let a = generate();
        let b = generate();
        assert_ne!(a, b);
        assert!(a.starts_with(SENTINEL));
        assert_eq!(a.len(), SENTINEL.len() + ENTROPY_BYTES * 2);
    }
}
