// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framing must survive arbitrary payloads and arbitrary read splits.

use super::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn frames_survive_chunked_delivery(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..6),
        chunk in 1usize..64,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let mut stream = Vec::new();
            for p in &payloads {
                write_message(&mut stream, p).await.unwrap();
            }

            let (mut tx, mut rx) = tokio::io::duplex(chunk);
            let writer = tokio::spawn(async move {
                use tokio::io::AsyncWriteExt;
                for piece in stream.chunks(chunk) {
                    tx.write_all(piece).await.unwrap();
                }
            });

            for p in &payloads {
                let got = read_message(&mut rx).await.unwrap();
                prop_assert_eq!(&got, p);
            }
            writer.await.unwrap();
            Ok(())
        })?;
    }
}
