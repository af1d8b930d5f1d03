// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Property-based tests for log file rotation.
//
// Whatever the record sizes and thresholds, every accepted record lands in
// exactly one finalized file, sequences have no gaps, and no file exceeds
// its size cap unless a single batch was larger than the cap on its own.

use proptest::prelude::*;
use tally_log::{
    list_log_files, read_records, Consumer, FileLogConsumer, LogConsumerConfig,
    MmapConsumerConfig, MmapLogConsumer,
};
use tempfile::TempDir;

fn arb_record() -> impl Strategy<Value = Vec<u8>> {
    (0u32..10_000, "[a-z]{0,40}")
        .prop_map(|(n, pad)| format!("{{\"n\":{n},\"pad\":\"{pad}\"}}\n").into_bytes())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn file_log_respects_cap(
        records in prop::collection::vec(arb_record(), 1..60),
        max_batch_len in 1u64..8,
        cap in 40u64..400,
    ) {
        let dir = TempDir::new().unwrap();
        let mut config = LogConsumerConfig::new(dir.path());
        config.max_batch_len = max_batch_len;
        config.max_file_size_bytes = cap;

        let mut consumer = FileLogConsumer::open(config).unwrap();
        for record in &records {
            consumer.write(record).unwrap();
        }
        consumer.close().unwrap();

        let longest_batch: u64 = records
            .chunks(max_batch_len as usize)
            .map(|chunk| chunk.iter().map(|r| r.len() as u64).sum())
            .max()
            .unwrap_or(0);

        let files = list_log_files(dir.path(), "tally_").unwrap();
        let mut total = 0;
        for (expected_sequence, file) in files.iter().enumerate() {
            prop_assert_eq!(file.sequence, expected_sequence as u64);
            prop_assert!(file.size <= cap.max(longest_batch));
            total += read_records(&file.path).unwrap().len();
        }
        prop_assert_eq!(total, records.len());
    }

    #[test]
    fn mmap_log_keeps_every_record(
        records in prop::collection::vec(arb_record(), 1..60),
        capacity in 64u64..512,
    ) {
        let dir = TempDir::new().unwrap();
        let mut config = MmapConsumerConfig::new(dir.path());
        config.file_size = Some(capacity);

        let mut consumer = MmapLogConsumer::open(config).unwrap();
        for record in &records {
            consumer.write(record).unwrap();
        }
        consumer.close().unwrap();

        let files = list_log_files(dir.path(), "tally_").unwrap();
        let mut decoded = Vec::new();
        for file in &files {
            prop_assert!(file.size <= capacity);
            decoded.extend(read_records(&file.path).unwrap());
        }
        prop_assert_eq!(decoded.len(), records.len());
        for (record, map) in records.iter().zip(&decoded) {
            let text = String::from_utf8_lossy(record);
            let n = map["n"].as_i64().unwrap();
            let expected = format!("{{\"n\":{n},");
            prop_assert!(text.starts_with(&expected), "record {} decoded as n = {}", text, n);
        }
    }
}
