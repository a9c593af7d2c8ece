//! Concurrent writers must never interleave partial lines.

use cavefinder_core::ResultSink;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;

/// Writer that emits every buffer one byte at a time, maximizing the chance
/// of interleaving if the sink did not serialize writers.
struct Trickle(Vec<u8>);

impl Write for Trickle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match buf.first() {
            Some(&b) => {
                self.0.push(b);
                thread::yield_now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_concurrent_submissions_produce_whole_lines() {
    let threads = 8;
    let per_thread = 500;
    let sink = Arc::new(ResultSink::new(Trickle(Vec::new())));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(t);
                let mut sent = Vec::with_capacity(per_thread);
                for _ in 0..per_thread {
                    let seed: i64 = rng.gen();
                    sink.submit(seed).unwrap();
                    sent.push(seed);
                }
                sent
            })
        })
        .collect();

    let mut expected: HashMap<i64, usize> = HashMap::new();
    for handle in handles {
        for seed in handle.join().unwrap() {
            *expected.entry(seed).or_default() += 1;
        }
    }

    let sink = Arc::try_unwrap(sink).unwrap();
    assert_eq!(sink.written(), (threads as usize * per_thread) as u64);
    let text = String::from_utf8(sink.into_inner().0).unwrap();
    assert!(text.ends_with('\n'));

    let mut seen: HashMap<i64, usize> = HashMap::new();
    for line in text.lines() {
        let seed: i64 = line
            .parse()
            .unwrap_or_else(|_| panic!("interleaved line {line:?}"));
        *seen.entry(seed).or_default() += 1;
    }
    assert_eq!(seen, expected);
}
