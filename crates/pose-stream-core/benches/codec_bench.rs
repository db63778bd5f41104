//! Criterion benchmarks for the pose-stream JSON codec.
//!
//! The capture loop encodes one frame message per send and decodes one pose
//! result per acknowledgment, both on the single streaming task.  These
//! benchmarks keep an eye on how much of the ~66 ms send budget that costs.
//!
//! Run with:
//! ```bash
//! cargo bench --package pose-stream-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pose_stream_core::{decode_server_message, encode_client_message, ClientMessage};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_frame_message(payload_len: usize) -> ClientMessage {
    let mut payload = String::with_capacity(payload_len + 23);
    payload.push_str("data:image/jpeg;base64,");
    payload.extend(std::iter::repeat('A').take(payload_len));
    ClientMessage::frame(payload)
}

fn make_pose_result_text(keypoints: usize) -> String {
    let kps: Vec<String> = (0..keypoints)
        .map(|i| format!("[{:.5},{:.5},0.9876]", i as f64 / 40.0, i as f64 / 50.0))
        .collect();
    format!(
        r#"{{"type":"pose_result","detected":true,"skeleton_color":"green","similarity":78.3,"confidence":0.88,"issues":["Raise your left arm"],"good":["Right knee angle looks good"],"keypoints":[{}]}}"#,
        kps.join(",")
    )
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");
    for size in [16 * 1024, 64 * 1024] {
        let msg = make_frame_message(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &msg, |b, msg| {
            b.iter(|| encode_client_message(black_box(msg)).unwrap())
        });
    }
    group.finish();
}

fn bench_decode_pose_result(c: &mut Criterion) {
    // 33 keypoints is what the backend's pose model produces.
    let text = make_pose_result_text(33);
    c.bench_function("decode_pose_result", |b| {
        b.iter(|| decode_server_message(black_box(&text)).unwrap())
    });
}

criterion_group!(benches, bench_encode_frame, bench_decode_pose_result);
criterion_main!(benches);
