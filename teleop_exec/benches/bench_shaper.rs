//! Signal shaper benchmark

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::tc::AxisPair;
use teleop_lib::{
    ctrl_loop::indicators,
    input_state::InputSnapshot,
    safety::SafetyState,
    shaper::{self, CommandOutput, ShaperParams},
};

// ---------------------------------------------------------------------------
// BENCHMARKS
// ---------------------------------------------------------------------------

fn bench_shape(c: &mut Criterion) {
    let input = InputSnapshot {
        left: AxisPair { x: 0.42, y: -0.1 },
        right: AxisPair { x: 0.0, y: 0.77 },
        params: ShaperParams::default(),
    };

    c.bench_function("shape", |b| {
        b.iter(|| {
            shaper::shape(
                black_box(&input),
                black_box(SafetyState::Armed),
                black_box(CommandOutput {
                    throttle: 0.1,
                    steering: -0.2,
                }),
            )
        })
    });

    c.bench_function("shape_and_indicators_x1000", |b| {
        b.iter(|| {
            let mut out = CommandOutput::default();
            for _ in 0..1000 {
                out = shaper::shape(black_box(&input), SafetyState::Armed, out);
                black_box(indicators(out.throttle, out.steering));
            }
            out
        })
    });
}

criterion_group!(benches, bench_shape);
criterion_main!(benches);
