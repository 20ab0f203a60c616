// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use clipplayer::clips::Clip;
use clipplayer::clock::{Clock, SystemClock};
use clipplayer::playback::{device_channel, ChannelCommand, Cue, FadeLaw};

const SAMPLE_RATE: u32 = 48000;

fn clip(name: &str, seconds: usize) -> Arc<Clip> {
    let samples = (0..SAMPLE_RATE as usize * seconds)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    Arc::new(Clip::new("bench", name, samples, SAMPLE_RATE))
}

fn benchmark_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    // Long enough that no clip runs out during a measurement.
    let long_a = clip("a", 600);
    let long_b = clip("b", 600);

    for block_size in [256, 1024] {
        group.bench_with_input(
            BenchmarkId::new("single", block_size),
            &block_size,
            |b, &block_size| {
                let (handle, mut channel) =
                    device_channel("bench", Arc::new(SystemClock), SAMPLE_RATE, FadeLaw::Linear);
                handle.send(ChannelCommand::Start(Cue {
                    session_id: 1,
                    clip: long_a.clone(),
                }));
                let mut out = vec![0.0f32; block_size];
                b.iter(|| {
                    channel.render(black_box(&mut out));
                });
            },
        );

        for (label, law) in [("linear", FadeLaw::Linear), ("equal_power", FadeLaw::EqualPower)] {
            group.bench_with_input(
                BenchmarkId::new(format!("crossfade_{}", label), block_size),
                &block_size,
                |b, &block_size| {
                    let clock = Arc::new(SystemClock);
                    let (handle, mut channel) =
                        device_channel("bench", clock.clone(), SAMPLE_RATE, law);
                    handle.send(ChannelCommand::Start(Cue {
                        session_id: 1,
                        clip: long_a.clone(),
                    }));
                    handle.send(ChannelCommand::Crossfade {
                        incoming: Cue {
                            session_id: 2,
                            clip: long_b.clone(),
                        },
                        fade_started_at: clock.now(),
                        fade_length: Duration::from_secs(3600),
                    });
                    let mut out = vec![0.0f32; block_size];
                    b.iter(|| {
                        channel.render(black_box(&mut out));
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_startup(c: &mut Criterion) {
    c.bench_function("start_and_render", |b| {
        let a = clip("a", 1);
        let mut out = vec![0.0f32; 1024];
        b.iter(|| {
            let (handle, mut channel) =
                device_channel("bench", Arc::new(SystemClock), SAMPLE_RATE, FadeLaw::Linear);
            handle.send(ChannelCommand::Start(Cue {
                session_id: 1,
                clip: a.clone(),
            }));
            channel.render(black_box(&mut out));
        });
    });
}

criterion_group!(benches, benchmark_render, benchmark_startup);
criterion_main!(benches);
