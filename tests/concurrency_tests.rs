//! Cross-thread tests
//!
//! The audio, control and observer paths each run on their own thread here,
//! the way a host drives them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use fastvox::analysis::{Observer, Rect};
use fastvox::config::EngineConfig;
use fastvox::dsp::{
    ChainSettings, ChainSnapshot, ChannelFilterState, FilterChain, FilterStage, ProcessSpec,
    Processor,
};
use fastvox::engine::{
    generate_test_tone, AudioBuffer, Channel, FastVoxProcessor, ParamId, ParameterStore,
    RingBuffer,
};

const IMPULSE_LEN: usize = 64;

fn settings(peak_freq: f32, peak_gain_db: f32) -> ChainSettings {
    ChainSettings {
        low_cut_freq: 80.0,
        peak_freq,
        peak_gain_db,
        peak_q: 2.0,
        shelf_bypassed: true,
        ..ChainSettings::default()
    }
}

fn impulse_response(snapshot: &ChainSnapshot) -> Vec<f32> {
    let mut block = vec![0.0_f32; IMPULSE_LEN];
    block[0] = 1.0;
    snapshot.process(&mut ChannelFilterState::default(), &mut block);
    block
}

#[test]
fn test_coefficient_swaps_are_never_torn() {
    let sample_rate = 48000.0;
    let a = settings(1000.0, 9.0);
    let b = settings(4000.0, -9.0);

    let expected_a = impulse_response(&FilterChain::with_settings(&a, sample_rate).snapshot());
    let expected_b = impulse_response(&FilterChain::with_settings(&b, sample_rate).snapshot());
    assert_ne!(expected_a, expected_b);

    let chain = Arc::new(FilterChain::with_settings(&a, sample_rate));
    let stop = Arc::new(AtomicBool::new(false));

    let control = {
        let chain = Arc::clone(&chain);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut swaps = 0_u64;
            loop {
                let next = if swaps % 2 == 0 { &b } else { &a };
                chain.apply_settings(next, sample_rate);
                swaps += 1;
                if stop.load(Ordering::Acquire) {
                    return swaps;
                }
            }
        })
    };

    let mut stage = FilterStage::new(Arc::clone(&chain));
    stage.prepare(&ProcessSpec::stereo(sample_rate, IMPULSE_LEN));
    let (mut saw_a, mut saw_b) = (0, 0);

    for _ in 0..5000 {
        stage.reset();
        let mut buffer = AudioBuffer::silence(2, IMPULSE_LEN, sample_rate as u32);
        buffer.samples[0][0] = 1.0;
        buffer.samples[1][0] = 1.0;
        stage.process(&mut buffer);

        assert!(buffer.is_finite(), "non-finite output");
        // Both channels of a block see the same snapshot
        assert_eq!(buffer.samples[0], buffer.samples[1]);

        if buffer.samples[0] == expected_a {
            saw_a += 1;
        } else if buffer.samples[0] == expected_b {
            saw_b += 1;
        } else {
            panic!("impulse response matches neither filter");
        }
    }

    stop.store(true, Ordering::Release);
    let swaps = control.join().unwrap();
    assert!(swaps > 0);
    assert_eq!(saw_a + saw_b, 5000);
}

#[test]
fn test_ring_preserves_order_across_threads() {
    const BLOCKS: u32 = 20_000;
    let (mut producer, mut consumer) = RingBuffer::new(8, &vec![0_u32; 16]).split();

    let writer = thread::spawn(move || {
        let mut block = vec![0_u32; 16];
        let mut next = 0;
        while next < BLOCKS {
            block.fill(next);
            if producer.try_push(&block) {
                next += 1;
            } else {
                thread::yield_now();
            }
        }
    });

    let mut out = vec![0_u32; 16];
    let mut expected = 0;
    while expected < BLOCKS {
        if consumer.try_pop(&mut out) {
            assert!(out.iter().all(|&v| v == expected), "torn or reordered block");
            expected += 1;
        } else {
            thread::yield_now();
        }
    }

    writer.join().unwrap();
    let mut scratch = vec![0_u32; 16];
    assert!(!consumer.try_pop(&mut scratch));
}

#[test]
fn test_audio_and_observer_threads() {
    let params = Arc::new(ParameterStore::new());
    let config = EngineConfig::default();
    let mut processor = FastVoxProcessor::with_config(Arc::clone(&params), config.clone()).unwrap();
    let feed = processor.prepare(48000.0, 256).unwrap();
    let mut observer = Observer::new(
        feed,
        Arc::clone(processor.chain()),
        Arc::clone(&params),
        &config,
        Rect::new(0.0, 0.0, 256.0, 128.0),
    );

    let done = Arc::new(AtomicBool::new(false));
    let observer_thread = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut frames = 0;
            let mut last = None;
            loop {
                // Read the flag first so the final tick sees every block
                let finished = done.load(Ordering::Acquire);
                frames += observer.tick().frames;
                if let Some(path) = observer.take_path(Channel::Right) {
                    last = Some(path);
                }
                if finished {
                    break;
                }
                thread::yield_now();
            }
            (frames, last)
        })
    };

    let control_thread = {
        let params = Arc::clone(&params);
        thread::spawn(move || {
            for i in 0..200 {
                params.set(ParamId::PeakGain, (i % 24) as f32 - 12.0);
                params.set(ParamId::LowCutSlope, (i % 4) as f32);
            }
        })
    };

    let tone = generate_test_tone(440.0, 0.5, 2, 48000, 48000);
    for start in (0..tone.len()).step_by(256) {
        let mut block = tone.slice(start, 256);
        processor.process(&mut block);
        assert!(block.is_finite());
    }

    control_thread.join().unwrap();
    done.store(true, Ordering::Release);
    let (frames, last) = observer_thread.join().unwrap();

    assert!(frames > 0, "observer never produced a frame");
    let path = last.expect("a right-channel path");
    assert_eq!(path.len(), 256);
    assert!(path.points.iter().all(|p| p.y.is_finite()));
}
