use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use clipstage_clip::decode::encode_png;
use clipstage_clip::Clip;
use clipstage_core::{ClipstageConfig, Color, FrameBuffer, Timestamp};
use clipstage_player::vm::{PlayingSound, VideoTarget};
use clipstage_player::{
    AudioMixer, ClipLibrary, MemorySampleStore, MixRequest, NullAudioSink, NullDisplaySink,
    Player, PlayerParts, RecordedVm, SoftwareRenderer, VmSnapshot,
};

const ENTITIES: usize = 12;

fn create_stage() -> (ClipLibrary, MemorySampleStore, VmSnapshot) {
    let mut clips = ClipLibrary::new();
    let mut snapshot = VmSnapshot::default();
    for i in 0..ENTITIES {
        let id = format!("entity_{}", i);
        let color = Color::from_hsv(i as f32 / ENTITIES as f32, 0.8, 0.9, 1.0);
        let mut clip = Clip::new(120, 90);
        for _ in 0..4 {
            clip.append_frame(&encode_png(&FrameBuffer::solid(120, 90, &color)).unwrap())
                .unwrap();
        }
        clips.insert(id.clone(), clip);

        let mut target = VideoTarget::new(id);
        target.x = (i as f64 - ENTITIES as f64 / 2.0) * 40.0;
        target.y = (i % 3) as f64 * 60.0 - 60.0;
        target.direction = 90.0 + i as f64 * 15.0;
        target.current_frame = (i % 4) as f64;
        snapshot.video_targets.push(target);
    }

    let mut samples = MemorySampleStore::new();
    for i in 0..4 {
        let id = format!("sound_{}", i);
        samples.insert(id.clone(), (0..48_000).map(|n| ((n * 37) % 2000) as i16 - 1000).collect());
        snapshot.playing_sounds.insert(
            id.clone(),
            PlayingSound {
                audio_target_id: id,
                prev_playhead: 0.0,
                playhead: 800.0,
            },
        );
    }
    (clips, samples, snapshot)
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("clipstage_tick");
    group.sample_size(20);

    group.bench_function("software_tick_12_entities", |b| {
        let (clips, samples, snapshot) = create_stage();
        let config = ClipstageConfig::default();
        let mut player = Player::new(
            config.clone(),
            PlayerParts {
                vm: Box::new(RecordedVm::new(vec![snapshot]).looping(true)),
                clips,
                samples: Arc::new(samples),
                backend: Arc::new(SoftwareRenderer::new(&config.render).unwrap()),
                display: Box::new(NullDisplaySink),
                audio: Box::new(NullAudioSink),
            },
        )
        .unwrap();

        let mut t = 0.0;
        b.iter(|| {
            t += 1.0 / 60.0;
            black_box(player.tick(Timestamp::from_seconds(t)).unwrap());
        });
    });

    group.finish();
}

fn bench_mixer(c: &mut Criterion) {
    let (_, samples, snapshot) = create_stage();
    let requests: Vec<MixRequest> = snapshot
        .playing_sounds
        .values()
        .map(|s| MixRequest::from_playing(s, 80.0))
        .collect();
    let mut mixer = AudioMixer::new(4800);

    c.bench_function("mix_4_sounds_800_samples", |b| {
        b.iter(|| black_box(mixer.mix(&requests, &samples).len()));
    });
}

criterion_group!(benches, bench_tick, bench_mixer);
criterion_main!(benches);
