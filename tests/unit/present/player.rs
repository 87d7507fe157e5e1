use super::*;
use crate::config::keys::codes;
use crate::foundation::core::{Color, Direction, Resolution};
use crate::present::display::InMemoryDisplay;
use crate::present::reader::InMemoryClips;
use crate::record::recorder::Recorder;
use crate::record::renderer::SceneEvent;
use crate::slides::model::{
    BaseSlideConfig, PresentationConfig, SlideDescriptor, SlideKind, SlideRecord,
};
use std::path::PathBuf;

fn records(scene: &str, descs: &[SlideDescriptor]) -> Vec<SlideRecord> {
    descs
        .iter()
        .map(|d| {
            SlideRecord::from_descriptor(
                d,
                PathBuf::from(format!("{scene}/{}.mp4", d.number)),
                PathBuf::from(format!("{scene}/{}_reversed.mp4", d.number)),
            )
        })
        .collect()
}

fn simple(scene: &str, kinds: &[(SlideKind, BaseSlideConfig)]) -> Vec<SlideRecord> {
    let descs: Vec<SlideDescriptor> = kinds
        .iter()
        .enumerate()
        .map(|(i, (kind, cfg))| SlideDescriptor::new(*kind, i + 1, i, i + 1, cfg.clone()).unwrap())
        .collect();
    records(scene, &descs)
}

/// Register every clip with `frames` frames and wrap the scenes into presentations.
fn presentations(
    scenes: Vec<(&str, Vec<SlideRecord>)>,
    frames: usize,
) -> (Vec<Presentation>, InMemoryClips) {
    let mut clips = InMemoryClips::new();
    for (_, slides) in &scenes {
        for s in slides {
            clips.add(s.file.clone(), frames, 30.0);
            clips.add(s.rev_file.clone(), frames, 30.0);
        }
    }
    let opener: Arc<InMemoryClips> = Arc::new(clips.clone());
    let pres = scenes
        .into_iter()
        .map(|(name, slides)| {
            let cfg = PresentationConfig::new(slides, Resolution::default(), Color::BLACK).unwrap();
            Presentation::new(name, cfg, opener.clone()).unwrap()
        })
        .collect();
    (pres, clips)
}

fn offline() -> PlayerOpts {
    PlayerOpts {
        realtime: false,
        ..PlayerOpts::default()
    }
}

fn player(
    scenes: Vec<(&str, Vec<SlideRecord>)>,
    frames: usize,
    opts: PlayerOpts,
) -> (Player<InMemoryDisplay>, InMemoryClips) {
    let (pres, clips) = presentations(scenes, frames);
    let p = Player::new(pres, &Keys::default(), InMemoryDisplay::new(), opts).unwrap();
    (p, clips)
}

fn steps(p: &mut Player<InMemoryDisplay>, n: usize) {
    for _ in 0..n {
        assert_eq!(p.step().unwrap(), None);
    }
}

fn press(p: &mut Player<InMemoryDisplay>, code: u32) -> Option<RunOutcome> {
    p.relay().put(code);
    p.step().unwrap()
}

fn two_slides() -> Vec<SlideRecord> {
    simple(
        "a",
        &[
            (SlideKind::Slide, BaseSlideConfig::default()),
            (SlideKind::Last, BaseSlideConfig::default()),
        ],
    )
}

#[test]
fn key_relay_keeps_only_the_latest_key() {
    let relay = KeyRelay::new();
    assert_eq!(relay.take(), None);
    relay.put(1);
    relay.put(2);
    assert_eq!(relay.take(), Some(2));
    assert_eq!(relay.take(), None);
}

#[test]
fn key_relay_works_across_threads() {
    let relay = Arc::new(KeyRelay::new());
    let writer = Arc::clone(&relay);
    std::thread::spawn(move || writer.put(codes::RIGHT))
        .join()
        .unwrap();
    assert_eq!(relay.take(), Some(codes::RIGHT));
}

#[test]
fn concrete_scenario_ends_after_two_next_events() {
    let descs = Recorder::replay(&[
        SceneEvent::Play { count: 2 },
        SceneEvent::NextSlide(BaseSlideConfig::default()),
        SceneEvent::Play { count: 1 },
    ])
    .unwrap();
    assert_eq!(descs.len(), 2);
    assert_eq!((descs[0].kind, descs[0].range()), (SlideKind::Slide, 0..2));
    assert_eq!((descs[1].kind, descs[1].range()), (SlideKind::Last, 2..3));

    let (mut p, clips) = player(
        vec![("scene", records("scene", &descs))],
        3,
        PlayerOpts {
            skip_all: true,
            ..offline()
        },
    );
    assert_eq!(p.run(), RunOutcome::Finished);
    assert_eq!(p.stats().next_events, 2);
    assert_eq!(clips.open_readers(), 0);
    assert!(p.display().log().finished);
}

#[test]
fn slide_waits_until_next() {
    let (mut p, _) = player(vec![("a", two_slides())], 2, offline());
    steps(&mut p, 3);
    assert_eq!(p.state(), State::Wait);
    steps(&mut p, 5);
    assert_eq!(p.state(), State::Wait);
    assert_eq!(p.current_presentation().current_slide_index(), 0);

    assert_eq!(press(&mut p, codes::RIGHT), None);
    assert_eq!(p.state(), State::Playing);
    assert_eq!(p.current_presentation().current_slide_index(), 1);
}

#[test]
fn play_pause_toggles_and_advances_from_wait() {
    let (mut p, _) = player(vec![("a", two_slides())], 3, offline());
    steps(&mut p, 1);
    press(&mut p, codes::SPACE);
    assert_eq!(p.state(), State::Paused);
    steps(&mut p, 4);
    assert_eq!(p.state(), State::Paused);
    press(&mut p, codes::SPACE);
    assert_eq!(p.state(), State::Playing);

    steps(&mut p, 3);
    assert_eq!(p.state(), State::Wait);
    press(&mut p, codes::SPACE);
    assert_eq!(p.state(), State::Playing);
    assert_eq!(p.current_presentation().current_slide_index(), 1);
}

#[test]
fn next_interrupts_a_playing_slide() {
    let (mut p, _) = player(vec![("a", two_slides())], 10, offline());
    steps(&mut p, 2);
    press(&mut p, codes::RIGHT);
    assert_eq!(p.state(), State::Playing);
    assert_eq!(p.current_presentation().current_slide_index(), 1);
}

#[test]
fn next_while_paused_resumes() {
    let (mut p, _) = player(vec![("a", two_slides())], 10, offline());
    steps(&mut p, 1);
    press(&mut p, codes::SPACE);
    press(&mut p, codes::RIGHT);
    assert_eq!(p.state(), State::Playing);
    assert_eq!(p.current_presentation().current_slide_index(), 0);
}

#[test]
fn next_while_reversed_replays_forward() {
    let (mut p, _) = player(vec![("a", two_slides())], 10, offline());
    steps(&mut p, 2);
    press(&mut p, codes::ascii('v'));
    assert_eq!(p.current_presentation().direction(), Direction::Reversed);
    steps(&mut p, 1);
    press(&mut p, codes::RIGHT);
    assert_eq!(p.current_presentation().direction(), Direction::Forward);
    assert_eq!(p.current_presentation().current_slide_index(), 0);
    assert_eq!(p.state(), State::Playing);
}

#[test]
fn next_terminates_loop_lets_iteration_finish() {
    let scenes = vec![(
        "a",
        simple(
            "a",
            &[
                (SlideKind::Loop, BaseSlideConfig::looping()),
                (SlideKind::Last, BaseSlideConfig::default()),
            ],
        ),
    )];
    let (mut p, _) = player(
        scenes,
        3,
        PlayerOpts {
            next_terminates_loop: true,
            ..offline()
        },
    );
    steps(&mut p, 1);
    press(&mut p, codes::RIGHT);
    assert_eq!(p.current_presentation().current_slide_index(), 0);
    assert!(p.current_presentation().is_loop_broken());
    steps(&mut p, 3);
    assert_eq!(p.state(), State::Wait);
}

#[test]
fn loops_repeat_without_input() {
    let scenes = vec![(
        "a",
        simple(
            "a",
            &[
                (SlideKind::Loop, BaseSlideConfig::looping()),
                (SlideKind::Last, BaseSlideConfig::default()),
            ],
        ),
    )];
    let (mut p, _) = player(scenes, 2, offline());
    steps(&mut p, 30);
    assert_eq!(p.state(), State::Playing);
    assert_eq!(p.current_presentation().current_slide_index(), 0);
}

#[test]
fn previous_crosses_into_the_previous_presentation() {
    let (mut p, _) = player(
        vec![("a", two_slides()), ("b", simple("b", &[(SlideKind::Last, BaseSlideConfig::default())]))],
        1,
        PlayerOpts {
            start_at_scene_number: 1,
            ..offline()
        },
    );
    assert_eq!(p.current_presentation_index(), 1);
    press(&mut p, codes::LEFT);
    assert_eq!(p.current_presentation_index(), 0);
    assert_eq!(p.current_presentation().current_slide_index(), 1);
    assert_eq!(p.state(), State::Playing);

    press(&mut p, codes::LEFT);
    assert_eq!(p.current_presentation().current_slide_index(), 0);
    press(&mut p, codes::LEFT);
    assert_eq!(p.current_presentation_index(), 0);
    assert_eq!(p.current_presentation().current_slide_index(), 0);
}

#[test]
fn end_moves_to_next_presentation() {
    let (mut p, clips) = player(
        vec![
            ("a", simple("a", &[(SlideKind::Last, BaseSlideConfig::default())])),
            ("b", simple("b", &[(SlideKind::Last, BaseSlideConfig::default())])),
        ],
        1,
        offline(),
    );
    steps(&mut p, 2);
    assert_eq!(p.state(), State::Wait);
    press(&mut p, codes::RIGHT);
    assert_eq!(p.step().unwrap(), None);
    assert_eq!(p.current_presentation_index(), 1);
    assert_eq!(p.state(), State::Playing);
    assert_eq!(clips.open_readers(), 0);

    steps(&mut p, 2);
    press(&mut p, codes::RIGHT);
    steps(&mut p, 3);
    assert_eq!(p.state(), State::End);
    assert_eq!(p.current_presentation_index(), 1);
}

#[test]
fn start_indices_count_from_the_end_and_fall_back() {
    let three = simple(
        "a",
        &[
            (SlideKind::Slide, BaseSlideConfig::default()),
            (SlideKind::Slide, BaseSlideConfig::default()),
            (SlideKind::Last, BaseSlideConfig::default()),
        ],
    );
    let (p, _) = player(
        vec![("a", three.clone())],
        1,
        PlayerOpts {
            start_at_slide_number: -1,
            ..offline()
        },
    );
    assert_eq!(p.current_presentation().current_slide_index(), 2);

    let (p, _) = player(
        vec![("a", three)],
        1,
        PlayerOpts {
            start_at_slide_number: 7,
            start_at_scene_number: -4,
            ..offline()
        },
    );
    assert_eq!(p.current_presentation_index(), 0);
    assert_eq!(p.current_presentation().current_slide_index(), 0);

    assert_eq!(resolve_index(-2, 3, "slide"), 1);
    assert_eq!(resolve_index(-3, 3, "slide"), 0);
    assert_eq!(resolve_index(3, 3, "slide"), 0);
}

#[test]
fn start_paused_pauses_after_first_frame() {
    let (mut p, _) = player(
        vec![("a", two_slides())],
        5,
        PlayerOpts {
            start_paused: true,
            ..offline()
        },
    );
    steps(&mut p, 3);
    assert_eq!(p.state(), State::Paused);
    let log = p.display().log();
    assert!(log.frames.iter().all(|f| f.is_some()));
    let first = InMemoryClips::marker(log.frames[0].as_ref().unwrap());
    let last = InMemoryClips::marker(log.frames[2].as_ref().unwrap());
    assert_eq!(first, last);
}

#[test]
fn quit_and_stop_end_the_run() {
    let (mut p, _) = player(vec![("a", two_slides())], 5, offline());
    assert_eq!(press(&mut p, codes::ascii('q')), Some(RunOutcome::Quit));

    let (mut p, clips) = player(vec![("a", two_slides())], 5, offline());
    p.stop_handle().stop();
    assert_eq!(p.run(), RunOutcome::Stopped);
    assert_eq!(p.stats().cycles, 0);
    assert_eq!(clips.open_readers(), 0);
    assert!(p.display().log().finished);
}

#[test]
fn realtime_pacing_follows_the_clip_rate_across_slide_changes() {
    let slides = simple(
        "fast",
        &[
            (SlideKind::Slide, BaseSlideConfig::default()),
            (SlideKind::Slide, BaseSlideConfig::default()),
            (SlideKind::Last, BaseSlideConfig::default()),
        ],
    );
    let mut clips = InMemoryClips::new();
    for s in &slides {
        clips.add(s.file.clone(), 3, 100.0);
        clips.add(s.rev_file.clone(), 3, 100.0);
    }
    let cfg = PresentationConfig::new(slides, Resolution::default(), Color::BLACK).unwrap();
    let pres = Presentation::new("fast", cfg, Arc::new(clips.clone())).unwrap();
    let mut p = Player::new(
        vec![pres],
        &Keys::default(),
        InMemoryDisplay::new(),
        PlayerOpts {
            skip_all: true,
            ..PlayerOpts::default()
        },
    )
    .unwrap();

    let started = Instant::now();
    assert_eq!(p.run(), RunOutcome::Finished);
    let elapsed = started.elapsed();

    // About a dozen cycles at 10 ms each; a fallback to the minimum rate would cost a second.
    assert!(elapsed < Duration::from_millis(800), "took {elapsed:?}");
    assert!(p.display().infos().iter().all(|i| i.fps == 100.0));
    assert_eq!(clips.open_readers(), 0);
}

#[test]
fn window_toggles_reach_the_display() {
    let (mut p, _) = player(vec![("a", two_slides())], 5, offline());
    press(&mut p, codes::ascii('f'));
    press(&mut p, codes::ascii('h'));
    let log = p.display().log();
    assert!(log.full_screen);
    assert!(log.mouse_hidden);
}

#[test]
fn display_info_tracks_the_cursor() {
    let (mut p, _) = player(vec![("a", two_slides())], 1, offline());
    steps(&mut p, 1);
    press(&mut p, codes::RIGHT);
    let infos = p.display().infos();
    assert_eq!(infos[0].slide_index, 0);
    assert_eq!(infos[0].kind, SlideKind::Slide);
    assert_eq!(infos[0].fps, 30.0);
    let last = infos.last().unwrap();
    assert_eq!(last.slide_index, 1);
    assert_eq!(last.kind, SlideKind::Last);
    assert_eq!(last.scene_name, "a");
}

struct BrokenDisplay;

impl DisplaySink for BrokenDisplay {
    fn show(
        &mut self,
        _frame: Option<&crate::foundation::core::FrameRGBA>,
        _info: &DisplayInfo,
    ) -> SlidesResult<()> {
        Err(SlidesError::playback("window closed"))
    }
}

#[test]
fn loop_errors_become_failed_outcome() {
    let (pres, clips) = presentations(vec![("a", two_slides())], 5);
    let mut p = Player::new(pres, &Keys::default(), BrokenDisplay, offline()).unwrap();
    match p.run() {
        RunOutcome::Failed(msg) => assert!(msg.contains("window closed")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(clips.open_readers(), 0);
}

#[test]
fn invalid_options_are_rejected() {
    let (pres, _) = presentations(vec![("a", two_slides())], 1);
    let err = Player::new(
        pres,
        &Keys::default(),
        InMemoryDisplay::new(),
        PlayerOpts {
            playback_rate: 0.0,
            ..offline()
        },
    )
    .err()
    .unwrap();
    assert!(matches!(err, SlidesError::Validation(_)));

    assert!(
        Player::new(Vec::new(), &Keys::default(), InMemoryDisplay::new(), offline()).is_err()
    );
}
